//! Shared test fixtures: manual clock, scriptable delivery, recording sink.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use stream_lifecycle_service::services::streaming::{
    AdmissionController, Clock, CreateStreamRequest, DeliveryInitializer, HealthRegistry,
    NotificationSink, RecordingFinalizer, SharedClock, Stream, StreamCoordinator, StreamEvent,
    StreamEventType, InMemoryStreamRepository, StreamRepository, StreamSettings,
    StreamSettingsInput,
};
use stream_lifecycle_service::AppError;

/// Deterministic clock advanced explicitly by tests.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc::now()),
        })
    }

    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Delivery fake that records calls and can be scripted to fail `start`.
#[derive(Default)]
pub struct ScriptedDelivery {
    pub fail_start: AtomicBool,
    pub started: Mutex<Vec<Uuid>>,
    pub stopped: Mutex<Vec<Uuid>>,
    pub finalized: Mutex<Vec<Uuid>>,
}

impl ScriptedDelivery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn started_ids(&self) -> Vec<Uuid> {
        self.started.lock().unwrap().clone()
    }

    pub fn stopped_ids(&self) -> Vec<Uuid> {
        self.stopped.lock().unwrap().clone()
    }

    pub fn finalized_ids(&self) -> Vec<Uuid> {
        self.finalized.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryInitializer for ScriptedDelivery {
    async fn start(&self, stream: &Stream) -> anyhow::Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            anyhow::bail!("origin refused delivery");
        }
        self.started.lock().unwrap().push(stream.id);
        Ok(())
    }

    async fn stop(&self, stream_id: Uuid) -> anyhow::Result<()> {
        self.stopped.lock().unwrap().push(stream_id);
        Ok(())
    }
}

#[async_trait]
impl RecordingFinalizer for ScriptedDelivery {
    async fn finalize(&self, stream_id: Uuid) -> anyhow::Result<()> {
        self.finalized.lock().unwrap().push(stream_id);
        Ok(())
    }
}

/// Repository wrapper whose `update` can be scripted to fail for one
/// stream id. Reads pass through to the wrapped in-memory store.
pub struct FlakyRepo {
    inner: Arc<InMemoryStreamRepository>,
    fail_update_for: Mutex<Option<Uuid>>,
}

impl FlakyRepo {
    pub fn new(inner: Arc<InMemoryStreamRepository>) -> Self {
        Self {
            inner,
            fail_update_for: Mutex::new(None),
        }
    }

    pub fn fail_updates_for(&self, stream_id: Uuid) {
        *self.fail_update_for.lock().unwrap() = Some(stream_id);
    }
}

#[async_trait]
impl StreamRepository for FlakyRepo {
    async fn create(&self, stream: Stream) -> Result<Stream, AppError> {
        self.inner.create(stream).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Stream>, AppError> {
        self.inner.get_by_id(id).await
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<Stream>, AppError> {
        self.inner.get_by_key(key).await
    }

    async fn list_active_by_owner(&self, owner_id: Uuid) -> Result<Vec<Stream>, AppError> {
        self.inner.list_active_by_owner(owner_id).await
    }

    async fn update(&self, stream: &Stream) -> Result<Stream, AppError> {
        if *self.fail_update_for.lock().unwrap() == Some(stream.id) {
            return Err(AppError::Repository("storage write rejected".into()));
        }
        self.inner.update(stream).await
    }
}

/// Sink that records every emitted event for assertions. Can be scripted
/// to fail, in which case nothing is recorded.
#[derive(Default)]
pub struct RecordingSink {
    pub fail: AtomicBool,
    events: Mutex<Vec<StreamEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_of(&self, event_type: StreamEventType) -> Vec<StreamEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn emit(&self, event: StreamEvent) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("notification endpoint unavailable");
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Fully wired coordinator over in-memory fakes.
pub struct Harness {
    pub coordinator: Arc<StreamCoordinator>,
    pub clock: Arc<ManualClock>,
    pub delivery: Arc<ScriptedDelivery>,
    pub sink: Arc<RecordingSink>,
    pub repo: Arc<InMemoryStreamRepository>,
}

impl Harness {
    pub fn new(limit: u32) -> Self {
        let repo = Arc::new(InMemoryStreamRepository::new());
        Self::build(limit, repo.clone(), repo)
    }

    /// Like `new`, but the coordinator goes through a `FlakyRepo` so tests
    /// can make a single stream's persistence fail.
    pub fn with_flaky_repo(limit: u32) -> (Self, Arc<FlakyRepo>) {
        let inner = Arc::new(InMemoryStreamRepository::new());
        let flaky = Arc::new(FlakyRepo::new(inner.clone()));
        (Self::build(limit, flaky.clone(), inner), flaky)
    }

    fn build(
        limit: u32,
        repo_dyn: Arc<dyn StreamRepository>,
        repo: Arc<InMemoryStreamRepository>,
    ) -> Self {
        let clock = ManualClock::new();
        let shared_clock: SharedClock = clock.clone();
        let delivery = ScriptedDelivery::new();
        let sink = RecordingSink::new();

        let registry = Arc::new(HealthRegistry::new(shared_clock.clone()));
        let admission = AdmissionController::new(repo_dyn.clone(), limit);
        let coordinator = Arc::new(StreamCoordinator::new(
            repo_dyn,
            admission,
            registry,
            delivery.clone(),
            delivery.clone(),
            sink.clone(),
            shared_clock,
            StreamSettings::default(),
        ));

        Self {
            coordinator,
            clock,
            delivery,
            sink,
            repo,
        }
    }

    pub async fn create_and_start(&self, owner_id: Uuid) -> Stream {
        let created = self
            .coordinator
            .create_stream(owner_id, request("live session"))
            .await
            .expect("create");
        self.coordinator
            .start_stream(created.id, owner_id)
            .await
            .expect("start")
    }
}

pub fn request(title: &str) -> CreateStreamRequest {
    CreateStreamRequest {
        title: title.to_string(),
        description: None,
        settings: StreamSettingsInput::default(),
    }
}

pub fn request_with_recording(title: &str) -> CreateStreamRequest {
    CreateStreamRequest {
        title: title.to_string(),
        description: None,
        settings: StreamSettingsInput {
            enable_recording: Some(true),
            ..Default::default()
        },
    }
}
