//! Stream lifecycle coordinator
//!
//! The only component allowed to change persisted stream status. Orchestrates
//! the repository, admission controller, health registry, delivery
//! initializer and notification sink; every operation is fetch -> guard ->
//! persist -> side effects, with events published best-effort at the end.

use super::admission::AdmissionController;
use super::clock::SharedClock;
use super::delivery::{DeliveryInitializer, RecordingFinalizer};
use super::events::{NotificationSink, StreamEvent, StreamEventType};
use super::health::{detect_issues, HealthMetrics, HealthRegistry, HealthUpdate, LOW_SCORE_THRESHOLD};
use super::models::{
    generate_stream_key, is_valid_stream_key, CreateStreamRequest, Stream, StreamPatch,
    StreamSettings, StreamStatus,
};
use super::repository::StreamRepository;
use crate::error::{AppError, Result};
use crate::metrics;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Why a stream is being terminated without an owner-initiated call.
#[derive(Debug, Clone)]
pub enum ForceEndReason {
    /// Sweeper hit the hard heartbeat timeout; the stream ends normally.
    HeartbeatTimeout,
    /// A detected fault; the stream transitions to `error`.
    Fault(String),
}

impl ForceEndReason {
    fn as_str(&self) -> &str {
        match self {
            Self::HeartbeatTimeout => "heartbeat timeout",
            Self::Fault(reason) => reason,
        }
    }

    fn terminal_status(&self) -> StreamStatus {
        match self {
            Self::HeartbeatTimeout => StreamStatus::Ended,
            Self::Fault(_) => StreamStatus::Error,
        }
    }
}

pub struct StreamCoordinator {
    repo: Arc<dyn StreamRepository>,
    admission: AdmissionController,
    registry: Arc<HealthRegistry>,
    delivery: Arc<dyn DeliveryInitializer>,
    recorder: Arc<dyn RecordingFinalizer>,
    sink: Arc<dyn NotificationSink>,
    clock: SharedClock,
    default_settings: StreamSettings,
}

impl StreamCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<dyn StreamRepository>,
        admission: AdmissionController,
        registry: Arc<HealthRegistry>,
        delivery: Arc<dyn DeliveryInitializer>,
        recorder: Arc<dyn RecordingFinalizer>,
        sink: Arc<dyn NotificationSink>,
        clock: SharedClock,
        default_settings: StreamSettings,
    ) -> Self {
        Self {
            repo,
            admission,
            registry,
            delivery,
            recorder,
            sink,
            clock,
            default_settings,
        }
    }

    // =========================================================================
    // Lifecycle operations
    // =========================================================================

    /// Create a new stream in `inactive` state.
    ///
    /// The admission check here is advisory (an inactive record consumes no
    /// delivery capacity) but creating past the active limit is rejected
    /// up front so the owner finds out before going live.
    pub async fn create_stream(
        &self,
        owner_id: Uuid,
        request: CreateStreamRequest,
    ) -> Result<Stream> {
        if !self.admission.can_activate(owner_id).await? {
            return Err(AppError::LimitExceeded {
                limit: self.admission.limit(),
            });
        }

        let now = self.clock.now();
        let stream = Stream {
            id: Uuid::new_v4(),
            owner_id,
            title: request.title,
            description: request.description,
            stream_key: generate_stream_key(),
            status: StreamStatus::Inactive,
            is_live: false,
            viewer_count: 0,
            max_viewers: 0,
            settings: self.default_settings.clone().merged_with(request.settings),
            started_at: None,
            ended_at: None,
            created_at: now,
            updated_at: now,
        };

        let stream = self.repo.create(stream).await?;
        tracing::info!(stream_id = %stream.id, %owner_id, "stream created");
        Ok(stream)
    }

    /// Transition `inactive -> active`: persist, register health tracking
    /// and start delivery. A failed delivery start rolls the stream back to
    /// `inactive` - it must never be left active with no delivery running.
    pub async fn start_stream(&self, stream_id: Uuid, owner_id: Uuid) -> Result<Stream> {
        let stream = self.fetch_owned(stream_id, owner_id).await?;

        match stream.status {
            StreamStatus::Inactive => {}
            StreamStatus::Active => {
                return Err(AppError::InvalidState("stream is already active".into()))
            }
            StreamStatus::Ended | StreamStatus::Error => {
                return Err(AppError::InvalidState(
                    "stream has ended and cannot be restarted".into(),
                ))
            }
        }

        // Enforced strictly here, not just advisorily at creation
        if !self.admission.can_activate(owner_id).await? {
            return Err(AppError::LimitExceeded {
                limit: self.admission.limit(),
            });
        }

        let now = self.clock.now();
        let mut stream = stream;
        stream.status = StreamStatus::Active;
        stream.is_live = true;
        stream.started_at = Some(now);
        stream.updated_at = now;
        let stream = self.repo.update(&stream).await?;

        self.registry.initialize(stream.id);

        if let Err(e) = self.delivery.start(&stream).await {
            tracing::error!(stream_id = %stream.id, error = %e, "delivery start failed; rolling back activation");
            let _ = self.registry.remove(stream.id);

            let mut rollback = stream.clone();
            rollback.status = StreamStatus::Inactive;
            rollback.is_live = false;
            rollback.started_at = None;
            rollback.updated_at = self.clock.now();
            if let Err(e) = self.repo.update(&rollback).await {
                tracing::error!(stream_id = %stream.id, error = %e, "rollback persist failed after delivery error");
            }

            return Err(AppError::Delivery(e.to_string()));
        }

        metrics::ACTIVE_STREAMS.inc();
        metrics::LIFECYCLE_TRANSITIONS
            .with_label_values(&["start"])
            .inc();

        self.emit(
            StreamEventType::StreamStarted,
            &stream,
            json!({ "qualities": stream.settings.qualities }),
        )
        .await;

        tracing::info!(stream_id = %stream.id, %owner_id, "stream started");
        Ok(stream)
    }

    /// Transition `active -> ended` on the owner's request.
    pub async fn end_stream(&self, stream_id: Uuid, owner_id: Uuid) -> Result<Stream> {
        let stream = self.fetch_owned(stream_id, owner_id).await?;

        if stream.status != StreamStatus::Active {
            return Err(AppError::InvalidState("stream is not active".into()));
        }

        let (stream, owns_teardown) = self.finish(stream, StreamStatus::Ended).await?;

        if owns_teardown {
            let duration_secs = duration_secs(&stream);
            self.emit(
                StreamEventType::StreamEnded,
                &stream,
                json!({
                    "duration_secs": duration_secs,
                    "viewer_count": stream.viewer_count,
                    "max_viewers": stream.max_viewers,
                }),
            )
            .await;

            metrics::LIFECYCLE_TRANSITIONS
                .with_label_values(&["end"])
                .inc();

            tracing::info!(stream_id = %stream.id, %owner_id, duration_secs, "stream ended");
        }
        Ok(stream)
    }

    /// Terminate a stream without owner authorization. Used by the sweeper
    /// (heartbeat timeout -> `ended`) and the fault path (-> `error`).
    pub async fn force_end(&self, stream_id: Uuid, reason: ForceEndReason) -> Result<Stream> {
        let stream = self.repo.get_by_id(stream_id).await?.ok_or(AppError::NotFound)?;

        if stream.status.is_terminal() {
            // Raced with a concurrent end; nothing left to do but make sure
            // the registry entry is gone.
            let _ = self.registry.remove(stream_id);
            return Ok(stream);
        }
        if stream.status != StreamStatus::Active {
            return Err(AppError::InvalidState("stream is not active".into()));
        }

        let terminal = reason.terminal_status();
        let (stream, owns_teardown) = self.finish(stream, terminal).await?;

        if owns_teardown {
            let event_type = match terminal {
                StreamStatus::Error => StreamEventType::StreamError,
                _ => StreamEventType::StreamEnded,
            };
            self.emit(
                event_type,
                &stream,
                json!({
                    "reason": reason.as_str(),
                    "duration_secs": duration_secs(&stream),
                }),
            )
            .await;

            metrics::FORCED_ENDS
                .with_label_values(&[match &reason {
                    ForceEndReason::HeartbeatTimeout => "heartbeat_timeout",
                    ForceEndReason::Fault(_) => "fault",
                }])
                .inc();

            tracing::warn!(stream_id = %stream.id, reason = reason.as_str(), status = stream.status.as_str(), "stream force-ended");
        }
        Ok(stream)
    }

    /// Shared `active -> terminal` tail: persist, drop health tracking,
    /// stop delivery, kick off recording finalization.
    ///
    /// Two terminations can race past the `active` guard. The registry entry
    /// is removed exactly once, so the caller that wins the removal runs the
    /// teardown and event; the loser only re-persists the terminal record.
    /// The returned flag says whether this call won.
    async fn finish(&self, mut stream: Stream, terminal: StreamStatus) -> Result<(Stream, bool)> {
        debug_assert!(terminal.is_terminal());

        let now = self.clock.now();
        stream.status = terminal;
        stream.is_live = false;
        stream.ended_at = Some(now);
        stream.updated_at = now;
        let stream = self.repo.update(&stream).await?;

        let owns_teardown = self.registry.remove(stream.id).is_some();
        if !owns_teardown {
            return Ok((stream, false));
        }

        metrics::ACTIVE_STREAMS.dec();
        let _ = metrics::HEALTH_SCORE.remove_label_values(&[&stream.id.to_string()]);

        // Delivery stop failures are logged, not propagated: the stream is
        // already safely terminal and the pipeline reaps idle sessions.
        if let Err(e) = self.delivery.stop(stream.id).await {
            tracing::warn!(stream_id = %stream.id, error = %e, "delivery stop failed");
        }

        if stream.settings.enable_recording {
            let recorder = Arc::clone(&self.recorder);
            let stream_id = stream.id;
            tokio::spawn(async move {
                if let Err(e) = recorder.finalize(stream_id).await {
                    tracing::warn!(%stream_id, error = %e, "recording finalization failed");
                }
            });
        }

        Ok((stream, true))
    }

    /// Patch mutable fields. Encode-relevant fields are frozen while live,
    /// and terminal streams are immutable.
    pub async fn update_stream(
        &self,
        stream_id: Uuid,
        owner_id: Uuid,
        patch: StreamPatch,
    ) -> Result<Stream> {
        let mut stream = self.fetch_owned(stream_id, owner_id).await?;

        if stream.status.is_terminal() {
            return Err(AppError::InvalidState("stream has ended".into()));
        }
        if stream.status == StreamStatus::Active && patch.touches_encode_settings() {
            return Err(AppError::UpdateRestrictedWhileActive);
        }

        if let Some(title) = patch.title {
            stream.title = title;
        }
        if let Some(description) = patch.description {
            stream.description = Some(description);
        }
        if let Some(qualities) = patch.qualities {
            stream.settings.qualities = qualities;
        }
        if let Some(enable_recording) = patch.enable_recording {
            stream.settings.enable_recording = enable_recording;
        }
        if patch.max_concurrent_viewers.is_some() {
            stream.settings.max_concurrent_viewers = patch.max_concurrent_viewers;
        }
        stream.updated_at = self.clock.now();

        self.repo.update(&stream).await
    }

    /// Persist a new viewer count. The ping doubles as a liveness signal, so
    /// the health heartbeat is refreshed when the stream is tracked.
    pub async fn update_viewer_count(&self, stream_id: Uuid, count: u32) -> Result<Stream> {
        let mut stream = self.repo.get_by_id(stream_id).await?.ok_or(AppError::NotFound)?;

        stream.viewer_count = count;
        stream.max_viewers = stream.max_viewers.max(count);
        stream.updated_at = self.clock.now();
        let stream = self.repo.update(&stream).await?;

        self.registry.touch(stream_id);
        Ok(stream)
    }

    /// Ingest-authentication lookup. Key-format validity is checked before
    /// the repository is consulted.
    pub async fn get_stream_by_key(&self, key: &str) -> Result<Option<Stream>> {
        if !is_valid_stream_key(key) {
            return Err(AppError::Validation("malformed stream key".into()));
        }
        self.repo.get_by_key(key).await
    }

    /// Rotate the ingest key. Rejected while live: the running ingest
    /// session authenticated with the old key.
    pub async fn regenerate_stream_key(&self, stream_id: Uuid, owner_id: Uuid) -> Result<Stream> {
        let mut stream = self.fetch_owned(stream_id, owner_id).await?;

        if stream.status == StreamStatus::Active {
            return Err(AppError::InvalidState(
                "cannot regenerate key while stream is active".into(),
            ));
        }
        if stream.status.is_terminal() {
            return Err(AppError::InvalidState("stream has ended".into()));
        }

        stream.stream_key = generate_stream_key();
        stream.updated_at = self.clock.now();
        self.repo.update(&stream).await
    }

    // =========================================================================
    // Health ingestion
    // =========================================================================

    /// Apply a heartbeat. Never fails toward the caller: telemetry for a
    /// stream that already ended is expected and silently dropped.
    ///
    /// A recomputed score below 50 raises one `stream_error` event carrying
    /// the full issue list - it alerts, it does not kill the broadcast.
    pub async fn update_health(
        &self,
        stream_id: Uuid,
        update: HealthUpdate,
    ) -> Option<HealthMetrics> {
        let metrics_entry = self.registry.update(stream_id, update)?;

        metrics::HEALTH_SCORE
            .with_label_values(&[&stream_id.to_string()])
            .set(metrics_entry.health_score as f64);

        if metrics_entry.health_score < LOW_SCORE_THRESHOLD {
            metrics::LOW_SCORE_EVENTS.inc();
            let issues = detect_issues(&metrics_entry, self.clock.now());
            tracing::warn!(
                %stream_id,
                score = metrics_entry.health_score,
                ?issues,
                "stream health degraded"
            );

            match self.repo.get_by_id(stream_id).await {
                Ok(Some(stream)) => {
                    self.emit(
                        StreamEventType::StreamError,
                        &stream,
                        json!({
                            "health_score": metrics_entry.health_score,
                            "issues": issues,
                        }),
                    )
                    .await;
                }
                Ok(None) => {
                    tracing::warn!(%stream_id, "health entry exists for unknown stream")
                }
                Err(e) => tracing::warn!(%stream_id, error = %e, "stream lookup failed for health event"),
            }
        }

        Some(metrics_entry)
    }

    pub fn get_health(&self, stream_id: Uuid) -> Option<HealthMetrics> {
        self.registry.get(stream_id)
    }

    pub fn all_active_health(&self) -> HashMap<Uuid, HealthMetrics> {
        self.registry.snapshot_all()
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn fetch_owned(&self, stream_id: Uuid, owner_id: Uuid) -> Result<Stream> {
        let stream = self.repo.get_by_id(stream_id).await?.ok_or(AppError::NotFound)?;
        if stream.owner_id != owner_id {
            return Err(AppError::Unauthorized);
        }
        Ok(stream)
    }

    /// Best-effort event publishing; a sink failure never fails the
    /// lifecycle operation that triggered it.
    async fn emit(&self, event_type: StreamEventType, stream: &Stream, data: serde_json::Value) {
        let event = StreamEvent {
            event_type,
            stream_id: stream.id,
            owner_id: stream.owner_id,
            data,
            timestamp: self.clock.now(),
        };
        if let Err(e) = self.sink.emit(event).await {
            tracing::warn!(
                stream_id = %stream.id,
                event_type = event_type.as_str(),
                error = %e,
                "failed to publish lifecycle event"
            );
        }
    }
}

fn duration_secs(stream: &Stream) -> i64 {
    match (stream.started_at, stream.ended_at) {
        (Some(started), Some(ended)) => (ended - started).num_seconds(),
        _ => 0,
    }
}
