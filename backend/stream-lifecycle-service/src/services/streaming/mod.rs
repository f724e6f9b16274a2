//! Live stream lifecycle & health
//!
//! The coordinator owns all status transitions; the health registry tracks
//! telemetry for active streams; the sweeper reaps streams whose ingest
//! went silent. Storage, delivery and notifications are trait seams.

pub mod admission;
pub mod clock;
pub mod coordinator;
pub mod delivery;
pub mod events;
pub mod health;
pub mod models;
pub mod repository;
pub mod sweeper;

pub use admission::{AdmissionController, DEFAULT_MAX_ACTIVE_STREAMS_PER_OWNER};
pub use clock::{Clock, SharedClock, SystemClock};
pub use coordinator::{ForceEndReason, StreamCoordinator};
pub use delivery::{DeliveryInitializer, HttpDeliveryInitializer, LoggingDelivery, RecordingFinalizer};
pub use events::{NotificationSink, StreamEvent, StreamEventType, TracingNotificationSink, WebhookNotificationSink};
pub use health::{
    compute_health_score, detect_issues, ConnectionQuality, HealthMetrics, HealthRegistry,
    HealthUpdate, LOW_SCORE_THRESHOLD,
};
pub use models::{
    generate_stream_key, is_valid_stream_key, CreateStreamRequest, Stream, StreamPatch,
    StreamSettings, StreamSettingsInput, StreamStatus,
};
pub use repository::{InMemoryStreamRepository, StreamRepository};
pub use sweeper::{HealthSweeper, DEFAULT_HEARTBEAT_TIMEOUT_SECS, DEFAULT_SWEEP_PERIOD_SECS};
