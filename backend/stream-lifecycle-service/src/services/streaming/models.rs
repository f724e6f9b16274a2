//! Data models for live stream lifecycle
//!
//! These models represent the contract between API handlers and the
//! coordinator. Persistence is behind the `StreamRepository` trait.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// =============================================================================
// Stream Status
// =============================================================================

/// Stream lifecycle status.
///
/// Transitions are strictly forward: `Inactive -> Active -> {Ended, Error}`.
/// `Ended` and `Error` are terminal; a finished stream is never restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    /// Stream created but not yet broadcasting
    Inactive,
    /// Delivery running, actively broadcasting
    Active,
    /// Stream ended normally (owner-initiated or heartbeat timeout)
    Ended,
    /// Stream terminated by a detected fault
    Error,
}

impl StreamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Ended => "ended",
            Self::Error => "error",
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Error)
    }
}

// =============================================================================
// Stream Settings
// =============================================================================

/// Per-stream configuration. Opaque to lifecycle logic except where it
/// affects delivery initialization (qualities) or end-of-stream recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Target output qualities handed to the delivery initializer
    pub qualities: Vec<String>,
    /// Finalize a recording when the stream ends
    pub enable_recording: bool,
    /// Soft viewer cap enforced elsewhere; carried through untouched
    pub max_concurrent_viewers: Option<u32>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            qualities: vec!["720p".to_string(), "1080p".to_string()],
            enable_recording: false,
            max_concurrent_viewers: None,
        }
    }
}

/// Caller-supplied settings overrides, merged over the configured defaults
/// at creation time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamSettingsInput {
    pub qualities: Option<Vec<String>>,
    pub enable_recording: Option<bool>,
    pub max_concurrent_viewers: Option<u32>,
}

impl StreamSettings {
    pub fn merged_with(mut self, input: StreamSettingsInput) -> Self {
        if let Some(qualities) = input.qualities {
            self.qualities = qualities;
        }
        if let Some(enable_recording) = input.enable_recording {
            self.enable_recording = enable_recording;
        }
        if input.max_concurrent_viewers.is_some() {
            self.max_concurrent_viewers = input.max_concurrent_viewers;
        }
        self
    }
}

// =============================================================================
// Stream Record
// =============================================================================

/// A stream record as persisted by the repository.
///
/// Mutated only through the coordinator; immutable once terminal.
#[derive(Debug, Clone, Serialize)]
pub struct Stream {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Secret ingest key (`lsk_` + 32 hex chars)
    pub stream_key: String,
    pub status: StreamStatus,
    /// Redundant cache of `status == Active`
    pub is_live: bool,
    pub viewer_count: u32,
    pub max_viewers: u32,
    pub settings: StreamSettings,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// API Request Models
// =============================================================================

/// Request to create a new stream
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStreamRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    #[serde(default)]
    pub settings: StreamSettingsInput,
}

/// Partial update applied through `update_stream`.
///
/// Patches touching encode-relevant fields (`qualities`,
/// `enable_recording`) are rejected while the stream is active.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StreamPatch {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    pub qualities: Option<Vec<String>>,
    pub enable_recording: Option<bool>,
    pub max_concurrent_viewers: Option<u32>,
}

impl StreamPatch {
    /// Mutating encode parameters mid-broadcast is unsafe.
    pub fn touches_encode_settings(&self) -> bool {
        self.qualities.is_some() || self.enable_recording.is_some()
    }
}

// =============================================================================
// Stream Keys
// =============================================================================

const STREAM_KEY_PREFIX: &str = "lsk_";

/// Generate a fresh ingest key: `lsk_` + 32 lowercase hex chars.
pub fn generate_stream_key() -> String {
    format!("{}{}", STREAM_KEY_PREFIX, Uuid::new_v4().simple())
}

/// Key-format validity is a lifecycle precondition checked before any
/// repository lookup on the ingest-authentication path.
pub fn is_valid_stream_key(key: &str) -> bool {
    match key.strip_prefix(STREAM_KEY_PREFIX) {
        Some(rest) => {
            rest.len() == 32 && rest.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
        }
        None => false,
    }
}
