//! Lifecycle event publishing
//!
//! Other subsystems learn about lifecycle transitions through the
//! `NotificationSink`. Publishing is best-effort: a sink failure is logged
//! and never fails the lifecycle operation that triggered it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventType {
    StreamStarted,
    StreamEnded,
    StreamError,
}

impl StreamEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreamStarted => "stream_started",
            Self::StreamEnded => "stream_ended",
            Self::StreamError => "stream_error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    pub event_type: StreamEventType,
    pub stream_id: Uuid,
    pub owner_id: Uuid,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(&self, event: StreamEvent) -> anyhow::Result<()>;
}

/// POSTs each event as JSON to a downstream webhook.
pub struct WebhookNotificationSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotificationSink {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn emit(&self, event: StreamEvent) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(&event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Writes events to the log; default sink for local runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn emit(&self, event: StreamEvent) -> anyhow::Result<()> {
        tracing::info!(
            event_type = event.event_type.as_str(),
            stream_id = %event.stream_id,
            owner_id = %event.owner_id,
            data = %event.data,
            "stream lifecycle event"
        );
        Ok(())
    }
}
