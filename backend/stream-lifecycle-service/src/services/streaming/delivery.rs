//! Delivery initializer and recording finalizer
//!
//! Media ingest/transcoding lives in a separate pipeline; this subsystem only
//! tells it to start or stop delivery for a stream. The HTTP implementation
//! drives the pipeline's control endpoint; the logging implementation keeps
//! local runs self-contained.

use super::models::Stream;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait DeliveryInitializer: Send + Sync {
    /// Start media delivery with the stream's requested qualities.
    async fn start(&self, stream: &Stream) -> anyhow::Result<()>;
    /// Stop delivery. Idempotent on the pipeline side.
    async fn stop(&self, stream_id: Uuid) -> anyhow::Result<()>;
}

#[async_trait]
pub trait RecordingFinalizer: Send + Sync {
    /// Kick off recording finalization after a stream ends.
    async fn finalize(&self, stream_id: Uuid) -> anyhow::Result<()>;
}

/// Talks to the delivery pipeline's HTTP control surface.
pub struct HttpDeliveryInitializer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDeliveryInitializer {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl DeliveryInitializer for HttpDeliveryInitializer {
    async fn start(&self, stream: &Stream) -> anyhow::Result<()> {
        let url = format!("{}/delivery/{}/start", self.base_url, stream.id);
        let body = serde_json::json!({
            "stream_id": stream.id,
            "qualities": stream.settings.qualities,
        });
        self.client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn stop(&self, stream_id: Uuid) -> anyhow::Result<()> {
        let url = format!("{}/delivery/{}/stop", self.base_url, stream_id);
        self.client.post(&url).send().await?.error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl RecordingFinalizer for HttpDeliveryInitializer {
    async fn finalize(&self, stream_id: Uuid) -> anyhow::Result<()> {
        let url = format!("{}/recordings/{}/finalize", self.base_url, stream_id);
        self.client.post(&url).send().await?.error_for_status()?;
        Ok(())
    }
}

/// No-op implementation used when no pipeline URL is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingDelivery;

#[async_trait]
impl DeliveryInitializer for LoggingDelivery {
    async fn start(&self, stream: &Stream) -> anyhow::Result<()> {
        tracing::info!(stream_id = %stream.id, qualities = ?stream.settings.qualities, "delivery start (no pipeline configured)");
        Ok(())
    }

    async fn stop(&self, stream_id: Uuid) -> anyhow::Result<()> {
        tracing::info!(%stream_id, "delivery stop (no pipeline configured)");
        Ok(())
    }
}

#[async_trait]
impl RecordingFinalizer for LoggingDelivery {
    async fn finalize(&self, stream_id: Uuid) -> anyhow::Result<()> {
        tracing::info!(%stream_id, "recording finalize (no pipeline configured)");
        Ok(())
    }
}
