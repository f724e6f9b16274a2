//! Stream repository
//!
//! Durable storage is an external collaborator: the coordinator only ever
//! talks to the `StreamRepository` trait. The in-memory implementation below
//! is the default backing store for local runs and the test double for the
//! whole suite.

use super::models::{Stream, StreamStatus};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait StreamRepository: Send + Sync {
    async fn create(&self, stream: Stream) -> Result<Stream>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Stream>>;
    async fn get_by_key(&self, key: &str) -> Result<Option<Stream>>;
    async fn list_active_by_owner(&self, owner_id: Uuid) -> Result<Vec<Stream>>;
    /// Persist the full record; the coordinator owns all mutation.
    async fn update(&self, stream: &Stream) -> Result<Stream>;
}

/// In-memory store keyed by stream id, with a secondary key index for the
/// ingest-authentication lookup path.
#[derive(Default)]
pub struct InMemoryStreamRepository {
    inner: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    streams: HashMap<Uuid, Stream>,
    by_key: HashMap<String, Uuid>,
}

impl InMemoryStreamRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StreamRepository for InMemoryStreamRepository {
    async fn create(&self, stream: Stream) -> Result<Stream> {
        let mut tables = self.inner.write().await;
        if tables.streams.contains_key(&stream.id) {
            return Err(AppError::Repository(format!(
                "duplicate stream id {}",
                stream.id
            )));
        }
        tables.by_key.insert(stream.stream_key.clone(), stream.id);
        tables.streams.insert(stream.id, stream.clone());
        Ok(stream)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Stream>> {
        Ok(self.inner.read().await.streams.get(&id).cloned())
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<Stream>> {
        let tables = self.inner.read().await;
        Ok(tables
            .by_key
            .get(key)
            .and_then(|id| tables.streams.get(id))
            .cloned())
    }

    async fn list_active_by_owner(&self, owner_id: Uuid) -> Result<Vec<Stream>> {
        Ok(self
            .inner
            .read()
            .await
            .streams
            .values()
            .filter(|s| s.owner_id == owner_id && s.status == StreamStatus::Active)
            .cloned()
            .collect())
    }

    async fn update(&self, stream: &Stream) -> Result<Stream> {
        let mut tables = self.inner.write().await;
        let old_key = {
            let existing = tables
                .streams
                .get(&stream.id)
                .ok_or(AppError::NotFound)?;
            (existing.stream_key != stream.stream_key).then(|| existing.stream_key.clone())
        };
        // Keep the key index in sync across regeneration
        if let Some(old_key) = old_key {
            tables.by_key.remove(&old_key);
            tables.by_key.insert(stream.stream_key.clone(), stream.id);
        }
        tables.streams.insert(stream.id, stream.clone());
        Ok(stream.clone())
    }
}
