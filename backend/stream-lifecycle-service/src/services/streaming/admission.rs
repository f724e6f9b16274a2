//! Admission control
//!
//! Caps the number of concurrently *active* streams per owner. Inactive
//! records are free: only active streams consume delivery capacity.

use super::repository::StreamRepository;
use crate::error::Result;
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_MAX_ACTIVE_STREAMS_PER_OWNER: u32 = 5;

pub struct AdmissionController {
    repo: Arc<dyn StreamRepository>,
    max_active_per_owner: u32,
}

impl AdmissionController {
    pub fn new(repo: Arc<dyn StreamRepository>, max_active_per_owner: u32) -> Self {
        Self {
            repo,
            max_active_per_owner,
        }
    }

    pub fn limit(&self) -> u32 {
        self.max_active_per_owner
    }

    pub async fn current_active_count(&self, owner_id: Uuid) -> Result<usize> {
        Ok(self.repo.list_active_by_owner(owner_id).await?.len())
    }

    /// Whether the owner may bring one more stream to `active`.
    pub async fn can_activate(&self, owner_id: Uuid) -> Result<bool> {
        let active = self.current_active_count(owner_id).await?;
        Ok(active < self.max_active_per_owner as usize)
    }
}
