//! Health sweeper
//!
//! Periodic background task that detects silent failures: active streams
//! whose ingest died without ever signaling "ended". Any tracked stream
//! whose last heartbeat is older than the timeout threshold is
//! force-transitioned to `ended` and dropped from the registry.

use super::clock::SharedClock;
use super::coordinator::{ForceEndReason, StreamCoordinator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub const DEFAULT_SWEEP_PERIOD_SECS: u64 = 30;
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: i64 = 120;

pub struct HealthSweeper {
    coordinator: Arc<StreamCoordinator>,
    clock: SharedClock,
    period: Duration,
    heartbeat_timeout_secs: i64,
}

impl HealthSweeper {
    pub fn new(
        coordinator: Arc<StreamCoordinator>,
        clock: SharedClock,
        period: Duration,
        heartbeat_timeout_secs: i64,
    ) -> Self {
        Self {
            coordinator,
            clock,
            period,
            heartbeat_timeout_secs,
        }
    }

    /// Run the sweep loop until the shutdown signal fires.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            // The first tick resolves immediately; skip it so a fresh
            // process does not sweep before anything has heartbeated.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let reaped = self.sweep_once().await;
                        if reaped > 0 {
                            tracing::info!(reaped, "sweeper reaped stale streams");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("health sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// One sweep pass. Works on a snapshot so no registry lock is held
    /// while force-ending; each stream's failure is isolated.
    pub async fn sweep_once(&self) -> usize {
        let now = self.clock.now();
        let snapshot = self.coordinator.all_active_health();
        let mut reaped = 0;

        for (stream_id, metrics) in snapshot {
            let age_secs = (now - metrics.last_heartbeat).num_seconds();
            if age_secs <= self.heartbeat_timeout_secs {
                continue;
            }

            tracing::warn!(%stream_id, age_secs, "heartbeat timeout; force-ending stream");
            match self
                .coordinator
                .force_end(stream_id, ForceEndReason::HeartbeatTimeout)
                .await
            {
                Ok(_) => reaped += 1,
                Err(e) => {
                    tracing::error!(%stream_id, error = %e, "failed to force-end stale stream")
                }
            }
        }

        reaped
    }
}
