//! Health registry and scoring
//!
//! In-memory table of the latest telemetry per active stream, plus the
//! derived 0-100 health score. Entries exist exactly while a stream is
//! active; late telemetry after a stream ends is silently dropped.
//!
//! The registry is hit concurrently from heartbeat ingestion, lifecycle
//! transitions and the sweeper. `DashMap` entry locking serializes updates
//! per stream id; every critical section is O(1) arithmetic and no I/O ever
//! happens under a shard lock.

use super::clock::SharedClock;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// Scoring weights and thresholds are fixed constants of the design,
// not configuration.
const BITRATE_CEILING_KBPS: f64 = 6000.0;
const FRAME_RATE_CEILING: f64 = 60.0;
const BITRATE_WEIGHT: f64 = 40.0;
const FRAME_RATE_WEIGHT: f64 = 30.0;
const DROP_WEIGHT: f64 = 30.0;

pub const LOW_SCORE_THRESHOLD: u8 = 50;

const ISSUE_BITRATE_FLOOR_KBPS: f64 = 1000.0;
const ISSUE_FRAME_RATE_FLOOR: f64 = 15.0;
const ISSUE_DROP_RATIO: f64 = 0.05;
const ISSUE_HEARTBEAT_GAP_SECS: i64 = 30;

// =============================================================================
// Metrics model
// =============================================================================

/// Derived connection quality, monotonic with the health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ConnectionQuality {
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Self::Excellent,
            70..=89 => Self::Good,
            50..=69 => Self::Fair,
            _ => Self::Poor,
        }
    }
}

/// Latest telemetry and derived score for one active stream.
/// Ephemeral: never persisted, reconstructible from the next heartbeat.
#[derive(Debug, Clone, Serialize)]
pub struct HealthMetrics {
    pub stream_id: Uuid,
    pub bitrate_kbps: f64,
    pub frame_rate: f64,
    pub dropped_frames: u64,
    pub total_frames: u64,
    pub last_heartbeat: DateTime<Utc>,
    pub health_score: u8,
    pub connection_quality: ConnectionQuality,
}

/// Partial heartbeat payload from the ingest pipeline. Absent fields keep
/// their previous value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthUpdate {
    pub bitrate_kbps: Option<f64>,
    pub frame_rate: Option<f64>,
    pub dropped_frames: Option<u64>,
    pub total_frames: Option<u64>,
}

/// 40/30/30 weighted score over bitrate, frame rate and drop rate,
/// rounded and clamped to [0, 100].
pub fn compute_health_score(
    bitrate_kbps: f64,
    frame_rate: f64,
    dropped_frames: u64,
    total_frames: u64,
) -> u8 {
    let bitrate_score = (bitrate_kbps / BITRATE_CEILING_KBPS).min(1.0).max(0.0) * BITRATE_WEIGHT;
    let frame_rate_score = (frame_rate / FRAME_RATE_CEILING).min(1.0).max(0.0) * FRAME_RATE_WEIGHT;
    let drop_score = if total_frames > 0 {
        (1.0 - dropped_frames as f64 / total_frames as f64) * DROP_WEIGHT
    } else {
        DROP_WEIGHT
    };

    (bitrate_score + frame_rate_score + drop_score)
        .round()
        .clamp(0.0, 100.0) as u8
}

// =============================================================================
// Issue detection
// =============================================================================

/// Describe everything currently wrong with a stream's telemetry.
/// All matching issues are collected, not just the first.
pub fn detect_issues(metrics: &HealthMetrics, now: DateTime<Utc>) -> Vec<String> {
    let mut issues = Vec::new();

    if metrics.bitrate_kbps < ISSUE_BITRATE_FLOOR_KBPS {
        issues.push("Low bitrate detected".to_string());
    }
    if metrics.frame_rate < ISSUE_FRAME_RATE_FLOOR {
        issues.push("Low frame rate detected".to_string());
    }
    if metrics.total_frames > 0
        && metrics.dropped_frames as f64 / metrics.total_frames as f64 > ISSUE_DROP_RATIO
    {
        issues.push("High frame drop rate detected".to_string());
    }
    if (now - metrics.last_heartbeat).num_seconds() > ISSUE_HEARTBEAT_GAP_SECS {
        issues.push("Connection timeout detected".to_string());
    }

    issues
}

// =============================================================================
// Registry
// =============================================================================

/// Shared health table. Only atomic operations are exposed; the map itself
/// never leaks.
pub struct HealthRegistry {
    entries: DashMap<Uuid, HealthMetrics>,
    clock: SharedClock,
}

impl HealthRegistry {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Create the entry for a freshly activated stream: all-zero metrics,
    /// full score, `good` quality until the first real heartbeat.
    pub fn initialize(&self, stream_id: Uuid) {
        let metrics = HealthMetrics {
            stream_id,
            bitrate_kbps: 0.0,
            frame_rate: 0.0,
            dropped_frames: 0,
            total_frames: 0,
            last_heartbeat: self.clock.now(),
            health_score: 100,
            connection_quality: ConnectionQuality::Good,
        };
        self.entries.insert(stream_id, metrics);
    }

    /// Apply a heartbeat and recompute the score. Returns `None` when the
    /// stream has no entry (already ended) - late telemetry is harmless.
    pub fn update(&self, stream_id: Uuid, update: HealthUpdate) -> Option<HealthMetrics> {
        let mut entry = self.entries.get_mut(&stream_id)?;

        if let Some(bitrate) = update.bitrate_kbps {
            entry.bitrate_kbps = bitrate;
        }
        if let Some(frame_rate) = update.frame_rate {
            entry.frame_rate = frame_rate;
        }
        if let Some(dropped) = update.dropped_frames {
            entry.dropped_frames = dropped;
        }
        if let Some(total) = update.total_frames {
            entry.total_frames = total;
        }
        entry.dropped_frames = entry.dropped_frames.min(entry.total_frames);
        entry.last_heartbeat = self.clock.now();

        entry.health_score = compute_health_score(
            entry.bitrate_kbps,
            entry.frame_rate,
            entry.dropped_frames,
            entry.total_frames,
        );
        entry.connection_quality = ConnectionQuality::from_score(entry.health_score);

        Some(entry.value().clone())
    }

    /// Refresh the heartbeat without new telemetry. A viewer-count ping is
    /// itself evidence of liveness.
    pub fn touch(&self, stream_id: Uuid) {
        if let Some(mut entry) = self.entries.get_mut(&stream_id) {
            entry.last_heartbeat = self.clock.now();
        }
    }

    pub fn get(&self, stream_id: Uuid) -> Option<HealthMetrics> {
        self.entries.get(&stream_id).map(|e| e.value().clone())
    }

    /// Drop the entry. Removal is atomic, so of two racing terminations
    /// exactly one sees `Some` and owns the follow-up teardown.
    pub fn remove(&self, stream_id: Uuid) -> Option<HealthMetrics> {
        self.entries.remove(&stream_id).map(|(_, metrics)| metrics)
    }

    /// Clone all entries. Callers (the sweeper) act on the snapshot outside
    /// any registry lock.
    pub fn snapshot_all(&self) -> HashMap<Uuid, HealthMetrics> {
        self.entries
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::streaming::clock::{Clock, SystemClock};
    use chrono::Duration;
    use std::sync::Arc;

    fn registry() -> HealthRegistry {
        HealthRegistry::new(Arc::new(SystemClock))
    }

    fn sample(
        bitrate_kbps: f64,
        frame_rate: f64,
        dropped_frames: u64,
        total_frames: u64,
    ) -> HealthUpdate {
        HealthUpdate {
            bitrate_kbps: Some(bitrate_kbps),
            frame_rate: Some(frame_rate),
            dropped_frames: Some(dropped_frames),
            total_frames: Some(total_frames),
        }
    }

    #[test]
    fn test_perfect_telemetry_scores_100() {
        assert_eq!(compute_health_score(6000.0, 60.0, 0, 1000), 100);
    }

    #[test]
    fn test_dead_connection_scores_0() {
        assert_eq!(compute_health_score(0.0, 0.0, 100, 100), 0);
    }

    #[test]
    fn test_no_frames_yet_gets_full_drop_score() {
        // 0/40 bitrate + 0/30 fps + 30 free drop points
        assert_eq!(compute_health_score(0.0, 0.0, 0, 0), 30);
    }

    #[test]
    fn test_score_components() {
        // Half bitrate (20) + half fps (15) + clean frames (30) = 65
        assert_eq!(compute_health_score(3000.0, 30.0, 0, 1000), 65);
        // Bitrate above ceiling is capped
        assert_eq!(compute_health_score(12000.0, 120.0, 0, 1000), 100);
        // 10% drops: 40 + 30 + 27 = 97
        assert_eq!(compute_health_score(6000.0, 60.0, 100, 1000), 97);
    }

    #[test]
    fn test_score_always_in_range() {
        for bitrate in [0.0, 500.0, 6000.0, 1.0e9] {
            for fps in [0.0, 15.0, 60.0, 1000.0] {
                for (dropped, total) in [(0u64, 0u64), (0, 1000), (1000, 1000), (37, 113)] {
                    let score = compute_health_score(bitrate, fps, dropped, total);
                    assert!(score <= 100);
                }
            }
        }
    }

    #[test]
    fn test_quality_thresholds() {
        assert_eq!(ConnectionQuality::from_score(100), ConnectionQuality::Excellent);
        assert_eq!(ConnectionQuality::from_score(90), ConnectionQuality::Excellent);
        assert_eq!(ConnectionQuality::from_score(89), ConnectionQuality::Good);
        assert_eq!(ConnectionQuality::from_score(70), ConnectionQuality::Good);
        assert_eq!(ConnectionQuality::from_score(69), ConnectionQuality::Fair);
        assert_eq!(ConnectionQuality::from_score(50), ConnectionQuality::Fair);
        assert_eq!(ConnectionQuality::from_score(49), ConnectionQuality::Poor);
        assert_eq!(ConnectionQuality::from_score(0), ConnectionQuality::Poor);
    }

    #[test]
    fn test_quality_monotonic_in_score() {
        fn rank(q: ConnectionQuality) -> u8 {
            match q {
                ConnectionQuality::Poor => 0,
                ConnectionQuality::Fair => 1,
                ConnectionQuality::Good => 2,
                ConnectionQuality::Excellent => 3,
            }
        }
        let mut prev = rank(ConnectionQuality::from_score(0));
        for score in 1..=100u8 {
            let cur = rank(ConnectionQuality::from_score(score));
            assert!(cur >= prev, "quality regressed at score {score}");
            prev = cur;
        }
    }

    #[test]
    fn test_initialize_starts_healthy() {
        let registry = registry();
        let id = Uuid::new_v4();
        registry.initialize(id);

        let metrics = registry.get(id).unwrap();
        assert_eq!(metrics.health_score, 100);
        assert_eq!(metrics.connection_quality, ConnectionQuality::Good);
        assert_eq!(metrics.total_frames, 0);
    }

    #[test]
    fn test_update_recomputes_score_and_quality() {
        let registry = registry();
        let id = Uuid::new_v4();
        registry.initialize(id);

        let metrics = registry.update(id, sample(6000.0, 60.0, 0, 1000)).unwrap();
        assert_eq!(metrics.health_score, 100);
        assert_eq!(metrics.connection_quality, ConnectionQuality::Excellent);

        let metrics = registry.update(id, sample(0.0, 0.0, 100, 100)).unwrap();
        assert_eq!(metrics.health_score, 0);
        assert_eq!(metrics.connection_quality, ConnectionQuality::Poor);
    }

    #[test]
    fn test_partial_update_keeps_previous_values() {
        let registry = registry();
        let id = Uuid::new_v4();
        registry.initialize(id);
        registry.update(id, sample(6000.0, 60.0, 0, 1000));

        let metrics = registry
            .update(
                id,
                HealthUpdate {
                    frame_rate: Some(30.0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(metrics.bitrate_kbps, 6000.0);
        assert_eq!(metrics.frame_rate, 30.0);
    }

    #[test]
    fn test_update_absent_entry_is_noop() {
        let registry = registry();
        let id = Uuid::new_v4();
        assert!(registry.update(id, sample(6000.0, 60.0, 0, 1000)).is_none());
        assert!(registry.get(id).is_none());
    }

    #[test]
    fn test_remove_then_late_heartbeat() {
        let registry = registry();
        let id = Uuid::new_v4();
        registry.initialize(id);
        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(registry.update(id, sample(2500.0, 30.0, 0, 500)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_detect_issues_collects_all() {
        let now = SystemClock.now();
        let metrics = HealthMetrics {
            stream_id: Uuid::new_v4(),
            bitrate_kbps: 500.0,
            frame_rate: 10.0,
            dropped_frames: 100,
            total_frames: 1000,
            last_heartbeat: now - Duration::seconds(45),
            health_score: 10,
            connection_quality: ConnectionQuality::Poor,
        };
        let issues = detect_issues(&metrics, now);
        assert_eq!(
            issues,
            vec![
                "Low bitrate detected",
                "Low frame rate detected",
                "High frame drop rate detected",
                "Connection timeout detected",
            ]
        );
    }

    #[test]
    fn test_detect_issues_healthy_stream() {
        let now = SystemClock.now();
        let metrics = HealthMetrics {
            stream_id: Uuid::new_v4(),
            bitrate_kbps: 4500.0,
            frame_rate: 60.0,
            dropped_frames: 10,
            total_frames: 1000,
            last_heartbeat: now,
            health_score: 99,
            connection_quality: ConnectionQuality::Excellent,
        };
        assert!(detect_issues(&metrics, now).is_empty());
    }

    #[test]
    fn test_drop_issue_needs_frames() {
        let now = SystemClock.now();
        let metrics = HealthMetrics {
            stream_id: Uuid::new_v4(),
            bitrate_kbps: 4500.0,
            frame_rate: 60.0,
            dropped_frames: 0,
            total_frames: 0,
            last_heartbeat: now,
            health_score: 70,
            connection_quality: ConnectionQuality::Good,
        };
        assert!(detect_issues(&metrics, now).is_empty());
    }
}
