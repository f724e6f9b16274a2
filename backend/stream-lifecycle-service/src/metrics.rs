//! Prometheus metrics for stream lifecycle
//!
//! Tracks:
//! - streamhub_active_streams (gauge)
//! - streamhub_lifecycle_transitions_total (counter, by transition)
//! - streamhub_forced_ends_total (counter, by reason)
//! - streamhub_health_score (gauge, by stream_id)
//! - streamhub_low_score_events_total (counter)

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter,
    CounterVec, Encoder, Gauge, GaugeVec, TextEncoder,
};

lazy_static! {
    /// Current number of active broadcasts in this process's view
    pub static ref ACTIVE_STREAMS: Gauge = register_gauge!(
        "streamhub_active_streams",
        "Number of currently active streams"
    )
    .unwrap();

    /// Lifecycle transitions, labeled start/end
    pub static ref LIFECYCLE_TRANSITIONS: CounterVec = register_counter_vec!(
        "streamhub_lifecycle_transitions_total",
        "Stream lifecycle transitions",
        &["transition"]
    )
    .unwrap();

    /// Streams terminated without an owner call, labeled by reason
    pub static ref FORCED_ENDS: CounterVec = register_counter_vec!(
        "streamhub_forced_ends_total",
        "Streams force-ended by the sweeper or fault handling",
        &["reason"]
    )
    .unwrap();

    /// Latest derived health score per tracked stream
    pub static ref HEALTH_SCORE: GaugeVec = register_gauge_vec!(
        "streamhub_health_score",
        "Derived 0-100 health score",
        &["stream_id"]
    )
    .unwrap();

    /// Heartbeats whose recomputed score fell below the alert threshold
    pub static ref LOW_SCORE_EVENTS: Counter = register_counter!(
        "streamhub_low_score_events_total",
        "Health updates that scored below 50"
    )
    .unwrap();
}

/// Text-encoded metrics for the `/metrics` endpoint.
pub async fn metrics_handler() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }
    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
