//! Health telemetry handlers
//!
//! Heartbeat ingestion is loss-tolerant by design: a heartbeat for a stream
//! that already ended returns 204 and changes nothing.

use actix_web::{web, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::AppError;
use crate::services::streaming::HealthUpdate;

pub async fn update_health(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: web::Json<HealthUpdate>,
) -> HttpResponse {
    match state
        .coordinator
        .update_health(path.into_inner(), payload.into_inner())
        .await
    {
        Some(metrics) => HttpResponse::Ok().json(metrics),
        // Late telemetry after the stream ended; harmless
        None => HttpResponse::NoContent().finish(),
    }
}

pub async fn get_health(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    match state.coordinator.get_health(path.into_inner()) {
        Some(metrics) => Ok(HttpResponse::Ok().json(metrics)),
        None => Err(AppError::NotFound),
    }
}

pub async fn all_active_health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.coordinator.all_active_health())
}

/// Service liveness probe.
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}
