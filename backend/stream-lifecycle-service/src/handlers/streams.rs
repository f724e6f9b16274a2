//! Stream lifecycle handlers
//!
//! Thin layer over the coordinator. The caller's identity is resolved
//! upstream (gateway auth) and arrives in the `X-Owner-Id` header.

use actix_web::{web, HttpRequest, HttpResponse};
use uuid::Uuid;
use validator::Validate;

use crate::app_state::AppState;
use crate::error::AppError;
use crate::services::streaming::{CreateStreamRequest, StreamPatch};

pub fn extract_owner_id(req: &HttpRequest) -> Result<Uuid, AppError> {
    req.headers()
        .get("x-owner-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or_else(|| AppError::Validation("missing or malformed X-Owner-Id header".into()))
}

#[derive(Debug, serde::Deserialize)]
pub struct ViewerCountPayload {
    pub count: u32,
}

pub async fn create_stream(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<CreateStreamRequest>,
) -> Result<HttpResponse, AppError> {
    let owner_id = extract_owner_id(&req)?;
    payload.validate()?;

    let stream = state
        .coordinator
        .create_stream(owner_id, payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(stream))
}

pub async fn start_stream(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let owner_id = extract_owner_id(&req)?;
    let stream = state
        .coordinator
        .start_stream(path.into_inner(), owner_id)
        .await?;
    Ok(HttpResponse::Ok().json(stream))
}

pub async fn end_stream(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let owner_id = extract_owner_id(&req)?;
    let stream = state
        .coordinator
        .end_stream(path.into_inner(), owner_id)
        .await?;
    Ok(HttpResponse::Ok().json(stream))
}

pub async fn update_stream(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: web::Json<StreamPatch>,
) -> Result<HttpResponse, AppError> {
    let owner_id = extract_owner_id(&req)?;
    payload.validate()?;

    let stream = state
        .coordinator
        .update_stream(path.into_inner(), owner_id, payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(stream))
}

pub async fn update_viewer_count(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: web::Json<ViewerCountPayload>,
) -> Result<HttpResponse, AppError> {
    let stream = state
        .coordinator
        .update_viewer_count(path.into_inner(), payload.count)
        .await?;
    Ok(HttpResponse::Ok().json(stream))
}

pub async fn regenerate_stream_key(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let owner_id = extract_owner_id(&req)?;
    let stream = state
        .coordinator
        .regenerate_stream_key(path.into_inner(), owner_id)
        .await?;
    Ok(HttpResponse::Ok().json(stream))
}

/// Ingest-authentication lookup used by the delivery pipeline.
pub async fn get_stream_by_key(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    match state.coordinator.get_stream_by_key(&path.into_inner()).await? {
        Some(stream) => Ok(HttpResponse::Ok().json(stream)),
        None => Err(AppError::NotFound),
    }
}
