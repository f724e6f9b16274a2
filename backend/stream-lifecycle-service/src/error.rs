use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Closed error taxonomy for lifecycle operations.
///
/// Every coordinator operation returns `Result<_, AppError>`; callers always
/// branch on the kind rather than catching panics or downcasting.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Stream not found")]
    NotFound,

    #[error("Caller does not own this stream")]
    Unauthorized,

    #[error("Active stream limit reached ({limit})")]
    LimitExceeded { limit: u32 },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Update restricted while stream is active")]
    UpdateRestrictedWhileActive,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Delivery error: {0}")]
    Delivery(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::FORBIDDEN,
            AppError::LimitExceeded { .. } => StatusCode::CONFLICT,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::UpdateRestrictedWhileActive => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Delivery(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_type = match self {
            AppError::NotFound => "NOT_FOUND",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::LimitExceeded { .. } => "LIMIT_EXCEEDED",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::UpdateRestrictedWhileActive => "UPDATE_RESTRICTED_WHILE_ACTIVE",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Repository(_) => "REPOSITORY_ERROR",
            AppError::Delivery(_) => "DELIVERY_ERROR",
        };

        let limit = match self {
            AppError::LimitExceeded { limit } => Some(*limit),
            _ => None,
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            limit,
        })
    }
}

// Convert validator errors to AppError
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}
