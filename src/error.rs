use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use thiserror::Error;

use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("Insufficient funds. Required: {required:.2}, Available: {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },
    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),
    #[error("{0}")]
    InvalidQr(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Storage error: {0}")]
    Store(String),
    #[error("{0}")]
    Internal(String),
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Store(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            StoreError::AlreadyCompleted => {
                AppError::InvalidState("Trip is already completed".to_string())
            }
            StoreError::ActiveTripExists => {
                AppError::Conflict("User already has an active trip".to_string())
            }
            StoreError::InsufficientFunds {
                required,
                available,
            } => AppError::InsufficientFunds {
                required,
                available,
            },
            StoreError::InvalidAmount(amount) => AppError::InvalidAmount(amount),
            StoreError::Database(e) => AppError::Store(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_)
            | AppError::BadRequest(_)
            | AppError::InvalidAmount(_)
            | AppError::InvalidQr(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) | AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Persistence details stay in the logs
        let message = match &self {
            AppError::Store(detail) | AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed with internal error");
                "Something went wrong, please try again".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
