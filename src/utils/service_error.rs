// Service Error type shared by handlers and services
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found")]
    NotFound,

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Webhook signature verification failed: {0}")]
    SignatureError(String),

    #[error("Concurrent update conflict")]
    ConcurrencyConflict,

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal server error")]
    InternalError,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ServiceError::DatabaseError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ServiceError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            ServiceError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
            // Retryable by the external sweep, not by the caller
            ServiceError::ChannelError(msg) => (StatusCode::BAD_GATEWAY, msg),
            // Non-2xx so the payment provider re-delivers with backoff
            ServiceError::SignatureError(msg) => (StatusCode::BAD_REQUEST, msg),
            ServiceError::ConcurrencyConflict => (
                StatusCode::CONFLICT,
                "Concurrent update conflict, retry with a fresh read".to_string(),
            ),
            ServiceError::CacheError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ServiceError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ServiceError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

// Conversion from various error types
impl From<diesel::result::Error> for ServiceError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => ServiceError::NotFound,
            _ => ServiceError::DatabaseError(error.to_string()),
        }
    }
}

impl From<redis::RedisError> for ServiceError {
    fn from(error: redis::RedisError) -> Self {
        ServiceError::CacheError(error.to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(error: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(error.to_string())
    }
}

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for ServiceError {
    fn from(error: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        ServiceError::DatabaseError(error.to_string())
    }
}

impl From<crate::db::StoreError> for ServiceError {
    fn from(error: crate::db::StoreError) -> Self {
        match error {
            crate::db::StoreError::Conflict => ServiceError::ConcurrencyConflict,
            other => ServiceError::DatabaseError(other.to_string()),
        }
    }
}

impl From<crate::services::campaign_engine::EngineError> for ServiceError {
    fn from(error: crate::services::campaign_engine::EngineError) -> Self {
        use crate::services::campaign_engine::EngineError;
        match error {
            EngineError::ContactNotFound
            | EngineError::CampaignNotFound
            | EngineError::EnrollmentNotFound => ServiceError::NotFound,
            EngineError::CampaignInactive | EngineError::CampaignEmpty => {
                ServiceError::ValidationError(error.to_string())
            },
            EngineError::NoRecipient(msg) => ServiceError::ValidationError(msg),
            EngineError::ConcurrencyConflict => ServiceError::ConcurrencyConflict,
            EngineError::Channel(e) => ServiceError::ChannelError(e.to_string()),
            EngineError::Store(e) => e.into(),
        }
    }
}
