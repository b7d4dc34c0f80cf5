use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Cache error: {0}")]
    CacheError(#[from] redis::RedisError),

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("Insufficient cards")]
    InsufficientCards,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Daily purchase limit reached")]
    PurchaseLimitReached,

    #[error("Daily limit exceeded")]
    DailyGrantLimit,

    #[error("New task cannot be created before the last task's grant time")]
    GrantPending,

    #[error("No eligible prizes available at this time")]
    NoEligiblePrizes,

    #[error("No prizes available after quota check")]
    NoPrizesAvailable,

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl AppError {
    /// Text exposed to clients. Persistence failures are reported generically.
    fn public_message(&self) -> String {
        match self {
            AppError::DatabaseError(_) => "Database error".to_string(),
            AppError::CacheError(_) => "Cache error".to_string(),
            AppError::InternalError(_) | AppError::SerdeJsonError(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::GrantPending => StatusCode::BAD_REQUEST,
            AppError::InsufficientBalance => StatusCode::PAYMENT_REQUIRED,
            AppError::InsufficientCards | AppError::PurchaseLimitReached => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::DailyGrantLimit => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        match self {
            AppError::ValidationError(msg) => log::warn!("Validation error: {msg}"),
            AppError::NotFound(msg) => log::debug!("Not found: {msg}"),
            AppError::InsufficientCards
            | AppError::InsufficientBalance
            | AppError::PurchaseLimitReached
            | AppError::DailyGrantLimit
            | AppError::GrantPending
            | AppError::AlreadyExists(_) => log::info!("Request rejected: {self}"),
            AppError::DatabaseError(err) => log::error!("Database error: {err}"),
            AppError::CacheError(err) => log::error!("Cache error: {err}"),
            _ => log::error!("Internal error: {self}"),
        }

        HttpResponse::build(status_code).json(json!({
            "code": status_code.as_u16(),
            "message": status_code.canonical_reason().unwrap_or("Error"),
            "error": self.public_message(),
        }))
    }
}
