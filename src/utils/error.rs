// utils/error.rs
use actix_web::{http::header, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    // Erreurs de données
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    // Erreurs de ressources
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    // Limitation de débit
    #[error("Too many requests, please try again later.")]
    TooManyRequests { retry_after_secs: u64 },

    // Erreurs de base de données
    #[error("Database error: {0}")]
    Database(String),

    // Erreurs de processus (lancement des workers)
    #[error("Worker error: {0}")]
    Worker(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    /// Code machine renvoyé dans le corps JSON
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "BAD_REQUEST",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::NotImplemented(_) => "NOT_IMPLEMENTED",
            AppError::TooManyRequests { .. } => "TOO_MANY_REQUESTS",
            AppError::Database(_)
            | AppError::Worker(_)
            | AppError::Io(_)
            | AppError::Internal => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;

        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());

        match self {
            // 429 - Too Many Requests
            AppError::TooManyRequests { retry_after_secs } => builder
                .insert_header((header::RETRY_AFTER, retry_after_secs.to_string()))
                .json(json!({
                    "error": self.to_string(),
                    "code": self.code(),
                    "retry_after": retry_after_secs
                })),

            // 500 - on ne divulgue pas les détails
            AppError::Database(_) | AppError::Worker(_) | AppError::Io(_) | AppError::Internal => {
                tracing::error!("Internal server error: {}", self);
                builder.json(json!({
                    "error": "Internal server error",
                    "code": self.code()
                }))
            }

            _ => builder.json(json!({
                "error": self.to_string(),
                "code": self.code()
            })),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<actix_web::error::JsonPayloadError> for AppError {
    fn from(err: actix_web::error::JsonPayloadError) -> Self {
        use actix_web::error::JsonPayloadError;

        match err {
            JsonPayloadError::OverflowKnownLength { length, limit } => AppError::PayloadTooLarge(
                format!("JSON payload ({} bytes) is larger than allowed (limit: {} bytes)", length, limit),
            ),
            JsonPayloadError::Overflow { limit } => AppError::PayloadTooLarge(format!(
                "JSON payload is larger than allowed (limit: {} bytes)",
                limit
            )),
            other => AppError::Validation(other.to_string()),
        }
    }
}

// Type de résultat standard
pub type Result<T> = std::result::Result<T, AppError>;
