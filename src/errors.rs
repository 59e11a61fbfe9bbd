use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use sqlx::Error as SqlxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    MethodNotAllowed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{message}")]
    Stripe { status: u16, message: String },

    #[error("{message}")]
    Plaid { code: String, message: String },

    #[error("Password error: {0}")]
    PasswordError(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl From<actix_identity::error::LoginError> for AppError {
    fn from(err: actix_identity::error::LoginError) -> Self {
        AppError::SessionError(err.to_string())
    }
}

impl From<actix_identity::error::GetIdentityError> for AppError {
    fn from(err: actix_identity::error::GetIdentityError) -> Self {
        AppError::SessionError(err.to_string())
    }
}

impl AppError {
    /// Error code used by the RPC envelope.
    pub fn rpc_code(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "BAD_REQUEST",
            StatusCode::UNAUTHORIZED => "UNAUTHORIZED",
            StatusCode::NOT_FOUND => "NOT_FOUND",
            StatusCode::METHOD_NOT_ALLOWED => "METHOD_NOT_SUPPORTED",
            _ => "INTERNAL_SERVER_ERROR",
        }
    }

    /// The same error in the RPC envelope.
    pub fn rpc_response(&self) -> HttpResponse {
        self.log();
        let status = self.status_code();
        HttpResponse::build(status).json(json!({
            "error": {
                "message": self.to_string(),
                "code": self.rpc_code(),
                "httpStatus": status.as_u16(),
            }
        }))
    }

    fn log(&self) {
        match self {
            AppError::Stripe { status, message } => {
                log::warn!("Stripe responded with {}: {}", status, message)
            }
            AppError::Plaid { code, message } => {
                log::warn!("Plaid responded with {}: {}", code, message)
            }
            err if err.status_code().is_server_error() => log::error!("{}", err),
            _ => {}
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::JsonError(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Stripe { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::Plaid { .. } => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::DatabaseError(_)
            | AppError::MigrateError(_)
            | AppError::RedisError(_)
            | AppError::HttpError(_)
            | AppError::PasswordError(_)
            | AppError::SessionError(_)
            | AppError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        self.log();
        HttpResponse::build(self.status_code()).json(json!({ "message": self.to_string() }))
    }
}

impl From<AppError> for std::io::Error {
    fn from(err: AppError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
    }
}
