use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation against a session in a state that cannot accept it
    /// (already completed, no more questions).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Link expired/used up, or the question bank cannot supply a full set.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Uniqueness backstop fired: duplicate session for a (candidate, link)
    /// pair or a second attempt for the same question slot.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation error: {0}")]
    RequestValidation(#[from] validator::ValidationErrors),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self {
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::InvalidState(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::ResourceExhausted(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::RequestValidation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Database(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            Error::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            Error::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred".to_string(),
            ),
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}
