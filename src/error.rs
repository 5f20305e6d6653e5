//! Error types for atelier

use hyper::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtelierError {
    /// Caller is not authenticated (missing or invalid token)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but not the owner/participant
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Request validation failure
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// Unexpected uniqueness/foreign-key violation. The two places where a
    /// conflict is a recoverable outcome (conversation get-or-create,
    /// resonance toggle) never surface this variant.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Mentor backend failure. Handlers convert this to a soft
    /// "mentor unavailable" response before it reaches the wire.
    #[error("Mentor error: {0}")]
    Mentor(String),

    /// Payment API failure; the raw message is surfaced to the caller.
    #[error("Billing error: {0}")]
    Billing(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AtelierError {
    /// HTTP status for surfacing this error to a client.
    pub fn status(&self) -> StatusCode {
        match self {
            AtelierError::Unauthorized(_) | AtelierError::Auth(_) => StatusCode::UNAUTHORIZED,
            AtelierError::Forbidden(_) => StatusCode::FORBIDDEN,
            AtelierError::NotFound(_) => StatusCode::NOT_FOUND,
            AtelierError::Invalid(_) | AtelierError::Http(_) => StatusCode::BAD_REQUEST,
            AtelierError::Conflict(_) => StatusCode::CONFLICT,
            AtelierError::Billing(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for AtelierError {
    fn from(e: rusqlite::Error) -> Self {
        AtelierError::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AtelierError>;
