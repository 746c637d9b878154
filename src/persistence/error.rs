use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures talking to the remote document store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Credentials file not found at {}", .0.display())]
    MissingCredentials(PathBuf),

    #[error("Invalid credentials in {}: {reason}", path.display())]
    InvalidCredentials { path: PathBuf, reason: String },

    #[error("Token exchange failed: {0}")]
    Auth(String),

    #[error("Connection attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Document encoding error: {0}")]
    Codec(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
