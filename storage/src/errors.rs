//! Failure domain for the best-effort sinks. Nothing in this crate's public
//! API surfaces `StorageError` to callers outside the crate: it exists so
//! internal plumbing can use `?`, but every sink method catches it at the
//! boundary and logs instead of returning it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("relational sink error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("vector sink error: {0}")]
    Qdrant(String),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
