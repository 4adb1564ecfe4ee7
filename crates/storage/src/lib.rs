//! Storage Layer
//!
//! CSV telemetry logs written during a session and the JSON-backed history
//! of finished sessions.

mod csv;
mod session;

pub use csv::{log_file_name, CsvLogger};
pub use session::{SessionRecord, SessionStore};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}
