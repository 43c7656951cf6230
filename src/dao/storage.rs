use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by race stores regardless of the backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend could not be reached or rejected the write.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What the store was doing.
        message: String,
        #[source]
        /// Backend failure.
        source: Box<dyn Error + Send + Sync>,
    },
    /// Finished race could not be encoded for the backend.
    #[error("failed to encode race {race_id}")]
    Encoding {
        /// Race being stored.
        race_id: u64,
        #[source]
        /// Encoder failure.
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
