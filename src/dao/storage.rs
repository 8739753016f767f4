use std::error::Error;
use thiserror::Error;

/// Result alias for remote store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by sync-store backends regardless of the underlying service.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store could not be reached or refused the operation.
    #[error("sync store unavailable: {message}")]
    Unavailable {
        /// Human readable description of the failed operation.
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A document was fetched but its payload did not decode.
    #[error("malformed document at `{path}`: {source}")]
    Malformed {
        /// Canonical id of the offending document.
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// Concurrent writers kept invalidating the revision we were updating.
    #[error("merge of `{path}` lost the revision race too many times")]
    Contended {
        /// Canonical id of the contended document.
        path: String,
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
