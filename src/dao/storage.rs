use std::error::Error;
use thiserror::Error;

/// Result alias for lobby store operations.
pub type StorageResult<T> = Result<T, StorageError>;

type BackendError = Box<dyn Error + Send + Sync>;

/// Failure of a lobby store, whichever backend produced it.
///
/// Services never inspect the backend error; they log it and answer the client with a generic
/// `party_error`.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not serve the request.
    #[error("lobby store unavailable: {message}")]
    Unavailable {
        /// Summary of the failed operation.
        message: String,
        #[source]
        source: BackendError,
    },
}

impl StorageError {
    /// Wrap a backend failure, keeping its display text as the summary.
    pub fn backend(source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message: source.to_string(),
            source: Box::new(source),
        }
    }
}
