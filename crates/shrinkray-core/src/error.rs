use crate::id::UrlId;
use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors returned by [`UrlStore`](crate::UrlStore) and
/// [`OwnershipStore`](crate::OwnershipStore) implementations.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("original url already exists: {0}")]
    DuplicateOriginalUrl(String),
    #[error("url not found: {0}")]
    NotFound(String),
    #[error("expected to update {expected} rows, but {actual} rows were updated")]
    CountMismatch { expected: usize, actual: usize },
    /// A non-atomic batch where some elements were persisted and others failed.
    ///
    /// `inserted` is aligned with the input batch: `Some(id)` for every element
    /// that made it into the store.
    #[error("batch partially failed: {}", join_errors(.errors))]
    PartialBatch {
        inserted: Vec<Option<UrlId>>,
        errors: Vec<StorageError>,
    },
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage io failed: {0}")]
    Io(String),
}

impl StorageError {
    /// Folds per-element batch outcomes into a single result.
    ///
    /// Returns the ids when every element succeeded, otherwise a
    /// [`StorageError::PartialBatch`] carrying the survivors and every error.
    pub fn collect_batch(
        inserted: Vec<Option<UrlId>>,
        errors: Vec<StorageError>,
    ) -> Result<Vec<UrlId>> {
        if errors.is_empty() {
            return Ok(inserted.into_iter().flatten().collect());
        }
        Err(StorageError::PartialBatch { inserted, errors })
    }
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

fn join_errors(errors: &[StorageError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
