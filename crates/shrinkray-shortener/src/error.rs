use crate::model::CorrelatedUrl;
use shrinkray_core::StorageError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    /// The URL is already shortened; `short_url` is the existing link when
    /// it could still be looked up.
    #[error("url already shortened: {original_url}")]
    Conflict {
        original_url: String,
        short_url: Option<String>,
    },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// Some elements of a batch were stored and some were rejected.
    #[error("batch partially saved ({} stored): {source}", .saved.len())]
    PartialBatch {
        saved: Vec<CorrelatedUrl>,
        source: StorageError,
    },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ShortenerError {
    /// Returns `true` when the caller referenced a mapping that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ShortenerError::Storage(StorageError::NotFound(_) | StorageError::CountMismatch { .. })
        )
    }
}
