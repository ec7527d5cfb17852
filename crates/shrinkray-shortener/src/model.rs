//! Values returned to the transport layer.

use shrinkray_core::{ShortCode, UrlId};

/// A freshly stored mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedUrl {
    pub id: UrlId,
    pub short_code: ShortCode,
    /// `{base_url}/{short_code}`.
    pub short_url: String,
}

/// One element of a batch shortening request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub correlation_id: String,
    pub original_url: String,
}

impl BatchItem {
    pub fn new(correlation_id: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            original_url: original_url.into(),
        }
    }
}

/// A stored batch element, tagged with the caller's correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatedUrl {
    pub correlation_id: String,
    pub saved: SavedUrl,
}

/// A mapping listed for its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedUrl {
    pub short_url: String,
    pub original_url: String,
}

/// Outcome of resolving a short code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The mapping is live; redirect to the original URL.
    Active(String),
    /// The mapping existed but was soft-deleted.
    Gone,
    /// No mapping carries the code.
    Missing,
}
