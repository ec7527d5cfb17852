use crate::error::Result;
use crate::id::{OwnerId, UrlId};
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One persisted URL mapping.
///
/// The serialized field names double as the file backend's line format and
/// mirror the database column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRow {
    #[serde(rename = "uuid")]
    pub id: UrlId,
    #[serde(rename = "short_url")]
    pub short_code: ShortCode,
    pub original_url: String,
    /// `None` until an ownership assignment completes.
    #[serde(rename = "user_id", default)]
    pub owner_id: Option<OwnerId>,
    #[serde(rename = "is_deleted", default)]
    pub deleted: bool,
}

impl UrlRow {
    /// Builds a fresh, unowned and live row for `new`.
    pub fn create(new: NewUrl) -> Self {
        Self {
            id: UrlId::new(),
            short_code: new.short_code,
            original_url: new.original_url,
            owner_id: None,
            deleted: false,
        }
    }

    /// Returns `true` if `owner` owns the row.
    pub fn is_owned_by(&self, owner: OwnerId) -> bool {
        self.owner_id == Some(owner)
    }
}

/// A URL waiting to be inserted, with the short code already assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUrl {
    pub short_code: ShortCode,
    pub original_url: String,
}

impl NewUrl {
    pub fn new(short_code: ShortCode, original_url: impl Into<String>) -> Self {
        Self {
            short_code,
            original_url: original_url.into(),
        }
    }
}

/// Aggregate counters over a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlStats {
    /// Number of distinct short codes.
    pub urls: usize,
    /// Number of distinct owners; unowned rows are not counted.
    pub users: usize,
}

/// The authoritative set of URL mappings.
///
/// Every backend enforces original-URL uniqueness among non-deleted rows
/// and never physically removes a row.
#[async_trait]
pub trait UrlStore: Send + Sync + 'static {
    /// Inserts a new row and returns its id.
    ///
    /// Returns `Err(DuplicateOriginalUrl)` if a live row already maps the
    /// same original URL.
    async fn insert(&self, new: NewUrl) -> Result<UrlId>;

    /// Inserts a batch of rows, returning ids aligned with the input.
    ///
    /// Atomicity is backend specific: transactional backends roll back on
    /// the first failure, the others insert element by element and report
    /// `Err(PartialBatch)` with whatever made it in.
    async fn batch_insert(&self, batch: Vec<NewUrl>) -> Result<Vec<UrlId>>;

    /// Point lookup by short code. Soft-deleted rows are returned too.
    async fn find_by_short_code(&self, code: &ShortCode) -> Result<Option<UrlRow>>;

    /// Reverse lookup of the live row for an original URL.
    async fn find_by_original_url(&self, original_url: &str) -> Result<Option<ShortCode>>;

    /// All rows owned by `owner`. An empty vector means nothing matched.
    async fn find_by_owner(&self, owner: OwnerId) -> Result<Vec<UrlRow>>;

    /// Marks the rows for `codes` as deleted where `owner` owns them.
    ///
    /// Codes that are missing, owned by someone else or already deleted are
    /// left untouched without an error.
    async fn soft_delete(&self, codes: &[ShortCode], owner: OwnerId) -> Result<()>;

    /// Counts distinct short codes and owners.
    async fn stats(&self) -> Result<UrlStats>;

    /// Checks that the backing storage is reachable.
    async fn ping(&self) -> Result<()>;
}

/// Links previously inserted rows to their owning user.
#[async_trait]
pub trait OwnershipStore: Send + Sync + 'static {
    /// Sets the owner of exactly one row. Returns `Err(NotFound)` if no row
    /// has the given id.
    async fn assign_owner(&self, id: UrlId, owner: OwnerId) -> Result<()>;

    /// Sets the owner of every row in `ids`.
    ///
    /// Returns `Err(CountMismatch)` and changes nothing if some of the ids
    /// do not exist.
    async fn assign_owner_batch(&self, ids: &[UrlId], owner: OwnerId) -> Result<()>;
}
