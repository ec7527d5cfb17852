use crate::rows;
use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use shrinkray_core::{
    NewUrl, OwnerId, OwnershipStore, Result, ShortCode, StorageError, UrlId, UrlRow, UrlStats,
    UrlStore,
};
use std::sync::Arc;
use tracing::trace;

/// The in-process URL table: one ordered collection behind one lock.
///
/// Cloning is cheap and every clone refers to the same rows, so the URL
/// store and the ownership store built from one `SharedRows` observe each
/// other's writes immediately. The lock is never held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct SharedRows {
    rows: Arc<Mutex<Vec<UrlRow>>>,
}

impl SharedRows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows ever inserted, deleted ones included.
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Returns a copy of every row in insertion order.
    pub fn snapshot(&self) -> Vec<UrlRow> {
        self.rows.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<UrlRow>> {
        self.rows.lock()
    }
}

/// In-memory implementation of [`UrlStore`].
#[derive(Debug, Clone)]
pub struct MemoryUrlStore {
    rows: SharedRows,
}

impl MemoryUrlStore {
    pub fn new(rows: SharedRows) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl UrlStore for MemoryUrlStore {
    async fn insert(&self, new: NewUrl) -> Result<UrlId> {
        let mut table = self.rows.lock();
        let row = rows::prepare_insert(&table, new)?;
        let id = row.id;
        trace!(id = %id, code = %row.short_code, "inserting url row");
        table.push(row);
        Ok(id)
    }

    async fn batch_insert(&self, batch: Vec<NewUrl>) -> Result<Vec<UrlId>> {
        let (inserted, errors) = {
            let mut table = self.rows.lock();
            rows::insert_each(&mut table, batch)
        };
        StorageError::collect_batch(inserted, errors)
    }

    async fn find_by_short_code(&self, code: &ShortCode) -> Result<Option<UrlRow>> {
        Ok(rows::find_by_short_code(&self.rows.lock(), code))
    }

    async fn find_by_original_url(&self, original_url: &str) -> Result<Option<ShortCode>> {
        Ok(rows::find_by_original_url(&self.rows.lock(), original_url))
    }

    async fn find_by_owner(&self, owner: OwnerId) -> Result<Vec<UrlRow>> {
        Ok(rows::find_by_owner(&self.rows.lock(), owner))
    }

    async fn soft_delete(&self, codes: &[ShortCode], owner: OwnerId) -> Result<()> {
        let changed = rows::soft_delete(&mut self.rows.lock(), codes, owner);
        trace!(owner = %owner, requested = codes.len(), changed, "soft deleted url rows");
        Ok(())
    }

    async fn stats(&self) -> Result<UrlStats> {
        Ok(rows::stats(&self.rows.lock()))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory implementation of [`OwnershipStore`].
#[derive(Debug, Clone)]
pub struct MemoryOwnershipStore {
    rows: SharedRows,
}

impl MemoryOwnershipStore {
    pub fn new(rows: SharedRows) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl OwnershipStore for MemoryOwnershipStore {
    async fn assign_owner(&self, id: UrlId, owner: OwnerId) -> Result<()> {
        rows::assign_owner(&mut self.rows.lock(), id, owner)
    }

    async fn assign_owner_batch(&self, ids: &[UrlId], owner: OwnerId) -> Result<()> {
        rows::assign_owner_batch(&mut self.rows.lock(), ids, owner)
    }
}
