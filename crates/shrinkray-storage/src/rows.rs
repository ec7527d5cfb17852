//! Row-collection operations shared by the memory and file backends.
//!
//! Both backends keep the full table as a `Vec<UrlRow>` while they hold
//! their lock, so every operation here is a linear scan.

use shrinkray_core::{
    NewUrl, OwnerId, Result, ShortCode, StorageError, UrlId, UrlRow, UrlStats,
};
use std::collections::HashSet;

/// Returns `true` if a live row already maps `original_url`.
pub(crate) fn has_live_original(rows: &[UrlRow], original_url: &str) -> bool {
    rows.iter()
        .any(|row| !row.deleted && row.original_url == original_url)
}

/// Builds the row for `new`, rejecting duplicates of a live original URL.
pub(crate) fn prepare_insert(rows: &[UrlRow], new: NewUrl) -> Result<UrlRow> {
    if has_live_original(rows, &new.original_url) {
        return Err(StorageError::DuplicateOriginalUrl(new.original_url));
    }
    Ok(UrlRow::create(new))
}

/// Inserts every element on its own and reports per-element outcomes.
///
/// Accepted rows are pushed onto `rows` right away so later elements of the
/// same batch see them. Returns the ids aligned with `batch` and the errors.
pub(crate) fn insert_each(
    rows: &mut Vec<UrlRow>,
    batch: Vec<NewUrl>,
) -> (Vec<Option<UrlId>>, Vec<StorageError>) {
    let mut inserted = Vec::with_capacity(batch.len());
    let mut errors = Vec::new();

    for new in batch {
        match prepare_insert(rows, new) {
            Ok(row) => {
                inserted.push(Some(row.id));
                rows.push(row);
            }
            Err(err) => {
                inserted.push(None);
                errors.push(err);
            }
        }
    }

    (inserted, errors)
}

pub(crate) fn find_by_short_code(rows: &[UrlRow], code: &ShortCode) -> Option<UrlRow> {
    rows.iter().find(|row| &row.short_code == code).cloned()
}

pub(crate) fn find_by_original_url(rows: &[UrlRow], original_url: &str) -> Option<ShortCode> {
    rows.iter()
        .find(|row| !row.deleted && row.original_url == original_url)
        .map(|row| row.short_code.clone())
}

pub(crate) fn find_by_owner(rows: &[UrlRow], owner: OwnerId) -> Vec<UrlRow> {
    rows.iter()
        .filter(|row| row.is_owned_by(owner))
        .cloned()
        .collect()
}

/// Flags owned rows as deleted and returns how many changed state.
pub(crate) fn soft_delete(rows: &mut [UrlRow], codes: &[ShortCode], owner: OwnerId) -> usize {
    let codes: HashSet<&ShortCode> = codes.iter().collect();
    let mut changed = 0;

    for row in rows.iter_mut() {
        if !row.deleted && row.is_owned_by(owner) && codes.contains(&row.short_code) {
            row.deleted = true;
            changed += 1;
        }
    }

    changed
}

pub(crate) fn assign_owner(rows: &mut [UrlRow], id: UrlId, owner: OwnerId) -> Result<()> {
    let row = rows
        .iter_mut()
        .find(|row| row.id == id)
        .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
    row.owner_id = Some(owner);
    Ok(())
}

/// Assigns `owner` to every row in `ids`, or to none of them if any id is
/// unknown.
pub(crate) fn assign_owner_batch(rows: &mut [UrlRow], ids: &[UrlId], owner: OwnerId) -> Result<()> {
    let wanted: HashSet<UrlId> = ids.iter().copied().collect();
    let matched = rows.iter().filter(|row| wanted.contains(&row.id)).count();

    if matched != wanted.len() {
        return Err(StorageError::CountMismatch {
            expected: wanted.len(),
            actual: matched,
        });
    }

    for row in rows.iter_mut().filter(|row| wanted.contains(&row.id)) {
        row.owner_id = Some(owner);
    }
    Ok(())
}

pub(crate) fn stats(rows: &[UrlRow]) -> UrlStats {
    let urls: HashSet<&ShortCode> = rows.iter().map(|row| &row.short_code).collect();
    let users: HashSet<OwnerId> = rows.iter().filter_map(|row| row.owner_id).collect();

    UrlStats {
        urls: urls.len(),
        users: users.len(),
    }
}
