use async_trait::async_trait;
use shrinkray_core::{
    NewUrl, OwnerId, OwnershipStore, Result, ShortCode, StorageError, UrlId, UrlRow, UrlStats,
    UrlStore,
};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use std::collections::HashSet;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// DDL for the `url_rows` table, for tests and operators applying the schema.
pub const SCHEMA: &str = include_str!("../ddl/postgres/url_rows.sql");

const INSERT_SQL: &str = r#"
    INSERT INTO url_rows (uuid, short_url, original_url, user_id, is_deleted)
    VALUES ($1, $2, $3, NULL, FALSE)
"#;

/// Opens a PostgreSQL connection pool.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    PgPool::connect(database_url).await.map_err(map_sqlx_error)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn map_insert_error(err: sqlx::Error, original_url: &str) -> StorageError {
    if is_unique_violation(&err) {
        StorageError::DuplicateOriginalUrl(original_url.to_owned())
    } else {
        map_sqlx_error(err)
    }
}

fn decode_row(row: &PgRow) -> Result<UrlRow> {
    let id: Uuid = row.try_get("uuid").map_err(map_sqlx_error)?;
    let short_code: String = row.try_get("short_url").map_err(map_sqlx_error)?;
    let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
    let owner_id: Option<Uuid> = row.try_get("user_id").map_err(map_sqlx_error)?;
    let deleted: bool = row.try_get("is_deleted").map_err(map_sqlx_error)?;

    Ok(UrlRow {
        id: UrlId::from_uuid(id),
        short_code: ShortCode::new_unchecked(short_code),
        original_url,
        owner_id: owner_id.map(OwnerId::from_uuid),
        deleted,
    })
}

/// PostgreSQL implementation of [`UrlStore`].
///
/// Original-URL uniqueness is enforced by a partial unique index over live
/// rows; soft delete flips `is_deleted` and keeps the row. Batch inserts run
/// in one transaction and are all-or-nothing.
#[derive(Debug, Clone)]
pub struct PgUrlStore {
    pool: PgPool,
}

impl PgUrlStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UrlStore for PgUrlStore {
    async fn insert(&self, new: NewUrl) -> Result<UrlId> {
        let id = UrlId::new();

        sqlx::query(INSERT_SQL)
            .bind(id.as_uuid())
            .bind(new.short_code.as_str())
            .bind(&new.original_url)
            .execute(&self.pool)
            .await
            .map_err(|e| map_insert_error(e, &new.original_url))?;

        trace!(id = %id, code = %new.short_code, "inserted url row");
        Ok(id)
    }

    async fn batch_insert(&self, batch: Vec<NewUrl>) -> Result<Vec<UrlId>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut ids = Vec::with_capacity(batch.len());

        for new in &batch {
            let id = UrlId::new();
            let result = sqlx::query(INSERT_SQL)
                .bind(id.as_uuid())
                .bind(new.short_code.as_str())
                .bind(&new.original_url)
                .execute(&mut *tx)
                .await;

            if let Err(err) = result {
                let err = map_insert_error(err, &new.original_url);
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "failed to roll back batch insert");
                }
                debug!(error = %err, size = batch.len(), "batch insert rolled back");
                return Err(err);
            }
            ids.push(id);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(ids)
    }

    async fn find_by_short_code(&self, code: &ShortCode) -> Result<Option<UrlRow>> {
        let row = sqlx::query(
            r#"
            SELECT uuid, short_url, original_url, user_id, is_deleted
            FROM url_rows
            WHERE short_url = $1
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn find_by_original_url(&self, original_url: &str) -> Result<Option<ShortCode>> {
        let row = sqlx::query(
            r#"
            SELECT short_url
            FROM url_rows
            WHERE original_url = $1
              AND NOT is_deleted
            LIMIT 1
            "#,
        )
        .bind(original_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let code: String = row.try_get("short_url").map_err(map_sqlx_error)?;
        Ok(Some(ShortCode::new_unchecked(code)))
    }

    async fn find_by_owner(&self, owner: OwnerId) -> Result<Vec<UrlRow>> {
        let rows = sqlx::query(
            r#"
            SELECT uuid, short_url, original_url, user_id, is_deleted
            FROM url_rows
            WHERE user_id = $1
            "#,
        )
        .bind(owner.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(decode_row).collect()
    }

    async fn soft_delete(&self, codes: &[ShortCode], owner: OwnerId) -> Result<()> {
        let codes: Vec<String> = codes.iter().map(|c| c.as_str().to_owned()).collect();

        let result = sqlx::query(
            r#"
            UPDATE url_rows
            SET is_deleted = TRUE
            WHERE user_id = $1
              AND short_url = ANY($2)
              AND NOT is_deleted
            "#,
        )
        .bind(owner.as_uuid())
        .bind(&codes)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        trace!(owner = %owner, requested = codes.len(), changed = result.rows_affected(), "soft deleted url rows");
        Ok(())
    }

    async fn stats(&self) -> Result<UrlStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(DISTINCT short_url) AS urls, COUNT(DISTINCT user_id) AS users
            FROM url_rows
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let urls: i64 = row.try_get("urls").map_err(map_sqlx_error)?;
        let users: i64 = row.try_get("users").map_err(map_sqlx_error)?;

        Ok(UrlStats {
            urls: urls as usize,
            users: users as usize,
        })
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

/// PostgreSQL implementation of [`OwnershipStore`].
#[derive(Debug, Clone)]
pub struct PgOwnershipStore {
    pool: PgPool,
}

impl PgOwnershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OwnershipStore for PgOwnershipStore {
    async fn assign_owner(&self, id: UrlId, owner: OwnerId) -> Result<()> {
        let result = sqlx::query("UPDATE url_rows SET user_id = $1 WHERE uuid = $2")
            .bind(owner.as_uuid())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn assign_owner_batch(&self, ids: &[UrlId], owner: OwnerId) -> Result<()> {
        let ids: Vec<Uuid> = ids
            .iter()
            .map(UrlId::as_uuid)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let result = sqlx::query("UPDATE url_rows SET user_id = $1 WHERE uuid = ANY($2)")
            .bind(owner.as_uuid())
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let actual = result.rows_affected() as usize;
        if actual != ids.len() {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Err(StorageError::CountMismatch {
                expected: ids.len(),
                actual,
            });
        }

        tx.commit().await.map_err(map_sqlx_error)
    }
}
