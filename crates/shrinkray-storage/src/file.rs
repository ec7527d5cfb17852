use crate::rows;
use async_trait::async_trait;
use shrinkray_core::{
    NewUrl, OwnerId, OwnershipStore, Result, ShortCode, StorageError, UrlId, UrlRow, UrlStats,
    UrlStore,
};
use std::ffi::OsString;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, trace, warn};

/// A JSON-lines file holding one [`UrlRow`] per line.
///
/// Inserts append to the file; any update rewrites it completely through a
/// temporary file and a rename. Access from this process is serialised by
/// one async lock shared by the URL and ownership stores. Several processes
/// writing the same file are not supported.
#[derive(Debug)]
pub struct FileRows {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRows {
    /// Opens the storage file, creating an empty one if it does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let path = path.into();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| io_error(&path, e))?;

        debug!(path = %path.display(), "opened file storage");
        Ok(Arc::new(Self {
            path,
            lock: Mutex::new(()),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    /// Reads every row. Lines that fail to decode are skipped.
    async fn load(&self) -> Result<Vec<UrlRow>> {
        let content = fs::read(&self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;

        let mut rows = Vec::new();
        for (index, line) in content.split(|byte| *byte == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<UrlRow>(line) {
                Ok(row) => rows.push(row),
                Err(err) => {
                    warn!(path = %self.path.display(), line = index + 1, error = %err, "skipping malformed url row");
                }
            }
        }
        Ok(rows)
    }

    /// Appends `new_rows`, terminating a last line that lacks its newline.
    async fn append(&self, new_rows: &[UrlRow]) -> Result<()> {
        if new_rows.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;

        let mut buffer = String::new();
        if !ends_with_newline(&mut file)
            .await
            .map_err(|e| io_error(&self.path, e))?
        {
            warn!(path = %self.path.display(), "terminating unfinished last line");
            buffer.push('\n');
        }
        buffer.push_str(&encode(new_rows)?);

        file.write_all(buffer.as_bytes())
            .await
            .map_err(|e| io_error(&self.path, e))?;
        file.flush().await.map_err(|e| io_error(&self.path, e))?;
        Ok(())
    }

    /// Checks the file is still present and readable.
    pub async fn ping(&self) -> Result<()> {
        fs::File::open(&self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        Ok(())
    }

    async fn rewrite(&self, all_rows: &[UrlRow]) -> Result<()> {
        let buffer = encode(all_rows)?;
        let tmp_path = self.tmp_path();

        fs::write(&tmp_path, buffer.as_bytes())
            .await
            .map_err(|e| io_error(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;

        trace!(path = %self.path.display(), rows = all_rows.len(), "rewrote file storage");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

/// Empty files count as terminated.
async fn ends_with_newline(file: &mut fs::File) -> std::io::Result<bool> {
    let len = file.metadata().await?.len();
    if len == 0 {
        return Ok(true);
    }

    let mut last = [0_u8; 1];
    file.seek(SeekFrom::Start(len - 1)).await?;
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

fn encode(rows: &[UrlRow]) -> Result<String> {
    let mut buffer = String::new();
    for row in rows {
        let line = serde_json::to_string(row)
            .map_err(|e| StorageError::InvalidData(format!("cannot encode url row: {e}")))?;
        buffer.push_str(&line);
        buffer.push('\n');
    }
    Ok(buffer)
}

fn io_error(path: &Path, err: std::io::Error) -> StorageError {
    StorageError::Io(format!("{}: {err}", path.display()))
}

/// File-backed implementation of [`UrlStore`].
#[derive(Debug, Clone)]
pub struct FileUrlStore {
    file: Arc<FileRows>,
}

impl FileUrlStore {
    pub fn new(file: Arc<FileRows>) -> Self {
        Self { file }
    }
}

#[async_trait]
impl UrlStore for FileUrlStore {
    async fn insert(&self, new: NewUrl) -> Result<UrlId> {
        let _guard = self.file.guard().await;
        let table = self.file.load().await?;

        let row = rows::prepare_insert(&table, new)?;
        self.file.append(std::slice::from_ref(&row)).await?;
        trace!(id = %row.id, code = %row.short_code, "appended url row");
        Ok(row.id)
    }

    async fn batch_insert(&self, batch: Vec<NewUrl>) -> Result<Vec<UrlId>> {
        let _guard = self.file.guard().await;
        let mut table = self.file.load().await?;
        let existing = table.len();

        let (inserted, errors) = rows::insert_each(&mut table, batch);
        self.file.append(&table[existing..]).await?;
        StorageError::collect_batch(inserted, errors)
    }

    async fn find_by_short_code(&self, code: &ShortCode) -> Result<Option<UrlRow>> {
        let _guard = self.file.guard().await;
        Ok(rows::find_by_short_code(&self.file.load().await?, code))
    }

    async fn find_by_original_url(&self, original_url: &str) -> Result<Option<ShortCode>> {
        let _guard = self.file.guard().await;
        Ok(rows::find_by_original_url(&self.file.load().await?, original_url))
    }

    async fn find_by_owner(&self, owner: OwnerId) -> Result<Vec<UrlRow>> {
        let _guard = self.file.guard().await;
        Ok(rows::find_by_owner(&self.file.load().await?, owner))
    }

    async fn soft_delete(&self, codes: &[ShortCode], owner: OwnerId) -> Result<()> {
        let _guard = self.file.guard().await;
        let mut table = self.file.load().await?;

        let changed = rows::soft_delete(&mut table, codes, owner);
        if changed > 0 {
            self.file.rewrite(&table).await?;
        }
        trace!(owner = %owner, requested = codes.len(), changed, "soft deleted url rows");
        Ok(())
    }

    async fn stats(&self) -> Result<UrlStats> {
        let _guard = self.file.guard().await;
        Ok(rows::stats(&self.file.load().await?))
    }

    async fn ping(&self) -> Result<()> {
        self.file.ping().await
    }
}

/// File-backed implementation of [`OwnershipStore`].
#[derive(Debug, Clone)]
pub struct FileOwnershipStore {
    file: Arc<FileRows>,
}

impl FileOwnershipStore {
    pub fn new(file: Arc<FileRows>) -> Self {
        Self { file }
    }
}

#[async_trait]
impl OwnershipStore for FileOwnershipStore {
    async fn assign_owner(&self, id: UrlId, owner: OwnerId) -> Result<()> {
        let _guard = self.file.guard().await;
        let mut table = self.file.load().await?;

        rows::assign_owner(&mut table, id, owner)?;
        self.file.rewrite(&table).await
    }

    async fn assign_owner_batch(&self, ids: &[UrlId], owner: OwnerId) -> Result<()> {
        let _guard = self.file.guard().await;
        let mut table = self.file.load().await?;

        rows::assign_owner_batch(&mut table, ids, owner)?;
        self.file.rewrite(&table).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        path: PathBuf,
        urls: FileUrlStore,
        owners: FileOwnershipStore,
    }

    impl Fixture {
        async fn start() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("urls.jsonl");
            let file = FileRows::open(&path).await.unwrap();
            Self {
                _dir: dir,
                path,
                urls: FileUrlStore::new(Arc::clone(&file)),
                owners: FileOwnershipStore::new(file),
            }
        }

        async fn reopen(&self) -> FileUrlStore {
            FileUrlStore::new(FileRows::open(&self.path).await.unwrap())
        }
    }

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn new_url(c: &str, url: &str) -> NewUrl {
        NewUrl::new(code(c), url)
    }

    #[tokio::test]
    async fn open_creates_missing_file() {
        let fixture = Fixture::start().await;

        assert!(fixture.path.exists());
        assert!(fixture.urls.find_by_short_code(&code("abc")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inserts_append_one_json_line_each() {
        let fixture = Fixture::start().await;

        fixture.urls.insert(new_url("a1", "https://a.example")).await.unwrap();
        fixture.urls.insert(new_url("b1", "https://b.example")).await.unwrap();

        let content = std::fs::read_to_string(&fixture.path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["short_url"], "a1");
        assert_eq!(first["original_url"], "https://a.example");
        assert_eq!(first["is_deleted"], false);
        assert!(first["user_id"].is_null());
        assert!(first["uuid"].is_string());
    }

    #[tokio::test]
    async fn rows_survive_reopen() {
        let fixture = Fixture::start().await;
        let id = fixture.urls.insert(new_url("a1", "https://a.example")).await.unwrap();

        let reopened = fixture.reopen().await;
        let row = reopened.find_by_short_code(&code("a1")).await.unwrap().unwrap();
        assert_eq!(row.id, id);
    }

    #[tokio::test]
    async fn duplicate_original_url_conflicts() {
        let fixture = Fixture::start().await;

        fixture.urls.insert(new_url("K1", "https://example.com/a")).await.unwrap();
        let err = fixture
            .urls
            .insert(new_url("K2", "https://example.com/a"))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::DuplicateOriginalUrl(_)));
        assert_eq!(
            fixture.urls.find_by_original_url("https://example.com/a").await.unwrap(),
            Some(code("K1"))
        );
    }

    #[tokio::test]
    async fn batch_insert_keeps_non_conflicting_rows() {
        let fixture = Fixture::start().await;
        fixture.urls.insert(new_url("a1", "https://a.example")).await.unwrap();

        let err = fixture
            .urls
            .batch_insert(vec![
                new_url("a2", "https://a.example"),
                new_url("b1", "https://b.example"),
            ])
            .await
            .unwrap_err();

        let StorageError::PartialBatch { inserted, errors } = err else {
            panic!("expected partial batch error");
        };
        assert_eq!(inserted.len(), 2);
        assert!(inserted[0].is_none());
        assert!(inserted[1].is_some());
        assert_eq!(errors.len(), 1);

        let reopened = fixture.reopen().await;
        assert!(reopened.find_by_short_code(&code("b1")).await.unwrap().is_some());
        assert_eq!(reopened.stats().await.unwrap().urls, 2);
    }

    #[tokio::test]
    async fn ownership_and_soft_delete_rewrite_the_file() {
        let fixture = Fixture::start().await;
        let owner = OwnerId::new();
        let other = OwnerId::new();
        let ids = fixture
            .urls
            .batch_insert(vec![
                new_url("a1", "https://a.example"),
                new_url("b1", "https://b.example"),
            ])
            .await
            .unwrap();

        fixture.owners.assign_owner_batch(&ids, owner).await.unwrap();
        fixture
            .urls
            .soft_delete(&[code("a1"), code("b1")], other)
            .await
            .unwrap();
        fixture.urls.soft_delete(&[code("a1")], owner).await.unwrap();

        let reopened = fixture.reopen().await;
        let a = reopened.find_by_short_code(&code("a1")).await.unwrap().unwrap();
        let b = reopened.find_by_short_code(&code("b1")).await.unwrap().unwrap();
        assert!(a.deleted);
        assert!(!b.deleted);
        assert_eq!(reopened.find_by_owner(owner).await.unwrap().len(), 2);

        let content = std::fs::read_to_string(&fixture.path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn assign_owner_to_missing_row_fails() {
        let fixture = Fixture::start().await;

        let err = fixture
            .owners
            .assign_owner(UrlId::new(), OwnerId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn assign_owner_batch_mismatch_leaves_file_untouched() {
        let fixture = Fixture::start().await;
        let owner = OwnerId::new();
        let id = fixture.urls.insert(new_url("a1", "https://a.example")).await.unwrap();

        let err = fixture
            .owners
            .assign_owner_batch(&[id, UrlId::new()], owner)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::CountMismatch { expected: 2, actual: 1 }));
        assert!(fixture.urls.find_by_owner(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let fixture = Fixture::start().await;
        fixture.urls.insert(new_url("a1", "https://a.example")).await.unwrap();

        let mut content = std::fs::read_to_string(&fixture.path).unwrap();
        content.push_str("{not json}\n\n");
        std::fs::write(&fixture.path, content).unwrap();

        fixture.urls.insert(new_url("b1", "https://b.example")).await.unwrap();

        assert!(fixture.urls.find_by_short_code(&code("a1")).await.unwrap().is_some());
        assert!(fixture.urls.find_by_short_code(&code("b1")).await.unwrap().is_some());
        assert_eq!(fixture.urls.stats().await.unwrap().urls, 2);
    }

    #[tokio::test]
    async fn append_terminates_unfinished_last_line() {
        let fixture = Fixture::start().await;
        fixture.urls.insert(new_url("a1", "https://a.example")).await.unwrap();

        let content = std::fs::read_to_string(&fixture.path).unwrap();
        std::fs::write(&fixture.path, content.trim_end_matches('\n')).unwrap();

        fixture.urls.insert(new_url("b1", "https://b.example")).await.unwrap();

        let reopened = fixture.reopen().await;
        assert!(reopened.find_by_short_code(&code("a1")).await.unwrap().is_some());
        assert!(reopened.find_by_short_code(&code("b1")).await.unwrap().is_some());
        assert_eq!(std::fs::read_to_string(&fixture.path).unwrap().lines().count(), 2);
    }

    #[tokio::test]
    async fn non_utf8_lines_are_skipped() {
        let fixture = Fixture::start().await;
        fixture.urls.insert(new_url("a1", "https://a.example")).await.unwrap();

        let mut content = std::fs::read(&fixture.path).unwrap();
        content.extend_from_slice(b"\xff\xfe\n");
        std::fs::write(&fixture.path, content).unwrap();

        assert!(fixture.urls.find_by_short_code(&code("a1")).await.unwrap().is_some());
        fixture.urls.insert(new_url("b1", "https://b.example")).await.unwrap();
        assert!(fixture.urls.find_by_short_code(&code("b1")).await.unwrap().is_some());
        assert_eq!(fixture.urls.stats().await.unwrap().urls, 2);
    }

    #[tokio::test]
    async fn ping_reports_a_missing_file() {
        let fixture = Fixture::start().await;
        fixture.urls.ping().await.unwrap();

        std::fs::remove_file(&fixture.path).unwrap();
        let err = fixture.urls.ping().await.unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
