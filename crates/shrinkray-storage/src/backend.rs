use crate::file::{FileOwnershipStore, FileRows, FileUrlStore};
use crate::memory::{MemoryOwnershipStore, MemoryUrlStore, SharedRows};
use crate::postgres::{self, PgOwnershipStore, PgUrlStore};
use shrinkray_core::{OwnershipStore, Result, UrlStore};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use typed_builder::TypedBuilder;

/// Storage settings supplied by the configuration layer.
///
/// Empty strings count as unset, so values coming straight from flags or
/// environment variables can be passed through untouched.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct StorageConfig {
    #[builder(default, setter(strip_option, into))]
    pub database_dsn: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub file_storage_path: Option<PathBuf>,
}

/// The backend picked for a [`StorageConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Postgres,
    File,
    Memory,
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Postgres => write!(f, "postgres"),
            BackendKind::File => write!(f, "file"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

impl StorageConfig {
    fn dsn(&self) -> Option<&str> {
        self.database_dsn.as_deref().filter(|dsn| !dsn.is_empty())
    }

    fn file_path(&self) -> Option<&PathBuf> {
        self.file_storage_path
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// Applies the fixed precedence: database, then file, then memory.
    pub fn backend_kind(&self) -> BackendKind {
        if self.dsn().is_some() {
            BackendKind::Postgres
        } else if self.file_path().is_some() {
            BackendKind::File
        } else {
            BackendKind::Memory
        }
    }
}

/// A URL store and an ownership store backed by the same data.
#[derive(Clone)]
pub struct Storage {
    kind: BackendKind,
    urls: Arc<dyn UrlStore>,
    owners: Arc<dyn OwnershipStore>,
}

impl Storage {
    /// Opens the backend selected by `config`. Called once at start-up.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let kind = config.backend_kind();
        let storage = match (kind, config.dsn(), config.file_path()) {
            (BackendKind::Postgres, Some(dsn), _) => {
                let pool = postgres::connect(dsn).await?;
                Self::postgres(pool)
            }
            (BackendKind::File, _, Some(path)) => Self::file(FileRows::open(path.clone()).await?),
            _ => Self::memory(SharedRows::new()),
        };

        info!(backend = %storage.kind, "storage backend selected");
        Ok(storage)
    }

    pub fn memory(rows: SharedRows) -> Self {
        Self {
            kind: BackendKind::Memory,
            urls: Arc::new(MemoryUrlStore::new(rows.clone())),
            owners: Arc::new(MemoryOwnershipStore::new(rows)),
        }
    }

    pub fn file(file: Arc<FileRows>) -> Self {
        Self {
            kind: BackendKind::File,
            urls: Arc::new(FileUrlStore::new(Arc::clone(&file))),
            owners: Arc::new(FileOwnershipStore::new(file)),
        }
    }

    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            kind: BackendKind::Postgres,
            urls: Arc::new(PgUrlStore::new(pool.clone())),
            owners: Arc::new(PgOwnershipStore::new(pool)),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn urls(&self) -> Arc<dyn UrlStore> {
        Arc::clone(&self.urls)
    }

    pub fn owners(&self) -> Arc<dyn OwnershipStore> {
        Arc::clone(&self.owners)
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").field("kind", &self.kind).finish()
    }
}
