use crate::error::ShortenerError;
use crate::model::{BatchItem, CorrelatedUrl, OwnedUrl, Resolution, SavedUrl};
use shrinkray_core::{
    NewUrl, OwnerId, OwnershipStore, ShortCode, StorageError, UrlId, UrlStats, UrlStore,
};
use shrinkray_generator::Generator;
use shrinkray_storage::Storage;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

pub type Result<T> = std::result::Result<T, ShortenerError>;

/// Composes the URL store, the ownership store and a code generator.
///
/// Every insert gets a freshly generated code; the generator alone decides
/// uniqueness and no collision retry is performed. Links handed back to
/// callers are `{base_url}/{code}`.
#[derive(Clone)]
pub struct ShortenerService {
    urls: Arc<dyn UrlStore>,
    owners: Arc<dyn OwnershipStore>,
    generator: Arc<dyn Generator>,
    base_url: String,
}

impl ShortenerService {
    pub fn new(
        urls: Arc<dyn UrlStore>,
        owners: Arc<dyn OwnershipStore>,
        generator: impl Generator,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            urls,
            owners,
            generator: Arc::new(generator),
            base_url: base_url.into(),
        }
    }

    /// Builds a service over both stores of an opened backend.
    pub fn with_storage(
        storage: &Storage,
        generator: impl Generator,
        base_url: impl Into<String>,
    ) -> Self {
        Self::new(storage.urls(), storage.owners(), generator, base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Validates that the URL is non-empty, uses http or https and names a host.
    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }

        let parsed = Url::parse(url)
            .map_err(|err| ShortenerError::InvalidUrl(format!("{url}: {err}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL scheme must be http or https: {}",
                parsed.scheme()
            )));
        }

        if matches!(parsed.host_str(), None | Some("")) {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a host: {url}"
            )));
        }

        Ok(())
    }

    fn link(&self, code: &ShortCode) -> String {
        code.to_url(&self.base_url)
    }

    fn saved(&self, id: UrlId, short_code: ShortCode) -> SavedUrl {
        SavedUrl {
            id,
            short_url: self.link(&short_code),
            short_code,
        }
    }

    /// Turns a duplicate insert into a conflict carrying the existing link.
    async fn conflict(&self, original_url: String) -> ShortenerError {
        let short_url = match self.urls.find_by_original_url(&original_url).await {
            Ok(code) => code.map(|code| self.link(&code)),
            Err(err) => {
                warn!(error = %err, url = %original_url, "failed to look up existing short link");
                None
            }
        };

        ShortenerError::Conflict {
            original_url,
            short_url,
        }
    }

    fn correlate(
        &self,
        items: Vec<BatchItem>,
        codes: Vec<ShortCode>,
        ids: impl IntoIterator<Item = Option<UrlId>>,
    ) -> Vec<CorrelatedUrl> {
        items
            .into_iter()
            .zip(codes)
            .zip(ids)
            .filter_map(|((item, code), id)| {
                id.map(|id| CorrelatedUrl {
                    correlation_id: item.correlation_id,
                    saved: self.saved(id, code),
                })
            })
            .collect()
    }

    /// Shortens one URL.
    ///
    /// Fails with [`ShortenerError::Conflict`] if a live mapping for the same
    /// URL exists.
    pub async fn add_url(&self, original_url: &str) -> Result<SavedUrl> {
        Self::validate_url(original_url)?;

        let short_code = self.generator.generate();
        let new = NewUrl::new(short_code.clone(), original_url);

        let id = match self.urls.insert(new).await {
            Ok(id) => id,
            Err(StorageError::DuplicateOriginalUrl(url)) => return Err(self.conflict(url).await),
            Err(err) => return Err(err.into()),
        };

        debug!(id = %id, code = %short_code, "shortened url");
        Ok(self.saved(id, short_code))
    }

    /// Shortens a batch of URLs, keeping each element's correlation id.
    ///
    /// Every URL is validated before anything is stored. Whether a rejected
    /// element aborts the whole batch depends on the backend: the database
    /// stores nothing, while memory and file backends keep the accepted
    /// elements and report them in [`ShortenerError::PartialBatch`].
    pub async fn add_batch_url(&self, items: Vec<BatchItem>) -> Result<Vec<CorrelatedUrl>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        for item in &items {
            Self::validate_url(&item.original_url)?;
        }

        let codes: Vec<ShortCode> = items.iter().map(|_| self.generator.generate()).collect();
        let batch = items
            .iter()
            .zip(&codes)
            .map(|(item, code)| NewUrl::new(code.clone(), item.original_url.as_str()))
            .collect();

        match self.urls.batch_insert(batch).await {
            Ok(ids) => {
                debug!(size = ids.len(), "shortened url batch");
                Ok(self.correlate(items, codes, ids.into_iter().map(Some)))
            }
            Err(StorageError::DuplicateOriginalUrl(url)) => Err(self.conflict(url).await),
            Err(StorageError::PartialBatch { inserted, errors }) => {
                let saved = self.correlate(items, codes, inserted.iter().copied());
                Err(ShortenerError::PartialBatch {
                    saved,
                    source: StorageError::PartialBatch { inserted, errors },
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn add_owner_to_url(&self, id: UrlId, owner: OwnerId) -> Result<()> {
        self.owners.assign_owner(id, owner).await?;
        Ok(())
    }

    /// Assigns `owner` to every id, or to none if any id is unknown.
    pub async fn add_owner_to_urls(&self, ids: &[UrlId], owner: OwnerId) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.owners.assign_owner_batch(ids, owner).await?;
        Ok(())
    }

    /// Resolves a code as it arrives from the transport layer.
    ///
    /// Codes that are not well formed cannot be stored, so they resolve to
    /// [`Resolution::Missing`].
    pub async fn get_url(&self, code: &str) -> Result<Resolution> {
        let Ok(code) = ShortCode::new(code) else {
            return Ok(Resolution::Missing);
        };

        let resolution = match self.urls.find_by_short_code(&code).await? {
            Some(row) if row.deleted => Resolution::Gone,
            Some(row) => Resolution::Active(row.original_url),
            None => Resolution::Missing,
        };
        Ok(resolution)
    }

    /// Lists every mapping `owner` holds. An empty list means nothing is owned.
    pub async fn get_urls_by_owner(&self, owner: OwnerId) -> Result<Vec<OwnedUrl>> {
        let rows = self.urls.find_by_owner(owner).await?;

        Ok(rows
            .into_iter()
            .map(|row| OwnedUrl {
                short_url: self.link(&row.short_code),
                original_url: row.original_url,
            })
            .collect())
    }

    /// Returns the short link of the live mapping for `original_url`.
    pub async fn get_url_by_original_url(&self, original_url: &str) -> Result<Option<String>> {
        let code = self.urls.find_by_original_url(original_url).await?;
        Ok(code.map(|code| self.link(&code)))
    }

    /// Soft-deletes the codes `owner` owns; other codes are skipped silently.
    pub async fn delete_batch_url(&self, codes: &[ShortCode], owner: OwnerId) -> Result<()> {
        self.urls.soft_delete(codes, owner).await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<UrlStats> {
        Ok(self.urls.stats().await?)
    }

    /// Checks that the URL store is reachable.
    pub async fn ping(&self) -> Result<()> {
        Ok(self.urls.ping().await?)
    }
}

impl std::fmt::Debug for ShortenerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortenerService")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
