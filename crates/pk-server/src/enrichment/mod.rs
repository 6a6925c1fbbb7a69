//! Best-effort descriptive metadata for catalog entries.
//!
//! The catalog only sees the [`EnrichmentProvider`] capability:
//! `(title, year) -> record | nothing`. Not-found is `Ok(None)`; transport
//! and API failures are `Err` and the assembler degrades them to `None`.

pub mod tmdb;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use pk_core::config::MetadataConfig;
use pk_core::EnrichmentRecord;

pub use self::tmdb::TmdbProvider;

/// Looks up descriptive metadata for a parsed title.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Find the best match for `title`, optionally narrowed by `year`.
    async fn lookup(
        &self,
        title: &str,
        year: Option<u16>,
    ) -> pk_core::Result<Option<EnrichmentRecord>>;
}

/// Provider used when enrichment is disabled or unconfigured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProvider;

#[async_trait]
impl EnrichmentProvider for NoopProvider {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn lookup(&self, _: &str, _: Option<u16>) -> pk_core::Result<Option<EnrichmentRecord>> {
        Ok(None)
    }
}

/// Entries kept by [`CachedProvider::new`].
pub const DEFAULT_CACHE_ENTRIES: usize = 4096;

/// Memoises successful lookups per `(lowercased title, year)`.
///
/// Errors pass through uncached so a transient outage does not pin a title
/// to "no match" for the life of the process. The cache holds at most
/// `max_entries`; inserting past that evicts an arbitrary existing entry.
pub struct CachedProvider {
    inner: Arc<dyn EnrichmentProvider>,
    cache: DashMap<(String, Option<u16>), Option<EnrichmentRecord>>,
    max_entries: usize,
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn EnrichmentProvider>) -> Self {
        Self::with_max_entries(inner, DEFAULT_CACHE_ENTRIES)
    }

    pub fn with_max_entries(inner: Arc<dyn EnrichmentProvider>, max_entries: usize) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[async_trait]
impl EnrichmentProvider for CachedProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn lookup(
        &self,
        title: &str,
        year: Option<u16>,
    ) -> pk_core::Result<Option<EnrichmentRecord>> {
        let key = (title.trim().to_lowercase(), year);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.value().clone());
        }

        let record = self.inner.lookup(title, year).await?;
        while self.cache.len() >= self.max_entries {
            let victim = self.cache.iter().next().map(|e| e.key().clone());
            match victim {
                Some(victim) => {
                    self.cache.remove(&victim);
                }
                None => break,
            }
        }
        self.cache.insert(key, record.clone());
        Ok(record)
    }
}

/// Build the provider described by the config.
///
/// Without an API key (or with enrichment disabled) this is a
/// [`NoopProvider`]; otherwise a cached [`TmdbProvider`].
pub fn from_config(config: &MetadataConfig) -> pk_core::Result<Arc<dyn EnrichmentProvider>> {
    let key = config
        .tmdb_api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    match key {
        Some(key) if config.enabled => {
            let tmdb = TmdbProvider::new(
                key.to_string(),
                config.language.clone(),
                config.base_url.clone(),
                config.timeout(),
            )?;
            tracing::info!(language = %config.language, "TMDB enrichment enabled");
            Ok(Arc::new(CachedProvider::new(Arc::new(tmdb))))
        }
        _ => {
            tracing::info!("Metadata enrichment disabled");
            Ok(Arc::new(NoopProvider))
        }
    }
}
