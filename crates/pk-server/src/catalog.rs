//! Catalog assembly.
//!
//! A catalog is recomputed from the filesystem on every request: scan the
//! roots, then for each file run the probe, the sidecar lookup and the
//! enrichment lookup concurrently and compose a [`Movie`].
//!
//! Files are assembled through a bounded `buffered` stream owned by the
//! request future, so a client that disconnects drops every queued probe and
//! lookup with it. Probes and enrichment lookups each go through their own
//! semaphore so a large library never has more than `probe.concurrency`
//! ffprobe processes or `metadata.concurrency` outbound requests in flight.
//! Every failure in this path degrades to missing fields; nothing here fails
//! the catalog.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use pk_av::{CodecPolicy, Prober};
use pk_core::config::{Config, LibraryConfig};
use pk_core::{EnrichmentRecord, MediaFile, Movie, MovieId, ParsedTitle, TechnicalMetadata};
use tokio::sync::Semaphore;

use crate::enrichment::EnrichmentProvider;
use crate::scanner::{self, ScanEntryFailure};
use crate::sidecar;

/// One catalog build.
#[derive(Debug, Default)]
pub struct Catalog {
    pub movies: Vec<Movie>,
    pub errors: Vec<ScanEntryFailure>,
}

/// Composes scanner, prober, sidecar resolver and enrichment into movies.
pub struct CatalogAssembler {
    prober: Arc<dyn Prober>,
    enrichment: Arc<dyn EnrichmentProvider>,
    policy: CodecPolicy,
    library: LibraryConfig,
    probe_timeout: Duration,
    probe_concurrency: usize,
    enrich_timeout: Duration,
    enrich_concurrency: usize,
}

impl CatalogAssembler {
    pub fn new(
        config: &Config,
        prober: Arc<dyn Prober>,
        enrichment: Arc<dyn EnrichmentProvider>,
    ) -> Self {
        Self {
            prober,
            enrichment,
            policy: CodecPolicy::from_config(&config.transcode),
            library: config.library.clone(),
            probe_timeout: config.probe.timeout(),
            probe_concurrency: config.probe.concurrency.max(1),
            enrich_timeout: config.metadata.timeout(),
            enrich_concurrency: config.metadata.concurrency.max(1),
        }
    }

    /// Scan all roots and assemble every file.
    pub async fn build(&self) -> Catalog {
        let scan = scanner::scan_library(&self.library).await;
        let movies = self.assemble_all(scan.files).await;
        Catalog {
            movies,
            errors: scan.errors,
        }
    }

    /// Scan all roots and assemble only the file with `id`.
    pub async fn find(&self, id: MovieId) -> pk_core::Result<Movie> {
        let scan = scanner::scan_library(&self.library).await;
        let file = scan
            .files
            .into_iter()
            .find(|f| f.id() == id)
            .ok_or_else(|| pk_core::Error::not_found("movie", id))?;

        let probe_sem = Semaphore::new(1);
        let enrich_sem = Semaphore::new(1);
        Ok(self.assemble_one(&file, &probe_sem, &enrich_sem).await)
    }

    /// Assemble movies for `files`, preserving their order.
    ///
    /// Nothing is spawned: dropping the returned future cancels every
    /// in-flight and queued assembly.
    pub async fn assemble_all(&self, files: Vec<MediaFile>) -> Vec<Movie> {
        let probe_sem = Semaphore::new(self.probe_concurrency);
        let enrich_sem = Semaphore::new(self.enrich_concurrency);
        let width = self.probe_concurrency.max(self.enrich_concurrency);

        stream::iter(files)
            .map(|file| {
                let probe_sem = &probe_sem;
                let enrich_sem = &enrich_sem;
                async move { self.assemble_one(&file, probe_sem, enrich_sem).await }
            })
            .buffered(width)
            .collect()
            .await
    }

    async fn assemble_one(
        &self,
        file: &MediaFile,
        probe_sem: &Semaphore,
        enrich_sem: &Semaphore,
    ) -> Movie {
        let parsed = pk_core::parse_path(&file.path);

        let (technical, subtitle, enrichment) = tokio::join!(
            self.probe(&file.path, probe_sem),
            sidecar::find_sidecar(file),
            self.enrich(&parsed, enrich_sem),
        );

        let requires_transcode = self.policy.requires_transcode(technical.codec.as_deref());
        Movie::assemble(file, technical, subtitle, parsed, enrichment, requires_transcode)
    }

    async fn probe(&self, path: &Path, sem: &Semaphore) -> TechnicalMetadata {
        let Ok(_permit) = sem.acquire().await else {
            return TechnicalMetadata::default();
        };

        match tokio::time::timeout(self.probe_timeout, self.prober.probe(path)).await {
            Ok(Ok(report)) => report.technical(),
            Ok(Err(e)) => {
                tracing::warn!(file = %path.display(), error = %e, "Failed to probe file");
                TechnicalMetadata::default()
            }
            Err(_) => {
                tracing::warn!(
                    file = %path.display(),
                    timeout_secs = self.probe_timeout.as_secs(),
                    "Probe timed out"
                );
                TechnicalMetadata::default()
            }
        }
    }

    async fn enrich(&self, parsed: &ParsedTitle, sem: &Semaphore) -> Option<EnrichmentRecord> {
        let Ok(_permit) = sem.acquire().await else {
            return None;
        };

        let lookup = self.enrichment.lookup(&parsed.title, parsed.year);
        match tokio::time::timeout(self.enrich_timeout, lookup).await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                tracing::warn!(
                    title = %parsed.title,
                    provider = self.enrichment.name(),
                    error = %e,
                    "Enrichment lookup failed"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    title = %parsed.title,
                    provider = self.enrichment.name(),
                    "Enrichment lookup timed out"
                );
                None
            }
        }
    }
}
