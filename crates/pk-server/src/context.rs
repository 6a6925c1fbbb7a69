//! Application context.
//!
//! [`AppContext`] is the central struct shared across all route handlers via
//! Axum state. It only holds `Arc`s and cheap handles; there is no catalog
//! state, every listing recomputes from the filesystem.

use std::path::PathBuf;
use std::sync::Arc;

use pk_av::{CodecPolicy, FfprobeProber, Prober, ToolRegistry};
use pk_core::config::Config;

use crate::catalog::CatalogAssembler;
use crate::enrichment::{self, EnrichmentProvider};
use crate::sessions::TranscodeRegistry;

/// Application context shared by all request handlers.
#[derive(Clone)]
pub struct AppContext {
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// Media file prober.
    pub prober: Arc<dyn Prober>,
    /// External metadata provider (possibly a no-op).
    pub enrichment: Arc<dyn EnrichmentProvider>,
    /// External tool registry.
    pub tools: Arc<ToolRegistry>,
    /// Live transcode sessions.
    pub transcodes: TranscodeRegistry,
}

impl AppContext {
    pub fn new(
        config: Config,
        prober: Arc<dyn Prober>,
        enrichment: Arc<dyn EnrichmentProvider>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            prober,
            enrichment,
            tools,
            transcodes: TranscodeRegistry::new(),
        }
    }

    /// Wire up real collaborators: discovered tools, ffprobe, and the
    /// configured enrichment provider.
    pub fn from_config(config: Config) -> pk_core::Result<Self> {
        let tools = Arc::new(ToolRegistry::discover(&config.tools));
        for info in tools.check_all() {
            if info.available {
                tracing::info!(
                    "Tool found: {} ({})",
                    info.name,
                    info.version.as_deref().unwrap_or("unknown version")
                );
            } else {
                tracing::warn!("Tool not found: {}", info.name);
            }
        }

        // Without ffprobe every probe fails and entries keep null fields.
        let ffprobe = tools
            .require("ffprobe")
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("ffprobe"));
        let prober: Arc<dyn Prober> =
            Arc::new(FfprobeProber::new(ffprobe).with_timeout(config.probe.timeout()));

        let enrichment = enrichment::from_config(&config.metadata)?;

        Ok(Self::new(config, prober, enrichment, tools))
    }

    /// Catalog assembler bound to this context's collaborators.
    pub fn assembler(&self) -> CatalogAssembler {
        CatalogAssembler::new(&self.config, self.prober.clone(), self.enrichment.clone())
    }

    pub fn codec_policy(&self) -> CodecPolicy {
        CodecPolicy::from_config(&self.config.transcode)
    }
}
