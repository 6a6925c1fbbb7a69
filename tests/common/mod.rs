//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which owns a temporary media root and a full
//! [`AppContext`] wired with a [`FakeProber`], the no-op enrichment provider
//! and an empty tool registry. [`TestHarness::serve`] starts Axum on a random
//! port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use pk_av::probe::{AudioStreamInfo, ProbeReport, VideoStreamInfo};
use pk_av::{Prober, ToolRegistry};
use pk_core::config::Config;
use pk_server::enrichment::{EnrichmentProvider, NoopProvider};
use pk_server::router::build_router;
use pk_server::AppContext;
use tempfile::TempDir;

/// Deterministic prober keyed on the file name:
/// `broken` fails like a truncated header, `hevc` reports HEVC, anything
/// else reports a 1080p H.264 stream of 90 minutes.
pub struct FakeProber;

#[async_trait]
impl Prober for FakeProber {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn probe(&self, path: &Path) -> pk_core::Result<ProbeReport> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.contains("broken") {
            return Err(pk_core::Error::Probe("moov atom not found".into()));
        }
        let codec = if name.contains("hevc") { "hevc" } else { "h264" };
        Ok(ProbeReport {
            container: Some("matroska,webm".into()),
            duration: Some(5400.0),
            bit_rate: Some(4_000_000),
            size: std::fs::metadata(path).ok().map(|m| m.len()),
            video: Some(VideoStreamInfo {
                codec: Some(codec.into()),
                width: Some(1920),
                height: Some(1080),
                frame_rate: Some(23.976),
                bit_rate: None,
            }),
            audio: Some(AudioStreamInfo {
                codec: Some("aac".into()),
                channels: Some(2),
                sample_rate: Some(48000),
            }),
        })
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`] over a
/// temporary media root.
pub struct TestHarness {
    pub ctx: AppContext,
    pub media: TempDir,
}

impl TestHarness {
    /// Harness with default configuration and no external tools.
    pub fn new() -> Self {
        Self::build(|_| {}, ToolRegistry::default(), Arc::new(NoopProvider))
    }

    /// Harness with a config tweak applied after the media root is set.
    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        Self::build(tweak, ToolRegistry::default(), Arc::new(NoopProvider))
    }

    /// Harness whose registry points at the given tool paths.
    pub fn with_tools(tools: ToolRegistry) -> Self {
        Self::build(|_| {}, tools, Arc::new(NoopProvider))
    }

    /// Harness with a custom enrichment provider.
    pub fn with_enrichment(provider: Arc<dyn EnrichmentProvider>) -> Self {
        Self::build(|_| {}, ToolRegistry::default(), provider)
    }

    fn build(
        tweak: impl FnOnce(&mut Config),
        tools: ToolRegistry,
        enrichment: Arc<dyn EnrichmentProvider>,
    ) -> Self {
        let media = tempfile::tempdir().expect("failed to create media root");
        let mut config = Config::default();
        config.library.roots = vec![media.path().to_path_buf()];
        tweak(&mut config);

        let ctx = AppContext::new(config, Arc::new(FakeProber), enrichment, Arc::new(tools));
        Self { ctx, media }
    }

    /// Write a file under the media root, creating parent directories.
    pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.media.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create dirs");
        }
        std::fs::write(&path, contents).expect("failed to write fixture");
        path
    }

    pub fn router(&self) -> axum::Router {
        build_router(self.ctx.clone(), None)
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn serve(self) -> (Self, SocketAddr) {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (self, addr)
    }

    /// Shorthand for `TestHarness::new().serve()`.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::new().serve().await
    }
}

/// Bytes 0..n cycling through every byte value.
pub fn patterned_bytes(n: usize) -> Vec<u8> {
    (0..=255u8).cycle().take(n).collect()
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}
