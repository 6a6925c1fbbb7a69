//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for the server, media library, probing, enrichment,
//! transcoding and external tools. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub library: LibraryConfig,
    pub probe: ProbeConfig,
    pub metadata: MetadataConfig,
    pub transcode: TranscodeConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| Error::Config(format!("parse error: {e}")))
    }

    /// Read and parse a config file, failing on any error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None`, the file does not exist, or it fails to parse.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.library.roots.is_empty() {
            warnings.push("library.roots is empty; the catalog will always be empty".into());
        }
        for (i, root) in self.library.roots.iter().enumerate() {
            if !root.is_dir() {
                warnings.push(format!(
                    "library.roots[{i}] ({}) is not a directory",
                    root.display()
                ));
            }
        }

        if self.probe.concurrency == 0 {
            warnings.push("probe.concurrency is 0; 1 will be used".into());
        }
        if self.metadata.concurrency == 0 {
            warnings.push("metadata.concurrency is 0; 1 will be used".into());
        }

        if self
            .metadata
            .tmdb_api_key
            .as_deref()
            .is_some_and(|k| k.trim().is_empty())
        {
            warnings.push("metadata.tmdb_api_key is empty; enrichment is off".into());
        }

        let tiers = ["480p", "720p", "1080p"];
        if !tiers.contains(&self.transcode.default_quality.as_str()) {
            warnings.push(format!(
                "transcode.default_quality '{}' is not a known tier (valid: {})",
                self.transcode.default_quality,
                tiers.join(", ")
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Built client assets served for any non-API path.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3001,
            static_dir: None,
        }
    }
}

/// Media library settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Ordered media roots. Earlier roots shadow later ones for identical
    /// relative paths.
    pub roots: Vec<PathBuf>,
    /// Maximum directory depth below each root.
    pub max_depth: usize,
    pub follow_links: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from("./media")],
            max_depth: 32,
            follow_links: true,
        }
    }
}

/// Technical probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub timeout_secs: u64,
    /// Maximum number of probe subprocesses running at once.
    pub concurrency: usize,
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            concurrency: 4,
        }
    }
}

/// Metadata enrichment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub enabled: bool,
    pub tmdb_api_key: Option<String>,
    pub language: String,
    pub timeout_secs: u64,
    /// Maximum number of lookups in flight during one catalog build.
    pub concurrency: usize,
    /// TMDB v3 API base URL.
    pub base_url: String,
}

impl MetadataConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tmdb_api_key: None,
            language: "en-US".into(),
            timeout_secs: 10,
            concurrency: 4,
            base_url: "https://api.themoviedb.org/3".into(),
        }
    }
}

/// Transcoding defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Tier used when the request names none or an unknown one.
    pub default_quality: String,
    /// Video codec names that browsers cannot play directly.
    pub must_transcode: Vec<String>,
    pub audio_bitrate_kbps: u32,
    pub frame_rate: u32,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            default_quality: "720p".into(),
            must_transcode: vec!["hevc".into(), "h265".into(), "av1".into()],
            audio_bitrate_kbps: 128,
            frame_rate: 24,
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}
