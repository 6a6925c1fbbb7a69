//! Catalog data model: discovered files, probe results, enrichment records,
//! and the [`Movie`] entries returned to clients.

use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{normalized_key, MovieId};
use crate::title::ParsedTitle;

// ---------------------------------------------------------------------------
// MediaFile
// ---------------------------------------------------------------------------

/// A file produced by the scanner. Built per scan and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to its media root.
    pub relative_path: PathBuf,
    /// Index of the media root in the configured root list.
    pub root_index: usize,
    /// File size in bytes.
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl MediaFile {
    /// Build from filesystem metadata. Timestamps the platform cannot report
    /// are left empty.
    pub fn from_metadata(
        path: PathBuf,
        relative_path: PathBuf,
        root_index: usize,
        metadata: &std::fs::Metadata,
    ) -> Self {
        Self {
            path,
            relative_path,
            root_index,
            size: metadata.len(),
            created: metadata.created().ok().map(to_utc),
            modified: metadata.modified().ok().map(to_utc),
        }
    }

    /// File name component, lossy.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Relative path with `/` separators, as exposed over HTTP.
    pub fn relative_key(&self) -> String {
        normalized_key(&self.relative_path)
    }

    /// The deterministic identifier for this file.
    pub fn id(&self) -> MovieId {
        MovieId::from_relative_path(&self.relative_path)
    }
}

fn to_utc(t: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(t)
}

// ---------------------------------------------------------------------------
// TechnicalMetadata
// ---------------------------------------------------------------------------

/// Probe result. All fields empty means the probe failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalMetadata {
    /// Duration in seconds.
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Video codec name as reported by the prober (e.g. `h264`, `hevc`).
    pub codec: Option<String>,
}

impl TechnicalMetadata {
    /// `WIDTHxHEIGHT` when both dimensions are known.
    pub fn resolution(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{w}x{h}")),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.duration.is_none()
            && self.width.is_none()
            && self.height.is_none()
            && self.codec.is_none()
    }
}

// ---------------------------------------------------------------------------
// EnrichmentRecord
// ---------------------------------------------------------------------------

/// Descriptive metadata from an external provider. Opaque to the catalog
/// apart from the display title and poster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    /// Identifier in the provider's namespace.
    pub tmdb_id: u64,
    pub title: String,
    pub overview: Option<String>,
    /// Absolute poster image URL.
    pub poster: Option<String>,
    /// Absolute backdrop image URL.
    pub backdrop: Option<String>,
    pub release_date: Option<String>,
    pub year: Option<u16>,
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub genres: Vec<u32>,
}

// ---------------------------------------------------------------------------
// Movie
// ---------------------------------------------------------------------------

/// A catalog entry.
///
/// `id` and `path` always come from the filesystem. `title` and `poster`
/// prefer the enrichment record when one is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub parsed_title: String,
    pub year: Option<u16>,
    pub filename: String,
    /// Path relative to the media root, `/`-separated.
    pub path: String,
    /// Index of the media root this file lives under.
    pub root: usize,
    pub size: u64,
    pub size_formatted: String,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub duration: Option<f64>,
    pub duration_formatted: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub resolution: Option<String>,
    pub codec: Option<String>,
    /// Relative path of the subtitle sidecar.
    pub subtitle: Option<String>,
    pub poster: Option<String>,
    pub tmdb: Option<EnrichmentRecord>,
    pub requires_transcode: bool,
}

impl Movie {
    /// Compose a catalog entry from its parts.
    pub fn assemble(
        file: &MediaFile,
        technical: TechnicalMetadata,
        subtitle: Option<String>,
        parsed: ParsedTitle,
        enrichment: Option<EnrichmentRecord>,
        requires_transcode: bool,
    ) -> Self {
        let title = enrichment
            .as_ref()
            .map(|e| e.title.clone())
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| parsed.title.clone());
        let poster = enrichment.as_ref().and_then(|e| e.poster.clone());
        let year = parsed.year.or_else(|| enrichment.as_ref().and_then(|e| e.year));

        Self {
            id: file.id(),
            title,
            parsed_title: parsed.title,
            year,
            filename: file.file_name(),
            path: file.relative_key(),
            root: file.root_index,
            size: file.size,
            size_formatted: format_size(file.size),
            created_at: file.created,
            modified_at: file.modified,
            duration: technical.duration,
            duration_formatted: technical.duration.map(format_duration),
            resolution: technical.resolution(),
            width: technical.width,
            height: technical.height,
            codec: technical.codec,
            subtitle,
            poster,
            tmdb: enrichment,
            requires_transcode,
        }
    }

    /// Case-insensitive substring match on title, parsed title or filename.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.parsed_title.to_lowercase().contains(&needle)
            || self.filename.to_lowercase().contains(&needle)
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Human-readable size using base-1024 units, two decimals, trailing zeros
/// trimmed.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".into();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", SIZE_UNITS[unit])
}

/// `H:MM:SS` when at least an hour long, else `M:SS`. Zero or invalid
/// durations are `Unknown`.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "Unknown".into();
    }
    let total = seconds.floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
