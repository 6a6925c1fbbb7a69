//! Technical probing of media files.
//!
//! The [`Prober`] trait is the seam between the catalog and whatever
//! inspects container/stream metadata. [`FfprobeProber`] shells out to the
//! `ffprobe` CLI; tests substitute their own implementations.

pub mod ffprobe;

use std::path::Path;

use async_trait::async_trait;
use pk_core::TechnicalMetadata;
use serde::{Deserialize, Serialize};

pub use self::ffprobe::FfprobeProber;

/// A media file prober.
///
/// Implementations must be safe to share across threads (`Send + Sync`) and
/// must bound their own running time.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Human-readable name identifying this prober implementation.
    fn name(&self) -> &'static str;

    /// Probe a media file at the given path.
    async fn probe(&self, path: &Path) -> pk_core::Result<ProbeReport>;
}

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Everything a probe learned about a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Container format name(s), e.g. `matroska,webm`.
    pub container: Option<String>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// Overall bitrate in bits per second.
    pub bit_rate: Option<u64>,
    pub size: Option<u64>,
    /// First video stream.
    pub video: Option<VideoStreamInfo>,
    /// First audio stream.
    pub audio: Option<AudioStreamInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    pub bit_rate: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub codec: Option<String>,
    pub channels: Option<u32>,
    pub sample_rate: Option<u32>,
}

impl ProbeReport {
    /// Reduce to the fields the catalog carries.
    pub fn technical(&self) -> TechnicalMetadata {
        let video = self.video.as_ref();
        TechnicalMetadata {
            duration: self.duration,
            width: video.and_then(|v| v.width),
            height: video.and_then(|v| v.height),
            codec: video.and_then(|v| v.codec.clone()),
        }
    }
}
