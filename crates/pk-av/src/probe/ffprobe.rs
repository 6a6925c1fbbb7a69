//! FFprobe-based [`Prober`] implementation.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format -show_streams`
//! and maps the JSON output into a [`ProbeReport`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{AudioStreamInfo, ProbeReport, Prober, VideoStreamInfo};
use crate::command::ToolCommand;

/// Default per-file probe timeout.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    /// Path to the ffprobe binary.
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self {
            ffprobe_path,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Set the per-file timeout. The ffprobe process is killed when it fires.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> pk_core::Result<ProbeReport> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(path.to_string_lossy().as_ref());
        cmd.timeout(self.timeout);

        let output = cmd
            .execute()
            .await
            .map_err(|e| pk_core::Error::Probe(e.to_string()))?;

        let ff: FfprobeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| pk_core::Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

        Ok(parse_ffprobe_output(ff))
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    bit_rate: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse_ffprobe_output(output: FfprobeOutput) -> ProbeReport {
    let mut report = ProbeReport {
        container: output.format.format_name,
        duration: output.format.duration.and_then(|s| s.parse::<f64>().ok()),
        bit_rate: output.format.bit_rate.and_then(|s| s.parse().ok()),
        size: output.format.size.and_then(|s| s.parse().ok()),
        video: None,
        audio: None,
    };

    for stream in output.streams {
        match stream.codec_type.as_deref().unwrap_or("") {
            "video" if report.video.is_none() => {
                report.video = Some(VideoStreamInfo {
                    codec: stream.codec_name,
                    width: stream.width,
                    height: stream.height,
                    frame_rate: stream.r_frame_rate.as_deref().and_then(parse_frame_rate),
                    bit_rate: stream.bit_rate.and_then(|s| s.parse().ok()),
                });
            }
            "audio" if report.audio.is_none() => {
                report.audio = Some(AudioStreamInfo {
                    codec: stream.codec_name,
                    channels: stream.channels,
                    sample_rate: stream.sample_rate.and_then(|s| s.parse().ok()),
                });
            }
            _ => {}
        }
    }

    report
}

fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    let parts: Vec<&str> = rate_str.split('/').collect();
    if parts.len() == 2 {
        let num: f64 = parts[0].parse().ok()?;
        let den: f64 = parts[1].parse().ok()?;
        if den != 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate_str.parse().ok()
}
