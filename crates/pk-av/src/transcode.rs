//! On-the-fly transcoding to a browser-safe H.264/AAC fragmented MP4.
//!
//! A [`TranscodeSession`] owns a running ffmpeg child whose stdout is the
//! response body. The child is spawned with `kill_on_drop`, and the stream
//! returned by [`TranscodeSession::into_stream`] owns the child, so dropping
//! the stream (the client went away) kills the encoder.

use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::process::Stdio;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use pk_core::config::TranscodeConfig;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;

/// Number of stderr lines kept for error reporting.
const STDERR_TAIL_LINES: usize = 20;

/// Read size for the encoder's stdout pipe.
const CHUNK_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Quality tiers
// ---------------------------------------------------------------------------

/// Caller-selectable output quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QualityTier {
    #[serde(rename = "480p")]
    Sd480,
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    FullHd1080,
}

impl QualityTier {
    pub const ALL: [QualityTier; 3] = [Self::Sd480, Self::Hd720, Self::FullHd1080];

    /// Parse a tier name (`480p`, `720p`, `1080p`), case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "480p" => Some(Self::Sd480),
            "720p" => Some(Self::Hd720),
            "1080p" => Some(Self::FullHd1080),
            _ => None,
        }
    }

    /// Resolve a requested tier, falling back to `default` when the request
    /// names none or an unknown one.
    pub fn resolve(requested: Option<&str>, default: QualityTier) -> Self {
        match requested {
            None => default,
            Some(raw) => Self::parse(raw).unwrap_or_else(|| {
                tracing::debug!(requested = raw, fallback = %default, "Unknown quality tier");
                default
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sd480 => "480p",
            Self::Hd720 => "720p",
            Self::FullHd1080 => "1080p",
        }
    }

    /// Output frame size and target video bitrate for this tier.
    pub fn dimensions(self) -> (u32, u32, u32) {
        match self {
            Self::Sd480 => (854, 480, 800),
            Self::Hd720 => (1280, 720, 1500),
            Self::FullHd1080 => (1920, 1080, 3000),
        }
    }
}

impl Default for QualityTier {
    fn default() -> Self {
        Self::Hd720
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed encode parameters for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityProfile {
    pub tier: QualityTier,
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub frame_rate: u32,
}

impl QualityProfile {
    /// Profile for `tier` with the configured audio bitrate and frame rate.
    pub fn for_tier(tier: QualityTier, config: &TranscodeConfig) -> Self {
        let (width, height, video_bitrate_kbps) = tier.dimensions();
        Self {
            tier,
            width,
            height,
            video_bitrate_kbps,
            audio_bitrate_kbps: config.audio_bitrate_kbps,
            frame_rate: config.frame_rate,
        }
    }

    /// Resolve a request's tier string against the configured default.
    pub fn from_request(requested: Option<&str>, config: &TranscodeConfig) -> Self {
        let default = QualityTier::parse(&config.default_quality).unwrap_or_default();
        Self::for_tier(QualityTier::resolve(requested, default), config)
    }
}

// ---------------------------------------------------------------------------
// Codec policy
// ---------------------------------------------------------------------------

/// Decides whether a source codec can be played directly.
#[derive(Debug, Clone, Default)]
pub struct CodecPolicy {
    must_transcode: Vec<String>,
}

impl CodecPolicy {
    pub fn new(codecs: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            must_transcode: codecs
                .into_iter()
                .map(|c| c.as_ref().trim().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &TranscodeConfig) -> Self {
        Self::new(&config.must_transcode)
    }

    /// Server-side verdict from the configured codec list. An unknown codec
    /// is tried directly.
    pub fn requires_transcode(&self, codec: Option<&str>) -> bool {
        codec
            .map(|c| self.must_transcode.contains(&c.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    /// Client-driven verdict: transcode unless the client lists the codec.
    /// An empty `accepted` list defers to [`Self::requires_transcode`].
    pub fn requires_transcode_for(&self, codec: Option<&str>, accepted: &[String]) -> bool {
        if accepted.is_empty() {
            return self.requires_transcode(codec);
        }
        match codec {
            Some(c) => !accepted.iter().any(|a| a.eq_ignore_ascii_case(c)),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// ffmpeg arguments
// ---------------------------------------------------------------------------

/// Arguments for an ffmpeg run writing fragmented MP4 to stdout.
pub fn build_ffmpeg_args(input: &Path, profile: &QualityProfile) -> Vec<String> {
    let vb = format!("{}k", profile.video_bitrate_kbps);
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-nostdin", "-i"]
        .into_iter()
        .map(String::from)
        .collect();
    args.push(input.to_string_lossy().into_owned());
    args.extend(
        [
            "-map", "0:v:0",
            "-map", "0:a:0?",
            "-c:v", "libx264",
            "-preset", "veryfast",
            "-pix_fmt", "yuv420p",
        ]
        .into_iter()
        .map(String::from),
    );
    args.extend([
        "-vf".to_string(),
        format!("scale={}:{}", profile.width, profile.height),
        "-b:v".to_string(),
        vb.clone(),
        "-maxrate".to_string(),
        vb,
        "-bufsize".to_string(),
        format!("{}k", profile.video_bitrate_kbps * 2),
        "-r".to_string(),
        profile.frame_rate.to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{}k", profile.audio_bitrate_kbps),
        "-ac".to_string(),
        "2".to_string(),
    ]);
    args.extend(
        [
            "-movflags", "frag_keyframe+empty_moov+default_base_moof",
            "-f", "mp4",
            "pipe:1",
        ]
        .into_iter()
        .map(String::from),
    );
    args
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A running encoder process.
pub struct TranscodeSession {
    child: Child,
    stdout: ChildStdout,
    stderr_tail: JoinHandle<VecDeque<String>>,
    label: String,
}

impl TranscodeSession {
    /// Start ffmpeg for `input` at `profile`.
    pub fn start(ffmpeg: &Path, input: &Path, profile: &QualityProfile) -> pk_core::Result<Self> {
        tracing::info!(
            input = %input.display(),
            tier = %profile.tier,
            width = profile.width,
            height = profile.height,
            video_bitrate_kbps = profile.video_bitrate_kbps,
            "Starting transcode"
        );
        let args = build_ffmpeg_args(input, profile);
        Self::spawn(ffmpeg, &args, input.display().to_string())
    }

    /// Spawn an arbitrary encoder command whose stdout is the media stream.
    pub fn spawn(program: &Path, args: &[String], label: String) -> pk_core::Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| pk_core::Error::tool("ffmpeg", format!("failed to spawn: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| pk_core::Error::Internal("encoder stdout not captured".into()))?;

        let stderr = child.stderr.take();
        let stderr_tail = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let Some(stderr) = stderr else {
                return tail;
            };
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(target: "pk_av::ffmpeg", "{line}");
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail
        });

        Ok(Self {
            child,
            stdout,
            stderr_tail,
            label,
        })
    }

    /// OS process id of the encoder, if still running.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Turn the session into a byte stream.
    ///
    /// The stream ends cleanly when the encoder exits successfully. A
    /// non-zero exit yields a final `Err` wrapping [`pk_core::Error::Transcode`]
    /// so the HTTP body is aborted rather than ending as if complete.
    pub fn into_stream(self) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
        let TranscodeSession {
            mut child,
            stdout,
            stderr_tail,
            label,
        } = self;

        async_stream::try_stream! {
            let mut reader = ReaderStream::with_capacity(stdout, CHUNK_SIZE);
            let mut sent: u64 = 0;
            while let Some(chunk) = reader.next().await {
                let chunk = chunk?;
                sent += chunk.len() as u64;
                yield chunk;
            }

            let status = child.wait().await?;
            let mut tail = stderr_tail.await.unwrap_or_default();
            if !status.success() {
                tracing::warn!(
                    input = %label,
                    status = %status,
                    bytes_sent = sent,
                    stderr = %tail.make_contiguous().join(" | "),
                    "Transcode failed"
                );
                Err::<(), _>(std::io::Error::other(pk_core::Error::Transcode(format!(
                    "encoder exited with {status}: {}",
                    tail.back().map(String::as_str).unwrap_or("no output")
                ))))?;
            }
            tracing::info!(input = %label, bytes_sent = sent, "Transcode finished");
        }
    }
}

impl fmt::Debug for TranscodeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscodeSession")
            .field("label", &self.label)
            .field("pid", &self.child.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> TranscodeConfig {
        TranscodeConfig::default()
    }

    #[test]
    fn tier_parsing() {
        assert_eq!(QualityTier::parse("480p"), Some(QualityTier::Sd480));
        assert_eq!(QualityTier::parse("720P"), Some(QualityTier::Hd720));
        assert_eq!(QualityTier::parse(" 1080p "), Some(QualityTier::FullHd1080));
        assert_eq!(QualityTier::parse("4k"), None);
    }

    #[test]
    fn unknown_tier_falls_back_to_default() {
        let profile = QualityProfile::from_request(Some("potato"), &config());
        assert_eq!(profile.tier, QualityTier::Hd720);
        assert_eq!((profile.width, profile.height), (1280, 720));
        assert_eq!(profile.video_bitrate_kbps, 1500);
        assert_eq!(profile.audio_bitrate_kbps, 128);
        assert_eq!(profile.frame_rate, 24);
    }

    #[test]
    fn missing_tier_uses_configured_default() {
        let mut cfg = config();
        cfg.default_quality = "480p".into();
        let profile = QualityProfile::from_request(None, &cfg);
        assert_eq!(profile.tier, QualityTier::Sd480);
        assert_eq!((profile.width, profile.height, profile.video_bitrate_kbps), (854, 480, 800));
    }

    #[test]
    fn bad_configured_default_uses_720p() {
        let mut cfg = config();
        cfg.default_quality = "8k".into();
        let profile = QualityProfile::from_request(Some("nope"), &cfg);
        assert_eq!(profile.tier, QualityTier::Hd720);
    }

    #[test]
    fn tier_table() {
        assert_eq!(QualityTier::FullHd1080.dimensions(), (1920, 1080, 3000));
        let names: Vec<&str> = QualityTier::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(names, vec!["480p", "720p", "1080p"]);
    }

    #[test]
    fn codec_policy_from_config() {
        let policy = CodecPolicy::from_config(&config());
        assert!(policy.requires_transcode(Some("hevc")));
        assert!(policy.requires_transcode(Some("HEVC")));
        assert!(!policy.requires_transcode(Some("h264")));
        assert!(!policy.requires_transcode(None));
    }

    #[test]
    fn codec_policy_client_driven() {
        let policy = CodecPolicy::new(["hevc"]);
        let accepted = vec!["h264".to_string(), "hevc".to_string()];
        assert!(!policy.requires_transcode_for(Some("hevc"), &accepted));
        assert!(policy.requires_transcode_for(Some("vp9"), &accepted));
        assert!(policy.requires_transcode_for(Some("hevc"), &[]));
    }

    #[test]
    fn ffmpeg_args_follow_profile() {
        let profile = QualityProfile::for_tier(QualityTier::FullHd1080, &config());
        let args = build_ffmpeg_args(Path::new("/media/film.mkv"), &profile);
        let joined = args.join(" ");
        assert!(joined.contains("-i /media/film.mkv"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-vf scale=1920:1080"));
        assert!(joined.contains("-b:v 3000k"));
        assert!(joined.contains("-c:a aac -b:a 128k"));
        assert!(joined.contains("-r 24"));
        assert!(joined.contains("frag_keyframe+empty_moov"));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[cfg(unix)]
    fn sh(script: &str) -> TranscodeSession {
        TranscodeSession::spawn(
            &PathBuf::from("/bin/sh"),
            &["-c".to_string(), script.to_string()],
            "test".into(),
        )
        .unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stream_yields_encoder_output() {
        let stream = sh("printf 'fragment-one'; printf 'fragment-two'").into_stream();
        let chunks: Vec<_> = stream.collect().await;
        let bytes: Vec<u8> = chunks
            .into_iter()
            .flat_map(|c| c.unwrap().to_vec())
            .collect();
        assert_eq!(bytes, b"fragment-onefragment-two");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_encoder_ends_with_error() {
        let stream = sh("printf 'partial'; echo 'Invalid data found' >&2; exit 3").into_stream();
        let chunks: Vec<_> = stream.collect().await;
        assert!(chunks.first().unwrap().is_ok());
        let err = chunks.last().unwrap().as_ref().unwrap_err();
        assert!(err.to_string().contains("Invalid data found"), "{err}");
        let inner = err.get_ref().and_then(|e| e.downcast_ref::<pk_core::Error>());
        assert!(matches!(inner, Some(pk_core::Error::Transcode(_))), "{err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_tail_keeps_last_lines() {
        let stream = sh(
            "i=0; while [ $i -lt 50 ]; do echo \"line $i\" >&2; i=$((i+1)); done; exit 1",
        )
        .into_stream();
        let chunks: Vec<_> = stream.collect().await;
        let err = chunks.last().unwrap().as_ref().unwrap_err();
        assert!(err.to_string().ends_with("line 49"), "{err}");
    }

    #[tokio::test]
    async fn spawn_failure_is_tool_error() {
        let err = TranscodeSession::spawn(
            &PathBuf::from("/nonexistent/ffmpeg"),
            &[],
            "test".into(),
        )
        .unwrap_err();
        assert!(matches!(err, pk_core::Error::Tool { .. }));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn dropping_stream_kills_encoder() {
        let session = sh("exec sleep 30");
        let pid = session.pid().unwrap();
        let stream = session.into_stream();
        drop(stream);

        let stat_path = format!("/proc/{pid}/stat");
        let mut gone = false;
        for _ in 0..50 {
            match std::fs::read_to_string(&stat_path) {
                Err(_) => {
                    gone = true;
                    break;
                }
                // Killed but not yet reaped.
                Ok(stat) if stat.contains(") Z") => {
                    gone = true;
                    break;
                }
                Ok(_) => tokio::time::sleep(std::time::Duration::from_millis(100)).await,
            }
        }
        assert!(gone, "encoder process {pid} still running after drop");
    }
}
