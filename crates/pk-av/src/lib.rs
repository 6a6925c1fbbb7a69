//! # pk-av
//!
//! External audio/video tool plumbing for periploko.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support; children are killed when the command is dropped.
//! - **Probing** ([`Prober`], [`FfprobeProber`]) -- container and stream
//!   metadata as a [`ProbeReport`].
//! - **Transcoding** ([`TranscodeSession`]) -- quality tiers, the codec
//!   policy, and a live H.264/AAC fragmented MP4 stream from ffmpeg.
//! - **Thumbnails** ([`extract_thumbnail`]) -- a single preview frame.

pub mod command;
pub mod probe;
pub mod thumbnail;
pub mod tools;
pub mod transcode;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use probe::{FfprobeProber, ProbeReport, Prober};
pub use thumbnail::{extract_thumbnail, validate_seek_time, DEFAULT_THUMBNAIL_TIME};
pub use tools::{ToolInfo, ToolRegistry};
pub use transcode::{
    build_ffmpeg_args, CodecPolicy, QualityProfile, QualityTier, TranscodeSession,
};
