//! Path utilities: the container whitelist, sidecar extensions, and lexical
//! validation of client-supplied relative paths.
//!
//! The whitelist is shared by scanning and playback so a file that never
//! appears in the catalog cannot be streamed either.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Recognised video container extensions (lowercase, without the dot).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v"];

/// Subtitle sidecar extensions, in lookup order.
pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "vtt"];

/// Lowercased extension of `path`, if it has a UTF-8 one.
pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Check if a path has a whitelisted video extension.
///
/// ```
/// use std::path::Path;
/// use pk_core::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("movie.MKV")));
/// assert!(!is_video_file(Path::new("movie.srt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    lowercase_extension(path)
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Check if a path has a subtitle sidecar extension.
pub fn is_subtitle_file(path: &Path) -> bool {
    lowercase_extension(path)
        .map(|ext| SUBTITLE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Lexically validate a client-supplied path relative to a media root.
///
/// Rejects empty paths, absolute paths, drive prefixes and any `..`
/// component before the filesystem is touched. `.` components are
/// dropped. The returned path contains only normal components.
///
/// This does not resolve symlinks; callers must still canonicalize the
/// joined path and check it stays under the canonical root.
pub fn sanitize_relative(raw: &str) -> Result<PathBuf> {
    if raw.trim().is_empty() {
        return Err(Error::invalid("path is required"));
    }
    if raw.contains('\0') {
        return Err(Error::invalid("path contains a NUL byte"));
    }

    let mut clean = PathBuf::new();
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::invalid("path traversal is not allowed"));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::invalid("path must be relative to a media root"));
            }
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(Error::invalid("path is required"));
    }
    Ok(clean)
}
