//! Subtitle sidecar lookup.
//!
//! A sidecar is a file in the same directory with the same base name and a
//! subtitle extension (`Heat.1995.mkv` -> `Heat.1995.srt`). Extensions are
//! tried in [`SUBTITLE_EXTENSIONS`] order; there is no fuzzy matching.

use pk_core::ids::normalized_key;
use pk_core::paths::SUBTITLE_EXTENSIONS;
use pk_core::MediaFile;

/// Relative path of the subtitle sidecar for `file`, if one exists.
pub async fn find_sidecar(file: &MediaFile) -> Option<String> {
    for ext in SUBTITLE_EXTENSIONS {
        let candidate = file.path.with_extension(ext);
        match tokio::fs::metadata(&candidate).await {
            Ok(meta) if meta.is_file() => {
                return Some(normalized_key(&file.relative_path.with_extension(ext)));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::debug!(file = %candidate.display(), error = %e, "Cannot stat sidecar");
            }
        }
    }
    None
}
