//! Resolution of client-supplied relative paths against the media roots.
//!
//! Two checks guard every file the delivery routes open:
//!
//! 1. [`pk_core::paths::sanitize_relative`] rejects `..`, absolute paths and
//!    empty input lexically, before any filesystem access.
//! 2. The joined path is canonicalized and must still start with the
//!    canonical root. This catches symlinks pointing outside the root.
//!
//! Roots are tried in configured order and the first one containing the
//! file wins, matching the scanner's shadowing rule.

use std::path::{Path, PathBuf};

use pk_core::paths::sanitize_relative;

/// A validated, existing file under one of the media roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Canonical absolute path.
    pub absolute: PathBuf,
    /// Sanitized path relative to the root.
    pub relative: PathBuf,
    pub root_index: usize,
}

/// Resolve `raw` to a regular file under one of `roots`.
///
/// # Errors
///
/// - [`pk_core::Error::InvalidRequest`] for traversal attempts or paths
///   that resolve outside their root.
/// - [`pk_core::Error::NotFound`] when no root contains a regular file at
///   that path.
pub async fn resolve_media_path(roots: &[PathBuf], raw: &str) -> pk_core::Result<ResolvedPath> {
    let relative = sanitize_relative(raw)?;

    for (root_index, root) in roots.iter().enumerate() {
        let candidate = root.join(&relative);
        let absolute = match tokio::fs::canonicalize(&candidate).await {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                tracing::debug!(path = %candidate.display(), error = %e, "Cannot resolve path");
                continue;
            }
        };

        let canonical_root = tokio::fs::canonicalize(root).await?;
        if !absolute.starts_with(&canonical_root) {
            tracing::warn!(
                requested = raw,
                resolved = %absolute.display(),
                root = %canonical_root.display(),
                "Resolved path escapes media root"
            );
            return Err(pk_core::Error::invalid("path resolves outside the media root"));
        }

        if !is_regular_file(&absolute).await {
            continue;
        }

        return Ok(ResolvedPath {
            absolute,
            relative,
            root_index,
        });
    }

    Err(pk_core::Error::not_found("file", raw))
}

async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
