//! Filesystem scanner.
//!
//! Walks the configured media roots in order and collects every regular
//! file with a whitelisted container extension. Unreadable entries, missing
//! roots, symlink loops and symlinks leading out of the root are recorded as
//! [`ScanEntryFailure`]s; the walk always completes with whatever was
//! enumerable.
//!
//! A followed symlink must resolve inside the canonical root, the same check
//! [`crate::resolve`] applies before serving a file, so every catalog entry
//! is playable by its own path.
//!
//! Walking is synchronous (`walkdir`) and runs on the blocking pool.

use std::collections::HashSet;
use std::path::Path;

use pk_core::config::LibraryConfig;
use pk_core::ids::normalized_key;
use pk_core::paths::is_video_file;
use pk_core::MediaFile;
use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

/// A single entry the walk could not read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanEntryFailure {
    pub path: String,
    pub error: String,
}

impl ScanEntryFailure {
    fn new(path: impl AsRef<Path>, error: impl std::fmt::Display) -> Self {
        Self {
            path: path.as_ref().display().to_string(),
            error: error.to_string(),
        }
    }
}

/// Result of walking all roots.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub files: Vec<MediaFile>,
    pub errors: Vec<ScanEntryFailure>,
}

/// Walk every configured root on the blocking pool.
pub async fn scan_library(config: &LibraryConfig) -> ScanReport {
    let config = config.clone();
    match tokio::task::spawn_blocking(move || scan_roots(&config)).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "Scan task failed");
            ScanReport {
                files: Vec::new(),
                errors: vec![ScanEntryFailure::new("<scan>", e)],
            }
        }
    }
}

/// Walk every configured root synchronously.
///
/// Roots are visited in order; a relative path already produced by an
/// earlier root is skipped so identifiers stay unique.
pub fn scan_roots(config: &LibraryConfig) -> ScanReport {
    let mut report = ScanReport::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (root_index, root) in config.roots.iter().enumerate() {
        if !root.is_dir() {
            tracing::warn!(root = %root.display(), "Media root is not a directory, skipping");
            report
                .errors
                .push(ScanEntryFailure::new(root, "media root does not exist or is not a directory"));
            continue;
        }

        let before = report.files.len();
        walk_root(root, root_index, config, &mut seen, &mut report);
        tracing::debug!(
            root = %root.display(),
            files = report.files.len() - before,
            "Walked media root"
        );
    }

    tracing::info!(
        roots = config.roots.len(),
        files = report.files.len(),
        errors = report.errors.len(),
        "Scan complete"
    );
    report
}

fn walk_root(
    root: &Path,
    root_index: usize,
    config: &LibraryConfig,
    seen: &mut HashSet<String>,
    report: &mut ScanReport,
) {
    let canonical_root = match root.canonicalize() {
        Ok(p) => p,
        Err(err) => {
            tracing::warn!(root = %root.display(), error = %err, "Cannot canonicalize media root");
            report.errors.push(ScanEntryFailure::new(root, err));
            return;
        }
    };

    let mut walker = WalkDir::new(root)
        .follow_links(config.follow_links)
        .max_depth(config.max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                if err.loop_ancestor().is_some() {
                    tracing::warn!(path = %path.display(), "Symlink loop detected, skipping");
                } else {
                    tracing::warn!(path = %path.display(), error = %err, "Error walking directory");
                }
                report.errors.push(ScanEntryFailure::new(&path, err));
                continue;
            }
        };

        if config.follow_links
            && entry.depth() > 0
            && entry.path_is_symlink()
            && (entry.file_type().is_dir() || is_video_file(entry.path()))
            && !resolves_within(entry.path(), &canonical_root)
        {
            tracing::warn!(path = %entry.path().display(), "Symlink leads outside the media root, skipping");
            report
                .errors
                .push(ScanEntryFailure::new(entry.path(), "symlink leads outside the media root"));
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        if !entry.file_type().is_file() || !is_video_file(entry.path()) {
            continue;
        }

        let relative = match entry.path().strip_prefix(root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => continue,
        };

        let key = normalized_key(&relative);
        if !seen.insert(key.clone()) {
            tracing::debug!(path = %key, root = %root.display(), "Shadowed by an earlier media root");
            continue;
        }

        match entry.metadata() {
            Ok(metadata) => report.files.push(MediaFile::from_metadata(
                entry.path().to_path_buf(),
                relative,
                root_index,
                &metadata,
            )),
            Err(err) => {
                tracing::warn!(file = %entry.path().display(), error = %err, "Failed to stat file");
                seen.remove(&key);
                report.errors.push(ScanEntryFailure::new(entry.path(), err));
            }
        }
    }
}

fn resolves_within(path: &Path, canonical_root: &Path) -> bool {
    path.canonicalize()
        .map(|target| target.starts_with(canonical_root))
        .unwrap_or(false)
}

/// Dotfiles and dot-directories are never part of the catalog.
fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}
