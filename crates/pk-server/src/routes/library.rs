//! Library-level route handlers: quick stats and a full scan report.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use pk_core::paths::lowercase_extension;
use serde::Serialize;
use serde_json::json;

use crate::context::AppContext;
use crate::scanner::{self, ScanEntryFailure};

#[derive(Debug, Serialize)]
pub struct LibraryStats {
    pub total_movies: usize,
    pub total_size: u64,
    pub total_size_formatted: String,
    /// Extension (lowercase) to file count.
    pub formats: BTreeMap<String, usize>,
    pub roots: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ScanSummary {
    pub scanned: usize,
    /// Entries whose probe produced a codec.
    pub probed: usize,
    pub enriched: usize,
    pub errors: Vec<ScanEntryFailure>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// GET /api/library/stats
///
/// Walk only; no probing or enrichment.
pub async fn stats(State(ctx): State<AppContext>) -> impl IntoResponse {
    let report = scanner::scan_library(&ctx.config.library).await;

    let mut formats = BTreeMap::new();
    for file in &report.files {
        let ext = lowercase_extension(&file.path).unwrap_or_default();
        *formats.entry(ext).or_insert(0) += 1;
    }
    let total_size: u64 = report.files.iter().map(|f| f.size).sum();

    let stats = LibraryStats {
        total_movies: report.files.len(),
        total_size,
        total_size_formatted: pk_core::format_size(total_size),
        formats,
        roots: ctx
            .config
            .library
            .roots
            .iter()
            .map(|r| r.display().to_string())
            .collect(),
    };

    Json(json!({ "data": stats }))
}

/// POST /api/library/scan
///
/// Full catalog build, reported as counts.
pub async fn scan(State(ctx): State<AppContext>) -> impl IntoResponse {
    let start_time = Utc::now();
    let catalog = ctx.assembler().build().await;
    let end_time = Utc::now();

    let summary = ScanSummary {
        scanned: catalog.movies.len(),
        probed: catalog.movies.iter().filter(|m| m.codec.is_some()).count(),
        enriched: catalog.movies.iter().filter(|m| m.tmdb.is_some()).count(),
        errors: catalog.errors,
        start_time,
        end_time,
    };

    tracing::info!(
        scanned = summary.scanned,
        probed = summary.probed,
        enriched = summary.enriched,
        errors = summary.errors.len(),
        elapsed_ms = (end_time - start_time).num_milliseconds(),
        "Library scan complete"
    );

    Json(json!({ "data": summary }))
}
