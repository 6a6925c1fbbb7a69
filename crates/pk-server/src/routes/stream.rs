//! Delivery route handlers: direct range streaming, live transcoding,
//! subtitle conversion, probe info and thumbnails.
//!
//! Every handler takes a `path` query parameter relative to a media root and
//! runs it through [`resolve_media_path`] before touching the filesystem.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use pk_av::{QualityProfile, TranscodeSession};
use pk_core::paths::{is_subtitle_file, is_video_file, lowercase_extension};
use serde::Deserialize;
use serde_json::json;

use crate::context::AppContext;
use crate::error::AppError;
use crate::resolve::{resolve_media_path, ResolvedPath};
use crate::routes::streaming_helpers::serve_file_streaming;
use crate::subtitle::{normalize_vtt, srt_to_vtt, MAX_SUBTITLE_BYTES, VTT_CONTENT_TYPE};

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TranscodeQuery {
    pub path: Option<String>,
    pub quality: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ThumbnailQuery {
    pub path: Option<String>,
    pub time: Option<String>,
}

fn require_path(path: Option<String>) -> Result<String, AppError> {
    path.filter(|p| !p.trim().is_empty())
        .ok_or_else(|| pk_core::Error::invalid("missing path parameter").into())
}

/// Resolve a video path; non-video extensions are rejected before lookup.
async fn resolve_video(ctx: &AppContext, raw: &str) -> Result<ResolvedPath, AppError> {
    if !is_video_file(std::path::Path::new(raw)) {
        return Err(pk_core::Error::invalid("unsupported file type").into());
    }
    Ok(resolve_media_path(&ctx.config.library.roots, raw).await?)
}

/// GET /api/stream?path=REL
///
/// Serve the source file with HTTP range support.
pub async fn stream_file(
    State(ctx): State<AppContext>,
    Query(query): Query<PathQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let raw = require_path(query.path)?;
    let resolved = resolve_video(&ctx, &raw).await?;

    let range = headers
        .get(header::RANGE)
        .map(|v| {
            v.to_str()
                .map_err(|_| pk_core::Error::invalid("Range header is not ASCII"))
        })
        .transpose()?;

    Ok(serve_file_streaming(&resolved.absolute, range).await?)
}

/// GET /api/stream/transcode?path=REL&quality=720p
///
/// Re-encode to H.264/AAC fragmented MP4. The body has no length and the
/// encoder is killed when the client disconnects.
pub async fn transcode(
    State(ctx): State<AppContext>,
    Query(query): Query<TranscodeQuery>,
) -> Result<Response, AppError> {
    let raw = require_path(query.path)?;
    let resolved = resolve_video(&ctx, &raw).await?;
    let ffmpeg = ctx.tools.require("ffmpeg")?;

    let profile = QualityProfile::from_request(query.quality.as_deref(), &ctx.config.transcode);
    let session = TranscodeSession::start(ffmpeg, &resolved.absolute, &profile)?;
    let pid = session.pid();
    let stream = ctx.transcodes.track(
        pk_core::ids::normalized_key(&resolved.relative),
        profile.tier.to_string(),
        pid,
        session.into_stream(),
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "video/mp4"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// GET /api/stream/sessions
pub async fn sessions(State(ctx): State<AppContext>) -> impl IntoResponse {
    let sessions = ctx.transcodes.list();
    let count = sessions.len();
    Json(json!({ "data": sessions, "count": count }))
}

/// GET /api/stream/subtitle?path=REL
///
/// Serve a `.srt` (converted) or `.vtt` (normalised) sidecar as WebVTT.
pub async fn subtitle(
    State(ctx): State<AppContext>,
    Query(query): Query<PathQuery>,
) -> Result<Response, AppError> {
    let raw = require_path(query.path)?;
    if !is_subtitle_file(std::path::Path::new(&raw)) {
        return Err(pk_core::Error::invalid("only .srt and .vtt subtitles are supported").into());
    }

    let resolved = resolve_media_path(&ctx.config.library.roots, &raw)
        .await
        .map_err(|e| match e {
            pk_core::Error::NotFound { .. } => pk_core::Error::not_found("subtitle", &raw),
            other => other,
        })?;

    let size = tokio::fs::metadata(&resolved.absolute)
        .await
        .map_err(pk_core::Error::from)?
        .len();
    if size > MAX_SUBTITLE_BYTES {
        return Err(pk_core::Error::invalid(format!(
            "subtitle file is {size} bytes, limit is {MAX_SUBTITLE_BYTES}"
        ))
        .into());
    }

    let bytes = tokio::fs::read(&resolved.absolute)
        .await
        .map_err(pk_core::Error::from)?;
    let text = String::from_utf8_lossy(&bytes);

    let vtt = match lowercase_extension(&resolved.absolute).as_deref() {
        Some("vtt") => normalize_vtt(&text),
        _ => srt_to_vtt(&text),
    };

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, VTT_CONTENT_TYPE)],
        vtt,
    )
        .into_response())
}

/// GET /api/stream/info?path=REL
pub async fn info(
    State(ctx): State<AppContext>,
    Query(query): Query<PathQuery>,
) -> Result<Response, AppError> {
    let raw = require_path(query.path)?;
    let resolved = resolve_video(&ctx, &raw).await?;

    let timeout = ctx.config.probe.timeout();
    let report = tokio::time::timeout(timeout, ctx.prober.probe(&resolved.absolute))
        .await
        .map_err(|_| {
            pk_core::Error::Probe(format!("timed out after {}s", timeout.as_secs()))
        })?
        .map_err(|e| match e {
            pk_core::Error::Probe(_) => e,
            other => pk_core::Error::Probe(other.to_string()),
        })?;

    Ok(Json(json!({ "data": report })).into_response())
}

/// GET /api/stream/thumbnail?path=REL&time=00:00:10
pub async fn thumbnail(
    State(ctx): State<AppContext>,
    Query(query): Query<ThumbnailQuery>,
) -> Result<Response, AppError> {
    let raw = require_path(query.path)?;
    let time = query
        .time
        .unwrap_or_else(|| pk_av::DEFAULT_THUMBNAIL_TIME.to_string());
    pk_av::validate_seek_time(&time)?;

    let resolved = resolve_video(&ctx, &raw).await?;
    let jpeg = pk_av::extract_thumbnail(&ctx.tools, &resolved.absolute, &time).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        jpeg,
    )
        .into_response())
}
