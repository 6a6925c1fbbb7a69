//! Catalog route handlers.
//!
//! Nothing is cached between requests: each handler rebuilds what it needs
//! from the filesystem through the [`CatalogAssembler`](crate::catalog::CatalogAssembler).

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use pk_core::MovieId;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::AppContext;
use crate::error::AppError;
use crate::routes::streaming_helpers::urlencoded;

fn parse_movie_id(raw: &str) -> Result<MovieId, AppError> {
    // An unparseable id can never name a movie.
    raw.parse()
        .map_err(|_| pk_core::Error::not_found("movie", raw).into())
}

/// GET /api/movies
pub async fn list_movies(State(ctx): State<AppContext>) -> impl IntoResponse {
    let catalog = ctx.assembler().build().await;
    let count = catalog.movies.len();
    Json(json!({
        "data": catalog.movies,
        "count": count,
        "scan_errors": catalog.errors,
    }))
}

/// GET /api/movies/{id}
pub async fn get_movie(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_movie_id(&id)?;
    let movie = ctx.assembler().find(id).await?;
    Ok(Json(json!({ "data": movie })))
}

/// GET /api/movies/search/{query}
pub async fn search_movies(
    State(ctx): State<AppContext>,
    Path(query): Path<String>,
) -> impl IntoResponse {
    let catalog = ctx.assembler().build().await;
    let matches: Vec<_> = catalog
        .movies
        .into_iter()
        .filter(|m| m.matches(&query))
        .collect();
    let count = matches.len();
    Json(json!({ "data": matches, "count": count, "query": query }))
}

#[derive(Debug, Deserialize)]
pub struct PlaybackQuery {
    /// Comma-separated codecs the client can decode, e.g. `h264,vp9`.
    pub accept: Option<String>,
}

/// How a client should play one movie.
#[derive(Debug, Serialize)]
pub struct PlaybackDecision {
    pub id: MovieId,
    pub codec: Option<String>,
    pub requires_transcode: bool,
    pub direct_url: String,
    pub transcode_url: String,
    pub subtitle_url: Option<String>,
}

/// GET /api/movies/{id}/playback?accept=h264,vp9
pub async fn playback(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(query): Query<PlaybackQuery>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_movie_id(&id)?;
    let movie = ctx.assembler().find(id).await?;

    let accepted: Option<Vec<String>> = query.accept.as_deref().map(|raw| {
        raw.split(',')
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty())
            .collect()
    });

    let policy = ctx.codec_policy();
    let requires_transcode = match &accepted {
        Some(list) if !list.is_empty() => {
            policy.requires_transcode_for(movie.codec.as_deref(), list)
        }
        _ => movie.requires_transcode,
    };

    let encoded = urlencoded(&movie.path);
    let decision = PlaybackDecision {
        id: movie.id,
        codec: movie.codec.clone(),
        requires_transcode,
        direct_url: format!("/api/stream?path={encoded}"),
        transcode_url: format!(
            "/api/stream/transcode?path={encoded}&quality={}",
            ctx.config.transcode.default_quality
        ),
        subtitle_url: movie
            .subtitle
            .as_deref()
            .map(|s| format!("/api/stream/subtitle?path={}", urlencoded(s))),
    };

    tracing::debug!(
        movie = %decision.id,
        codec = ?decision.codec,
        requires_transcode,
        "Playback decision"
    );

    Ok(Json(json!({ "data": decision })))
}
