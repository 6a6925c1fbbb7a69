//! Axum router construction.
//!
//! Builds the full application router with all route groups, middleware
//! layers, and static file serving.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/health", get(routes::health::api_health))
        // Catalog
        .route("/movies", get(routes::movies::list_movies))
        .route("/movies/search/{query}", get(routes::movies::search_movies))
        .route("/movies/{id}", get(routes::movies::get_movie))
        .route("/movies/{id}/playback", get(routes::movies::playback))
        // Library
        .route("/library/stats", get(routes::library::stats))
        .route("/library/scan", post(routes::library::scan))
        // Streaming
        .route("/stream", get(routes::stream::stream_file))
        .route("/stream/transcode", get(routes::stream::transcode))
        .route("/stream/sessions", get(routes::stream::sessions))
        .route("/stream/subtitle", get(routes::stream::subtitle))
        .route("/stream/info", get(routes::stream::info))
        .route("/stream/thumbnail", get(routes::stream::thumbnail))
        .fallback(api_not_found);

    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Static file serving for a built client.
    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                tower_http::services::ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(tower_http::services::ServeFile::new(index_path)),
            );
        } else {
            tracing::warn!("Static directory {:?} does not exist; not serving a client", dir);
        }
    }

    app
}

async fn api_not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Route not found", "code": "not_found" })),
    )
}
