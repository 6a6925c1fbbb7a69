use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// GET /health
pub async fn health_check() -> &'static str {
    "ok"
}

/// GET /api/health
pub async fn api_health() -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now(),
    }))
}
