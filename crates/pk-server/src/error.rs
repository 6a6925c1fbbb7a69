//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`pk_core::Error`] so that route handlers
//! can return `Result<T, AppError>` and use `?` on core results.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError(pk_core::Error);

impl AppError {
    pub fn new(inner: pk_core::Error) -> Self {
        Self(inner)
    }
}

impl From<pk_core::Error> for AppError {
    fn from(e: pk_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.0,
                "Server error in API handler"
            );
        } else {
            tracing::debug!(status = %status, error = %self.0, "Request rejected");
        }

        let body = json!({
            "error": self.0.to_string(),
            "code": self.0.code(),
        });

        let mut response = (status, axum::Json(body)).into_response();

        if let pk_core::Error::RangeNotSatisfiable { size } = self.0 {
            if let Ok(v) = HeaderValue::from_str(&format!("bytes */{size}")) {
                response.headers_mut().insert(header::CONTENT_RANGE, v);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_produces_404() {
        let err = AppError::new(pk_core::Error::not_found("file", "a.mp4"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_request_produces_400() {
        let err = AppError::new(pk_core::Error::invalid("bad range"));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unsatisfiable_range_carries_content_range() {
        let response =
            AppError::new(pk_core::Error::RangeNotSatisfiable { size: 1024 }).into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes */1024"
        );
    }

    #[tokio::test]
    async fn body_carries_message_and_code() {
        use http_body_util::BodyExt;

        let response = AppError::new(pk_core::Error::Transcode("encoder died".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "transcode_error");
        assert_eq!(json["error"], "Transcode error: encoder died");
        assert!(json.get("request_id").is_none());
    }
}
