//! Integration tests for library stats, scan and health routes.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{url, TestHarness};
use http_body_util::BodyExt;
use tower::ServiceExt;

fn library() -> TestHarness {
    let h = TestHarness::new();
    h.write("Heat (1995).mkv", vec![0u8; 1024]);
    h.write("Alien (1979).MKV", vec![0u8; 512]);
    h.write("shorts/clip.mp4", vec![0u8; 512]);
    h.write("shorts/Truncated.broken.avi", vec![0u8; 100]);
    h.write("shorts/download.mp4.part", vec![0u8; 100]);
    h
}

#[tokio::test]
async fn stats_counts_without_probing() {
    let (_h, addr) = library().serve().await;

    let json: serde_json::Value = reqwest::get(url(addr, "/api/library/stats"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let data = &json["data"];
    assert_eq!(data["total_movies"], 4);
    assert_eq!(data["total_size"], 2148);
    assert_eq!(data["total_size_formatted"], "2.1 KB");
    assert_eq!(data["formats"]["mkv"], 2);
    assert_eq!(data["formats"]["mp4"], 1);
    assert_eq!(data["formats"]["avi"], 1);
    assert_eq!(data["roots"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn scan_reports_counts() {
    let (_h, addr) = library().serve().await;

    let resp = reqwest::Client::new()
        .post(url(addr, "/api/library/scan"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    let data = &json["data"];
    assert_eq!(data["scanned"], 4);
    // The broken file keeps its entry but has no codec.
    assert_eq!(data["probed"], 3);
    assert_eq!(data["enriched"], 0);
    assert!(data["errors"].as_array().unwrap().is_empty());
    assert!(data["start_time"].is_string());
    assert!(data["end_time"].is_string());
}

#[tokio::test]
async fn scan_requires_post() {
    let h = library();
    let resp = h
        .router()
        .oneshot(Request::get("/api/library/scan").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn health_routes() {
    let h = TestHarness::new();

    let resp = h
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ok");

    let resp = h
        .router()
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "OK");
}

#[tokio::test]
async fn request_id_is_propagated() {
    let h = TestHarness::new();

    let resp = h
        .router()
        .oneshot(
            Request::get("/api/health")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "abc-123");
}
