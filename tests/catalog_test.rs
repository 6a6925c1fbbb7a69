//! Integration tests for the catalog routes.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use common::{url, TestHarness};
use pk_core::EnrichmentRecord;
use pk_server::enrichment::EnrichmentProvider;
use serde_json::Value;

async fn get_json(addr: std::net::SocketAddr, path: &str) -> (u16, Value) {
    let resp = reqwest::get(url(addr, path)).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

fn movie_library() -> TestHarness {
    let h = TestHarness::new();
    h.write("Heat (1995).mkv", b"heat");
    h.write("Sci-Fi/Blade.Runner.1982.Final.Cut.mp4", b"blade runner");
    h.write("Sci-Fi/Blade.Runner.1982.Final.Cut.srt", b"1\n00:00:01,000 --> 00:00:02,000\nHi\n");
    h.write("Dune.2021.2160p.hevc.mkv", b"dune");
    h.write("Truncated.broken.mp4", b"x");
    h.write("notes.txt", b"not a movie");
    h.write(".hidden.mp4", b"hidden");
    h
}

fn ids(json: &Value) -> HashSet<String> {
    json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn list_contains_every_video() {
    let (_h, addr) = movie_library().serve().await;

    let (status, json) = get_json(addr, "/api/movies").await;
    assert_eq!(status, 200);
    assert_eq!(json["count"], 4);
    assert!(json["scan_errors"].as_array().unwrap().is_empty());

    let movies = json["data"].as_array().unwrap();
    let heat = movies.iter().find(|m| m["filename"] == "Heat (1995).mkv").unwrap();
    assert_eq!(heat["title"], "Heat");
    assert_eq!(heat["year"], 1995);
    assert_eq!(heat["duration_formatted"], "1:30:00");
    assert_eq!(heat["resolution"], "1920x1080");
    assert_eq!(heat["codec"], "h264");
    assert_eq!(heat["requires_transcode"], false);
    assert_eq!(heat["root"], 0);

    let blade = movies
        .iter()
        .find(|m| m["path"] == "Sci-Fi/Blade.Runner.1982.Final.Cut.mp4")
        .unwrap();
    assert_eq!(blade["year"], 1982);
    assert_eq!(blade["subtitle"], "Sci-Fi/Blade.Runner.1982.Final.Cut.srt");

    let dune = movies.iter().find(|m| m["year"] == 2021).unwrap();
    assert_eq!(dune["codec"], "hevc");
    assert_eq!(dune["requires_transcode"], true);
}

#[tokio::test]
async fn ids_are_stable_across_scans() {
    let (_h, addr) = movie_library().serve().await;

    let (_, first) = get_json(addr, "/api/movies").await;
    let (_, second) = get_json(addr, "/api/movies").await;
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(ids(&first).len(), 4);
}

#[tokio::test]
async fn failed_probe_keeps_entry_with_null_fields() {
    let (_h, addr) = movie_library().serve().await;

    let (_, json) = get_json(addr, "/api/movies").await;
    let movies = json["data"].as_array().unwrap();
    let broken = movies
        .iter()
        .find(|m| m["filename"] == "Truncated.broken.mp4")
        .unwrap();
    assert!(broken["duration"].is_null());
    assert!(broken["resolution"].is_null());
    assert!(broken["codec"].is_null());
    assert_eq!(broken["requires_transcode"], false);

    // Fully probed entries coexist in the same result.
    assert!(movies.iter().any(|m| m["codec"] == "h264"));
}

#[tokio::test]
async fn get_by_id() {
    let (_h, addr) = movie_library().serve().await;

    let (_, list) = get_json(addr, "/api/movies").await;
    let heat_id = list["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["title"] == "Heat")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, json) = get_json(addr, &format!("/api/movies/{heat_id}")).await;
    assert_eq!(status, 200);
    assert_eq!(json["data"]["id"], heat_id.as_str());
    assert_eq!(json["data"]["path"], "Heat (1995).mkv");
}

#[tokio::test]
async fn unknown_or_garbage_id_is_404() {
    let (_h, addr) = movie_library().serve().await;

    let (status, _) = get_json(addr, "/api/movies/00000000-0000-0000-0000-000000000000").await;
    assert_eq!(status, 404);

    let (status, json) = get_json(addr, "/api/movies/not-a-uuid").await;
    assert_eq!(status, 404);
    assert_eq!(json["code"], "not_found");
}

#[tokio::test]
async fn search_is_case_insensitive() {
    let (_h, addr) = movie_library().serve().await;

    let (status, json) = get_json(addr, "/api/movies/search/BLADE").await;
    assert_eq!(status, 200);
    assert_eq!(json["count"], 1);
    assert_eq!(json["query"], "BLADE");

    let (_, json) = get_json(addr, "/api/movies/search/zzz").await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn playback_decision_follows_policy_and_client() {
    let (_h, addr) = movie_library().serve().await;

    let (_, list) = get_json(addr, "/api/movies").await;
    let movies = list["data"].as_array().unwrap();
    let id_of = |pred: &dyn Fn(&Value) -> bool| {
        movies.iter().find(|m| pred(m)).unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string()
    };
    let dune = id_of(&|m| m["codec"] == "hevc");
    let blade = id_of(&|m| m["year"] == 1982);

    let (status, json) = get_json(addr, &format!("/api/movies/{dune}/playback")).await;
    assert_eq!(status, 200);
    assert_eq!(json["data"]["requires_transcode"], true);
    assert_eq!(
        json["data"]["transcode_url"],
        "/api/stream/transcode?path=Dune.2021.2160p.hevc.mkv&quality=720p"
    );
    assert!(json["data"]["subtitle_url"].is_null());

    // A client that decodes HEVC plays it directly.
    let (_, json) = get_json(addr, &format!("/api/movies/{dune}/playback?accept=h264,hevc")).await;
    assert_eq!(json["data"]["requires_transcode"], false);

    // A client without H.264 support needs a transcode even for H.264.
    let (_, json) = get_json(addr, &format!("/api/movies/{blade}/playback?accept=vp9")).await;
    assert_eq!(json["data"]["requires_transcode"], true);
    assert_eq!(
        json["data"]["direct_url"],
        "/api/stream?path=Sci-Fi/Blade.Runner.1982.Final.Cut.mp4"
    );
    assert_eq!(
        json["data"]["subtitle_url"],
        "/api/stream/subtitle?path=Sci-Fi/Blade.Runner.1982.Final.Cut.srt"
    );
}

#[tokio::test]
async fn missing_root_is_reported_not_fatal() {
    let gone = std::env::temp_dir().join("periploko-test-root-that-does-not-exist");
    let h = TestHarness::with_config(move |c| c.library.roots.push(gone));
    h.write("Heat (1995).mkv", b"heat");
    let (_h, addr) = h.serve().await;

    let (status, json) = get_json(addr, "/api/movies").await;
    assert_eq!(status, 200);
    assert_eq!(json["count"], 1);
    assert_eq!(json["scan_errors"].as_array().unwrap().len(), 1);
}

struct StaticProvider;

#[async_trait]
impl EnrichmentProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn lookup(
        &self,
        title: &str,
        year: Option<u16>,
    ) -> pk_core::Result<Option<EnrichmentRecord>> {
        if title == "Heat" {
            Ok(Some(EnrichmentRecord {
                tmdb_id: 949,
                title: "Heat".into(),
                overview: Some("A group of professional bank robbers...".into()),
                poster: Some("https://image.tmdb.org/t/p/w500/heat.jpg".into()),
                backdrop: None,
                release_date: Some("1995-12-15".into()),
                year,
                vote_average: Some(7.9),
                genres: vec![28, 80],
            }))
        } else {
            Err(pk_core::Error::Enrichment("upstream unavailable".into()))
        }
    }
}

#[tokio::test]
async fn enrichment_is_attached_and_failures_degrade() {
    let h = TestHarness::with_enrichment(Arc::new(StaticProvider));
    h.write("Heat (1995).mkv", b"heat");
    h.write("Alien (1979).mkv", b"alien");
    let (_h, addr) = h.serve().await;

    let (_, json) = get_json(addr, "/api/movies").await;
    let movies = json["data"].as_array().unwrap();
    assert_eq!(movies.len(), 2);

    let heat = movies.iter().find(|m| m["title"] == "Heat").unwrap();
    assert_eq!(heat["poster"], "https://image.tmdb.org/t/p/w500/heat.jpg");
    assert_eq!(heat["tmdb"]["overview"], "A group of professional bank robbers...");

    let alien = movies.iter().find(|m| m["title"] == "Alien").unwrap();
    assert!(alien["tmdb"].is_null());
    assert!(alien["poster"].is_null());
}

#[cfg(unix)]
#[tokio::test]
async fn every_listed_path_is_streamable() {
    let outside = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(outside.path().join("shows")).unwrap();
    std::fs::write(outside.path().join("shows/Film.2001.mkv"), b"outside").unwrap();

    let h = TestHarness::new();
    h.write("Heat (1995).mkv", b"heat");
    std::os::unix::fs::symlink(outside.path().join("shows"), h.media.path().join("linked")).unwrap();
    let (_h, addr) = h.serve().await;

    let (status, json) = get_json(addr, "/api/movies").await;
    assert_eq!(status, 200);
    assert_eq!(json["count"], 1);
    assert_eq!(json["data"][0]["path"], "Heat (1995).mkv");
    let errors = json["scan_errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0]["path"].as_str().unwrap().ends_with("linked"));

    let client = reqwest::Client::new();
    for movie in json["data"].as_array().unwrap() {
        let resp = client
            .get(url(addr, "/api/stream"))
            .query(&[("path", movie["path"].as_str().unwrap())])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "{}", movie["path"]);
    }

    let resp = client
        .get(url(addr, "/api/stream"))
        .query(&[("path", "linked/Film.2001.mkv")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
