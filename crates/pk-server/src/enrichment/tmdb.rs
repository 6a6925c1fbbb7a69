//! TMDB (The Movie Database) enrichment provider.
//!
//! Features:
//! - Token-bucket rate limiting at 4 requests / second via [`governor`].
//! - Automatic retry on HTTP 429 with `Retry-After` header support (max 3 retries).
//! - Per-request timeout from `metadata.timeout_secs`.
//! - Confidence scoring based on title similarity and year proximity.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use pk_core::EnrichmentRecord;
use reqwest::StatusCode;
use serde::Deserialize;

use super::EnrichmentProvider;

const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";
const MAX_RETRIES: u32 = 3;
const REQUESTS_PER_SECOND: u32 = 4;
/// Results scoring below this are treated as no match.
const MIN_CONFIDENCE: f64 = 0.2;

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResult {
    id: u64,
    title: Option<String>,
    release_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    vote_average: Option<f64>,
    #[serde(default)]
    genre_ids: Vec<u32>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

pub struct TmdbProvider {
    client: reqwest::Client,
    api_key: String,
    language: String,
    base_url: String,
    rate_limiter: DirectLimiter,
}

impl TmdbProvider {
    pub fn new(
        api_key: String,
        language: String,
        base_url: String,
        timeout: Duration,
    ) -> pk_core::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| pk_core::Error::Enrichment(format!("failed to build HTTP client: {e}")))?;

        let quota = Quota::per_second(NonZeroU32::new(REQUESTS_PER_SECOND).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            api_key,
            language,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    /// GET with rate limiting and 429 back-off.
    async fn get(&self, path: &str, params: &[(&str, &str)]) -> pk_core::Result<reqwest::Response> {
        let url = format!("{}{path}", self.base_url);
        let mut retries = 0u32;
        loop {
            self.rate_limiter.until_ready().await;

            let resp = self
                .client
                .get(&url)
                .query(&[("api_key", self.api_key.as_str()), ("language", self.language.as_str())])
                .query(params)
                .send()
                .await
                .map_err(|e| pk_core::Error::Enrichment(format!("TMDB request failed: {e}")))?;

            if resp.status() == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                retries += 1;
                let wait = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1);
                tracing::warn!(retry = retries, wait_secs = wait, "TMDB returned 429, backing off");
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            return resp
                .error_for_status()
                .map_err(|e| pk_core::Error::Enrichment(format!("TMDB returned error: {e}")));
        }
    }

    async fn search_movie(&self, title: &str, year: Option<u16>) -> pk_core::Result<Vec<SearchResult>> {
        let year_str = year.map(|y| y.to_string());
        let mut params = vec![("query", title), ("include_adult", "false")];
        if let Some(ref y) = year_str {
            params.push(("year", y.as_str()));
        }

        tracing::debug!(title, year = ?year, "TMDB search movie");

        let body: SearchResponse = self
            .get("/search/movie", &params)
            .await?
            .json()
            .await
            .map_err(|e| pk_core::Error::Enrichment(format!("TMDB parse error: {e}")))?;
        Ok(body.results)
    }
}

/// Score a search result against the query.
fn confidence(
    query_title: &str,
    result_title: &str,
    query_year: Option<u16>,
    result_year: Option<u16>,
) -> f64 {
    let base = if query_title == result_title {
        0.5
    } else if query_title.eq_ignore_ascii_case(result_title) {
        0.4
    } else if result_title
        .to_lowercase()
        .contains(&query_title.to_lowercase())
    {
        0.2
    } else {
        0.1
    };

    let year_bonus = match (query_year, result_year) {
        (Some(q), Some(r)) if q == r => 0.3,
        (Some(q), Some(r)) if q.abs_diff(r) <= 1 => 0.15,
        _ => 0.0,
    };

    base + year_bonus
}

/// Four-digit year from a date like `"2023-04-15"`.
fn parse_year(date: Option<&str>) -> Option<u16> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

fn image_url(size: &str, path: Option<&str>) -> Option<String> {
    path.filter(|p| !p.is_empty())
        .map(|p| format!("{IMAGE_BASE_URL}/{size}{p}"))
}

fn to_record(r: SearchResult) -> EnrichmentRecord {
    let year = parse_year(r.release_date.as_deref());
    EnrichmentRecord {
        tmdb_id: r.id,
        title: r.title.unwrap_or_default(),
        overview: r.overview.filter(|o| !o.is_empty()),
        poster: image_url("w500", r.poster_path.as_deref()),
        backdrop: image_url("original", r.backdrop_path.as_deref()),
        release_date: r.release_date.filter(|d| !d.is_empty()),
        year,
        vote_average: r.vote_average,
        genres: r.genre_ids,
    }
}

#[async_trait]
impl EnrichmentProvider for TmdbProvider {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    async fn lookup(
        &self,
        title: &str,
        year: Option<u16>,
    ) -> pk_core::Result<Option<EnrichmentRecord>> {
        if title.trim().is_empty() {
            return Ok(None);
        }

        let results = self.search_movie(title, year).await?;

        let best = results
            .into_iter()
            .map(|r| {
                let score = confidence(
                    title,
                    r.title.as_deref().unwrap_or_default(),
                    year,
                    parse_year(r.release_date.as_deref()),
                );
                (score, r)
            })
            .filter(|(score, _)| *score >= MIN_CONFIDENCE)
            // Stable on ties: the first (most popular) result wins.
            .fold(None::<(f64, SearchResult)>, |best, (score, r)| match best {
                Some((b, _)) if b >= score => best,
                _ => Some((score, r)),
            });

        Ok(best.map(|(score, r)| {
            tracing::debug!(title, tmdb_id = r.id, confidence = score, "TMDB match");
            to_record(r)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> TmdbProvider {
        TmdbProvider::new(
            "test-key".into(),
            "en-US".into(),
            server.uri(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn results() -> serde_json::Value {
        json!({
            "results": [
                {"id": 11, "title": "Heat Wave", "release_date": "2011-05-01",
                 "poster_path": "/wave.jpg", "genre_ids": [18]},
                {"id": 949, "title": "Heat", "release_date": "1995-12-15",
                 "overview": "Obsessive master thief.", "poster_path": "/heat.jpg",
                 "backdrop_path": "/heat-bg.jpg", "vote_average": 7.9,
                 "genre_ids": [28, 80, 18]}
            ]
        })
    }

    #[test]
    fn confidence_prefers_exact_title_and_year() {
        let exact = confidence("Heat", "Heat", Some(1995), Some(1995));
        let near = confidence("Heat", "Heat", Some(1995), Some(1996));
        let partial = confidence("Heat", "Heat Wave", Some(1995), Some(2011));
        assert!(exact > near && near > partial);
        assert!((exact - 0.8).abs() < 1e-9);
    }

    #[test]
    fn year_from_release_date() {
        assert_eq!(parse_year(Some("1995-12-15")), Some(1995));
        assert_eq!(parse_year(Some("")), None);
        assert_eq!(parse_year(None), None);
    }

    #[tokio::test]
    async fn lookup_picks_best_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .and(query_param("api_key", "test-key"))
            .and(query_param("query", "Heat"))
            .and(query_param("year", "1995"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results()))
            .expect(1)
            .mount(&server)
            .await;

        let record = provider(&server)
            .lookup("Heat", Some(1995))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.tmdb_id, 949);
        assert_eq!(record.title, "Heat");
        assert_eq!(record.year, Some(1995));
        assert_eq!(record.poster.as_deref(), Some("https://image.tmdb.org/t/p/w500/heat.jpg"));
        assert_eq!(
            record.backdrop.as_deref(),
            Some("https://image.tmdb.org/t/p/original/heat-bg.jpg")
        );
        assert_eq!(record.genres, vec![28, 80, 18]);
    }

    #[tokio::test]
    async fn empty_results_are_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;

        assert!(provider(&server).lookup("Nothing Here", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn server_error_is_enrichment_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = provider(&server).lookup("Heat", None).await.unwrap_err();
        assert_matches!(err, pk_core::Error::Enrichment(_));
    }

    #[tokio::test]
    async fn retries_after_429() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results()))
            .mount(&server)
            .await;

        let record = provider(&server).lookup("Heat", Some(1995)).await.unwrap();
        assert_eq!(record.map(|r| r.tmdb_id), Some(949));
    }

    #[tokio::test]
    async fn blank_title_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        assert!(provider(&server).lookup("  ", None).await.unwrap().is_none());
    }
}
