//! In-process tests for the HTTP API using a stub search provider.

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;

use tube_access::db::{SqlBadWordStore, init_memory_db};
use tube_access::error::{Result, TubeError};
use tube_access::search::SearchProvider;
use tube_access::video::Video;
use tube_access::{AppState, TubeConfig, api};

const BROWSER_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Returns canned videos, or fails when `fail` is set
struct StubProvider {
    calls: AtomicUsize,
    fail: bool,
}

impl StubProvider {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for StubProvider {
    async fn search(&self, term: &str, limit: usize) -> Result<Vec<Video>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TubeError::SearchFailed("upstream responded with 429".to_string()));
        }
        Ok(vec![
            Video::new("one").with_title(format!("{} compilation", term)),
            Video::new("two").with_title("A darn good video"),
            Video::new("three").with_title("Relaxing music"),
        ]
        .into_iter()
        .take(limit)
        .collect())
    }
}

async fn app_with(provider: Arc<StubProvider>) -> Router {
    let store = SqlBadWordStore::new(init_memory_db().await.unwrap());
    store.add_words(&["darn".to_string()]).await.unwrap();
    let state = Arc::new(AppState::new(TubeConfig::default(), store, provider));
    api::router(state)
}

/// App whose word store pool is already closed, so every store call fails
async fn app_with_closed_store(provider: Arc<StubProvider>) -> Router {
    let pool = init_memory_db().await.unwrap();
    let store = SqlBadWordStore::new(pool.clone());
    pool.close().await;
    let state = Arc::new(AppState::new(TubeConfig::default(), store, provider));
    api::router(state)
}

fn post_json(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-real-ip", ip)
        .header(header::USER_AGENT, BROWSER_UA)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header_of<'a>(response: &'a Response, name: &str) -> &'a str {
    response.headers().get(name).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn search_requires_term() {
    let app = app_with(StubProvider::new(false)).await;

    let response = app.oneshot(get("/api/search", "1.2.3.4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Search term is required");
}

#[tokio::test]
async fn favicon_request_is_ignored() {
    let provider = StubProvider::new(false);
    let app = app_with(provider.clone()).await;

    let response = app.oneshot(get("/api/search?term=favicon", "1.2.3.4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn search_returns_filtered_videos_with_limit_headers() {
    let app = app_with(StubProvider::new(false)).await;

    let response = app.oneshot(get("/api/search?term=cats", "1.2.3.4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_of(&response, "x-ratelimit-limit"), "5");
    assert_eq!(header_of(&response, "x-ratelimit-remaining"), "4");

    let body = json_body(response).await;
    assert_eq!(body["searchTerm"], "cats");
    let ids: Vec<_> = body["videos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["one", "three"]);
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn sixth_search_in_window_is_rate_limited() {
    let provider = StubProvider::new(false);
    let app = app_with(provider.clone()).await;

    for _ in 0..5 {
        let response = app.clone().oneshot(get("/api/search?term=cats", "9.9.9.9")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(get("/api/search?term=cats", "9.9.9.9")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header_of(&response, "retry-after"), "60");
    assert_eq!(header_of(&response, "x-ratelimit-reset"), "60");
    assert_eq!(header_of(&response, "x-ratelimit-remaining"), "0");
    let body = json_body(response).await;
    assert_eq!(body["error"], "Too many requests");
    assert_eq!(body["retryAfter"], 60);
    assert_eq!(provider.calls(), 5);

    // another client is unaffected
    let response = app.oneshot(get("/api/search?term=cats", "8.8.8.8")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn bot_searching_a_video_title_is_blocked_without_upstream_call() {
    let provider = StubProvider::new(false);
    let app = app_with(provider.clone()).await;

    let request = Request::builder()
        .uri("/api/search?term=Some%20Song%20%7C%20Some%20Artist")
        .header(header::USER_AGENT, "Mozilla/5.0 (compatible; Googlebot/2.1)")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["blocked"], true);
    assert_eq!(body["reason"], "Bot search for video title");
    assert_eq!(body["videos"].as_array().unwrap().len(), 0);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn upstream_failure_degrades_to_empty_results() {
    let app = app_with(StubProvider::new(true)).await;

    let response = app.oneshot(get("/api/search?term=cats", "1.2.3.4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["error"], "Temporarily unavailable");
    assert_eq!(body["retryAfter"], 300);
    assert_eq!(body["videos"].as_array().unwrap().len(), 0);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn check_bad_words_endpoint() {
    let app = app_with(StubProvider::new(false)).await;

    let response = app
        .clone()
        .oneshot(get("/api/check-bad-words?term=well+DARN+it", "1.2.3.4"))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["hasBadWords"], true);

    let response = app
        .clone()
        .oneshot(get("/api/check-bad-words?term=kittens", "1.2.3.4"))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["hasBadWords"], false);

    let response = app.oneshot(get("/api/check-bad-words", "1.2.3.4")).await.unwrap();
    assert_eq!(json_body(response).await["hasBadWords"], false);
}

#[tokio::test]
async fn check_words_endpoint() {
    let app = app_with(StubProvider::new(false)).await;

    let post = |body| post_json("/api/check-words", body);

    let response = app.clone().oneshot(post(r#"{"text": "oh darn"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["hasBadWords"], true);

    let response = app.clone().oneshot(post(r#"{"text": ""}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Text is required");

    let response = app.clone().oneshot(post(r#"{}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.oneshot(post(r#"{"text": "oh darn""#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "Failed to check text");
}

#[tokio::test]
async fn store_failures_fail_open_except_check_words() {
    let provider = StubProvider::new(false);
    let app = app_with_closed_store(provider.clone()).await;

    // guard lets the term through and results come back unfiltered
    let response = app.clone().oneshot(get("/cats", "1.2.3.4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["searchTerm"], "cats");
    assert_eq!(body["videos"].as_array().unwrap().len(), 3);
    assert_eq!(provider.calls(), 1);

    let response = app
        .clone()
        .oneshot(get("/api/check-bad-words?term=oh+darn", "1.2.3.4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["hasBadWords"], false);

    let response = app
        .oneshot(post_json("/api/check-words", r#"{"text": "oh darn"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "Failed to check text");
}

#[tokio::test]
async fn term_path_searches_sanitized_term() {
    let app = app_with(StubProvider::new(false)).await;

    let response = app.oneshot(get("/lofi+beats", "1.2.3.4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["searchTerm"], "lofi beats");
}

#[tokio::test]
async fn term_path_redirects() {
    let provider = StubProvider::new(false);
    let app = app_with(provider.clone()).await;

    let response = app.clone().oneshot(get("/oh+darn", "1.2.3.4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(header_of(&response, "location"), "/");

    let response = app.clone().oneshot(get("/lofi%20beats", "1.2.3.4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(header_of(&response, "location"), "/lofi+beats");

    let response = app.clone().oneshot(get("/favicon.ico", "1.2.3.4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(header_of(&response, "location"), "/");

    let bot = Request::builder()
        .uri("/cats")
        .header(header::USER_AGENT, "curl/8.4.0")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(bot).await.unwrap();
    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);

    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn term_path_rejects_overlong_terms() {
    let app = app_with(StubProvider::new(false)).await;

    let uri = format!("/{}", "a".repeat(101));
    let response = app.oneshot(get(&uri, "1.2.3.4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_report_limiter_counts() {
    let app = app_with(StubProvider::new(false)).await;

    app.clone()
        .oneshot(get("/api/search?term=cats", "1.2.3.4"))
        .await
        .unwrap();

    let response = app.oneshot(get("/api/stats", "1.2.3.4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["server"]["name"], "tube_access");
    assert_eq!(body["rate_limit"]["admitted"], 1);
    assert_eq!(body["rate_limit"]["tracked_clients"], 1);
    assert_eq!(body["bad_words"], 1);
}

#[tokio::test]
async fn root_health_check() {
    let app = app_with(StubProvider::new(false)).await;

    let response = app.clone().oneshot(get("/", "1.2.3.4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"tube_access - healthy");

    let response = app.oneshot(get("/?format=json", "1.2.3.4")).await.unwrap();
    assert_eq!(json_body(response).await["status"], "healthy");
}
