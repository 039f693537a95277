//! Search endpoints: `/api/search?term=` and the `/{term}` path

use axum::{
    Json,
    extract::{ConnectInfo, Path, Query, Request, State as AxumState},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::error::TubeError;
use crate::rate_limit::Admission;
use crate::utils::{
    client_key, header_str, is_bot_user_agent, is_reserved_term, looks_like_video_title,
    sanitize_term, truncate_chars,
};
use crate::video::{Video, filter_bad_words};
use crate::{AppState, SharedState};

/// Seconds a client is told to wait after an upstream failure
const UPSTREAM_RETRY_AFTER_SECS: u64 = 300;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub term: Option<String>,
}

/// Body returned by both search endpoints
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub search_term: String,
    pub videos: Vec<Video>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl SearchResponse {
    pub fn found(term: &str, videos: Vec<Video>) -> Self {
        Self {
            search_term: term.to_string(),
            videos,
            blocked: None,
            reason: None,
            error: None,
            message: None,
            retry_after: None,
            timestamp: None,
        }
    }

    pub fn blocked(term: &str, reason: &str) -> Self {
        Self {
            blocked: Some(true),
            reason: Some(reason.to_string()),
            ..Self::found(term, Vec::new())
        }
    }

    /// Empty results with an explanation, used when the upstream fails
    pub fn unavailable(term: &str, message: String) -> Self {
        Self {
            error: Some("Temporarily unavailable".to_string()),
            message: Some(message),
            retry_after: Some(UPSTREAM_RETRY_AFTER_SECS),
            timestamp: Some(Utc::now().to_rfc3339()),
            ..Self::found(term, Vec::new())
        }
    }
}

/// GET /api/search?term=... - Search videos
pub async fn search(
    AxumState(state): AxumState<SharedState>,
    Query(params): Query<SearchQuery>,
    request: Request,
) -> Response {
    let term = params.term.unwrap_or_default();

    // Browsers request these on their own
    if term == "favicon" || request.uri().to_string().contains("manifest") {
        return StatusCode::NO_CONTENT.into_response();
    }

    if term.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Search term is required"})),
        )
            .into_response();
    }

    run_search(&state, &term, request.headers(), peer_addr(&request)).await
}

/// GET /{term} - Search for a term given as a path segment, e.g. `/lofi+beats`
pub async fn search_term_path(
    AxumState(state): AxumState<SharedState>,
    Path(term): Path<String>,
    request: Request,
) -> Response {
    if is_reserved_term(&term) {
        return Redirect::permanent("/").into_response();
    }

    if term.chars().count() > state.config.search.max_term_length {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid search term. Please try again."})),
        )
            .into_response();
    }

    let Some(clean_term) = sanitize_term(&term) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Please enter a valid search term."})),
        )
            .into_response();
    };

    run_search(&state, &clean_term, request.headers(), peer_addr(&request)).await
}

fn peer_addr(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Bot screening, admission, upstream call and result filtering for one term
async fn run_search(
    state: &AppState,
    term: &str,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> Response {
    let client = client_key(headers, peer);
    let request_id = Uuid::now_v7();
    let span = info_span!("search", %request_id, client = %client);

    async move {
        let user_agent = header_str(headers, "user-agent").unwrap_or("unknown");
        let referer = header_str(headers, "referer").unwrap_or("direct");
        let is_bot = is_bot_user_agent(user_agent);

        info!(
            term = truncate_chars(term, 150),
            term_length = term.chars().count(),
            is_bot,
            user_agent = truncate_chars(user_agent, 100),
            referer,
            "New search request"
        );

        if looks_like_video_title(term) {
            warn!(
                "Suspicious search term detected: {:?} (bot: {}, referer: {})",
                truncate_chars(term, 150),
                is_bot,
                referer
            );
            // Does not consume a rate limit slot
            if is_bot && state.config.filter.block_bots {
                info!("Blocked bot search for video title");
                return Json(SearchResponse::blocked(term, "Bot search for video title"))
                    .into_response();
            }
        }

        let limit = state.limiter.max_requests();
        let admission = state.limiter.check(&client);
        if let Admission::Denied { reset_in_secs } = admission {
            warn!(
                "Too many searches from {} - {} requests per {}ms, retry in {}s",
                client,
                limit,
                state.limiter.window().as_millis(),
                reset_in_secs
            );
            return rate_limited_response(limit, reset_in_secs);
        }

        let response = match state
            .provider
            .search(term, state.config.search.result_limit)
            .await
        {
            Ok(videos) => {
                let videos = if state.config.search.filter_results {
                    remove_flagged_videos(state, videos).await
                } else {
                    videos
                };
                Json(SearchResponse::found(term, videos)).into_response()
            }
            Err(e) => {
                error!("Error during search: {}", e);
                let message = match e {
                    TubeError::ParseError(_) => "YouTube has temporarily blocked our requests or changed their page structure. Please try again in a few minutes.".to_string(),
                    other => other.to_string(),
                };
                info!("Returning empty results due to error: {}", message);
                // Degrade to an empty result set instead of surfacing a 5xx
                Json(SearchResponse::unavailable(term, message)).into_response()
            }
        };

        with_rate_limit_headers(response, limit, admission.remaining())
    }
    .instrument(span)
    .await
}

async fn remove_flagged_videos(state: &AppState, videos: Vec<Video>) -> Vec<Video> {
    match state.word_store.all_words().await {
        Ok(words) => {
            let before = videos.len();
            let kept = filter_bad_words(videos, &words);
            if kept.len() < before {
                info!("Filtered {} results containing listed words", before - kept.len());
            }
            kept
        }
        Err(e) => {
            warn!("Could not load word list, returning unfiltered results: {}", e);
            videos
        }
    }
}

fn rate_limited_response(limit: usize, reset_in_secs: u64) -> Response {
    let response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": "Too many requests",
            "message": format!(
                "Too many searches. Please wait {} seconds before searching again.",
                reset_in_secs
            ),
            "retryAfter": reset_in_secs,
        })),
    )
        .into_response();

    let mut response = with_rate_limit_headers(response, limit, 0);
    let headers = response.headers_mut();
    headers.insert("retry-after", HeaderValue::from(reset_in_secs));
    headers.insert("x-ratelimit-reset", HeaderValue::from(reset_in_secs));
    response
}

fn with_rate_limit_headers(mut response: Response, limit: usize, remaining: usize) -> Response {
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
    response
}
