//! Bad-word check endpoints

use axum::{
    Json,
    extract::{Query, State as AxumState, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::SharedState;
use crate::utils::{header_str, split_term_words, truncate_chars};

#[derive(Debug, Deserialize)]
pub struct TermQuery {
    pub term: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckWordsRequest {
    pub text: Option<String>,
}

/// GET /api/check-bad-words?term=... - Whether a search term contains a listed word.
/// Fails open: a store error reports no bad words.
pub async fn check_bad_words(
    AxumState(state): AxumState<SharedState>,
    Query(params): Query<TermQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(term) = params.term.filter(|t| !t.is_empty()) else {
        return Json(json!({"hasBadWords": false}));
    };

    let words = split_term_words(&term);
    match state.word_store.find_bad_words(&words).await {
        Ok(found) => {
            if !found.is_empty() {
                info!(
                    "Detected inappropriate search: term={:?} found={:?} user_agent={:?} referer={:?}",
                    truncate_chars(&term, 100),
                    found,
                    truncate_chars(header_str(&headers, "user-agent").unwrap_or("unknown"), 100),
                    truncate_chars(header_str(&headers, "referer").unwrap_or("direct"), 100),
                );
            }
            Json(json!({"hasBadWords": !found.is_empty()}))
        }
        Err(e) => {
            error!("Bad words check error: {}", e);
            Json(json!({"hasBadWords": false}))
        }
    }
}

fn check_failed() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "Failed to check text"})),
    )
}

/// POST /api/check-words - Whether free text contains a listed word.
/// A body that is not valid JSON is reported like a store failure.
pub async fn check_words(
    AxumState(state): AxumState<SharedState>,
    payload: Result<Json<CheckWordsRequest>, JsonRejection>,
) -> impl IntoResponse {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            error!("Bad word check error: {}", rejection.body_text());
            return check_failed();
        }
    };

    let Some(text) = body.text.filter(|t| !t.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Text is required"})),
        );
    };

    match state.word_store.contains_any(&split_term_words(&text)).await {
        Ok(has_bad_words) => (StatusCode::OK, Json(json!({"hasBadWords": has_bad_words}))),
        Err(e) => {
            error!("Bad word check error: {}", e);
            check_failed()
        }
    }
}
