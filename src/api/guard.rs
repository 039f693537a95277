//! Middleware screening `/{term}` search paths before they reach the handler

use axum::{
    extract::{Path, Request, State as AxumState},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{info, warn};

use crate::SharedState;
use crate::utils::{header_str, is_bot_user_agent, is_reserved_term, split_term_words, truncate_chars};

/// Sends crawlers and terms containing listed words back to the home page,
/// and rewrites `%20` separators to `+`.
pub async fn term_guard(
    AxumState(state): AxumState<SharedState>,
    Path(term): Path<String>,
    request: Request,
    next: Next,
) -> Response {
    if is_reserved_term(&term) {
        return next.run(request).await;
    }

    let user_agent = header_str(request.headers(), "user-agent").unwrap_or_default();
    if state.config.filter.block_bots && is_bot_user_agent(user_agent) {
        info!(
            "Blocked bot from search page {} ({})",
            request.uri().path(),
            truncate_chars(user_agent, 100)
        );
        return Redirect::permanent("/").into_response();
    }

    let words = split_term_words(&term);
    match state.word_store.find_bad_words(&words).await {
        Ok(found) if !found.is_empty() => {
            info!(
                "Detected inappropriate search path {:?}: {:?}",
                truncate_chars(&term, 100),
                found
            );
            return Redirect::permanent("/").into_response();
        }
        Ok(_) => {}
        Err(e) => {
            // Fail open; the search itself is still rate limited
            warn!("Bad word check failed for search path: {}", e);
        }
    }

    let raw_path = request.uri().path();
    if raw_path.contains("%20") {
        let rewritten = raw_path.replace("%20", "+");
        return Redirect::permanent(&rewritten).into_response();
    }

    next.run(request).await
}
