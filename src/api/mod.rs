//! API module for all HTTP handlers

pub mod guard;
pub mod search;
pub mod stats;
pub mod words;

use axum::{Router, middleware, routing};

use crate::SharedState;

// Re-export handlers
pub use guard::term_guard;
pub use search::{search, search_term_path};
pub use stats::{get_stats, root};
pub use words::{check_bad_words, check_words};

/// Build the application router
pub fn router(state: SharedState) -> Router {
    let term_routes = Router::new()
        .route("/{term}", routing::get(search_term_path))
        .route_layer(middleware::from_fn_with_state(state.clone(), term_guard));

    Router::new()
        .route("/", routing::get(root))
        .route("/api/search", routing::get(search))
        .route("/api/check-bad-words", routing::get(check_bad_words))
        .route("/api/check-words", routing::post(check_words))
        .route("/api/stats", routing::get(get_stats))
        .merge(term_routes)
        .with_state(state)
}
