//! Health and stats endpoints

use axum::{
    Json,
    extract::{Query, State as AxumState},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::warn;

use crate::rate_limit::LimiterStats;
use crate::{APP_NAME, SharedState};

/// Server statistics
#[derive(Debug, Serialize)]
pub struct ServerStats {
    pub name: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub started_at: String,
}

/// Combined stats response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub server: ServerStats,
    pub rate_limit: LimiterStats,
    pub bad_words: i64,
}

/// Root health check endpoint
/// Supports ?format=json for detailed JSON response
pub async fn root(
    AxumState(state): AxumState<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if params.get("format").map(|s| s.as_str()) == Some("json") {
        Json(json!({
            "name": APP_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": state.start_time.elapsed().as_secs(),
            "tracked_clients": state.limiter.tracked_clients(),
            "status": "healthy"
        }))
        .into_response()
    } else {
        format!("{} - healthy", APP_NAME).into_response()
    }
}

/// GET /api/stats - Server, rate limiter and word list statistics
pub async fn get_stats(AxumState(state): AxumState<SharedState>) -> Json<StatsResponse> {
    let bad_words = state.word_store.count().await.unwrap_or_else(|e| {
        warn!("Failed to count bad words: {}", e);
        0
    });

    let server = ServerStats {
        name: APP_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        started_at: state.started_at.to_rfc3339(),
    };

    Json(StatsResponse {
        server,
        rate_limit: state.limiter.stats(),
        bad_words,
    })
}
