pub mod api;
pub mod db;
pub mod error;
pub mod logging;
pub mod rate_limit;
pub mod search;
pub mod utils;
pub mod video;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use db::SqlBadWordStore;
use error::{Result, TubeError};
use rate_limit::RateLimiter;
use search::SearchProvider;

pub const APP_NAME: &str = "tube_access";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TubeConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub rate_limit: RateLimitConfig,
    pub search: SearchConfig,
    pub filter: FilterConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/words.sqlite".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: usize,
    /// Sweep the whole table every N checks (0 disables)
    pub sweep_every: u64,
    /// Background sweep period in seconds (0 disables)
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 5,
            sweep_every: 100,
            sweep_interval_secs: 300,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn build_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.window(), self.max_requests).with_sweep_every(self.sweep_every)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub result_limit: usize,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
    pub max_term_length: usize,
    /// Drop results whose title or description contains a listed word
    pub filter_results: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com".to_string(),
            result_limit: 12,
            max_retries: 1,
            request_timeout_secs: 15,
            max_term_length: 100,
            filter_results: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FilterConfig {
    /// Turn away crawlers on search paths
    pub block_bots: bool,
    /// Words added to the store at startup
    pub extra_words: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            block_bots: true,
            extra_words: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rolling log files; console only when unset
    pub directory: Option<String>,
    /// daily, hourly or never
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            rotation: "daily".to_string(),
        }
    }
}

impl TubeConfig {
    /// Check values that would make the service misbehave
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.max_requests == 0 {
            return Err(TubeError::ConfigError(
                "rate_limit.max_requests must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.window_ms == 0 {
            return Err(TubeError::ConfigError(
                "rate_limit.window_ms must be greater than 0".to_string(),
            ));
        }
        if self.search.result_limit == 0 {
            return Err(TubeError::ConfigError(
                "search.result_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load and parse the configuration file. A missing file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<TubeConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(TubeConfig::default());
    }

    let config_str = std::fs::read_to_string(path).map_err(|e| {
        TubeError::ConfigError(format!("Failed to read config file '{}': {}", path.display(), e))
    })?;

    parse_config(&config_str)
}

pub fn parse_config(config_str: &str) -> Result<TubeConfig> {
    let config: TubeConfig = toml::from_str(config_str)?;
    config.validate()?;
    Ok(config)
}

pub struct AppState {
    pub config: TubeConfig,
    pub limiter: Arc<RateLimiter>,
    pub word_store: SqlBadWordStore,
    pub provider: Arc<dyn SearchProvider>,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: TubeConfig,
        word_store: SqlBadWordStore,
        provider: Arc<dyn SearchProvider>,
    ) -> Self {
        Self {
            limiter: Arc::new(config.rate_limit.build_limiter()),
            config,
            word_store,
            provider,
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;
