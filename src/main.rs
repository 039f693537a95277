use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use tube_access::db::{self, SqlBadWordStore};
use tube_access::logging::{FileLogger, parse_rotation, setup_logging};
use tube_access::rate_limit::spawn_sweeper;
use tube_access::search::YouTubeProvider;
use tube_access::{AppState, SharedState, TubeConfig, api, load_config};

const DEFAULT_CONFIG_PATH: &str = "tube_config.toml";

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config_path =
        std::env::var("TUBE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config: TubeConfig = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Ok(bind_address) = std::env::var("BIND_ADDRESS") {
        config.server.bind_address = bind_address;
    }

    let file_logger = match &config.logging.directory {
        Some(dir) => match parse_rotation(&config.logging.rotation) {
            Ok(rotation) => Some(FileLogger::new(PathBuf::from(dir)).with_rotation(rotation)),
            Err(e) => {
                eprintln!("Configuration error: {}", e);
                std::process::exit(1);
            }
        },
        None => None,
    };
    // Dropping the guard flushes the file writer, keep it for the life of main
    let _log_guard = match setup_logging(file_logger.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Logging error: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match db::init_db(&config.database.path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let word_store = SqlBadWordStore::new(pool);
    if !config.filter.extra_words.is_empty() {
        match word_store.add_words(&config.filter.extra_words).await {
            Ok(added) => info!("Added {} words from config to the word list", added),
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    let provider = match YouTubeProvider::new(
        config.search.base_url.clone(),
        Duration::from_secs(config.search.request_timeout_secs),
    ) {
        Ok(provider) => provider.with_max_retries(config.search.max_retries),
        Err(e) => {
            error!("Failed to build search client: {}", e);
            std::process::exit(1);
        }
    };

    let bind_address = config.server.bind_address.clone();
    let sweep_interval = config.rate_limit.sweep_interval_secs;
    info!(
        "Rate limit: {} searches per {}ms per client",
        config.rate_limit.max_requests, config.rate_limit.window_ms
    );

    let state: SharedState = Arc::new(AppState::new(config, word_store, Arc::new(provider)));
    if sweep_interval > 0 {
        spawn_sweeper(state.limiter.clone(), Duration::from_secs(sweep_interval));
    }

    let app = api::router(state);

    info!("Listening on {}", bind_address);
    info!("Using config at {:?}", config_path);
    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", bind_address, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
