use std::io;

/// Custom error type for tube_access operations
#[derive(Debug, thiserror::Error)]
pub enum TubeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Search failed: {0}")]
    SearchFailed(String),

    #[error("Failed to parse search results: {0}")]
    ParseError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Helper type for Results that use TubeError
pub type Result<T> = std::result::Result<T, TubeError>;
