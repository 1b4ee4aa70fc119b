#![forbid(unsafe_code)]

//! Common error type for forge crates.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForgeError {
    /// I/O related failures.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parsing failures.
    #[error("Config parse error: {0}")]
    ConfigParse(toml::de::Error),

    /// Cached capability report could not be encoded or decoded.
    #[error("Cache encoding error: {0}")]
    CacheEncoding(#[from] serde_json::Error),

    /// A textual identifier (direction, epoch, key type...) was not recognized.
    #[error("Unknown {kind} `{value}`")]
    UnknownIdentifier { kind: &'static str, value: String },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenient alias for results throughout forge crates.
pub type ForgeResult<T> = Result<T, ForgeError>;
