//! Touchline: a paced request dispatcher for league scrapers
//!
//! This crate funnels every outbound fetch and browser navigation of a scraping
//! process through one background scheduler that drains work in small randomized
//! batches, so concurrent scrapers share a single polite egress path.

pub mod config;
pub mod dispatch;
pub mod fetch;
pub mod navigate;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for Touchline operations
#[derive(Debug, Error)]
pub enum TouchlineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors surfaced by a dispatcher to its callers
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0} not configured yet; call configure() first")]
    NotConfigured(&'static str),

    #[error("{0} is shutting down")]
    ShutDown(&'static str),

    #[error("Job was dropped before producing a result")]
    Abandoned,

    #[error("Invalid pacing: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures of the underlying network or browser call
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Navigation to {url} timed out after {after:?}")]
    NavigationTimeout {
        url: String,
        after: std::time::Duration,
    },

    #[error("WebDriver error ({status}): {message}")]
    WebDriver { status: u16, message: String },

    #[error("Session is closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Touchline operations
pub type Result<T> = std::result::Result<T, TouchlineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for dispatcher operations
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{Dispatcher, ResultHandle};
pub use fetch::{Body, RequestHandler, ResponseShape};
pub use navigate::{NavigationHandler, Page};
