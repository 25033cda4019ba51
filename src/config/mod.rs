//! Configuration module for Touchline
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use touchline::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("touchline.toml")).unwrap();
//! println!("Batches hold up to {} jobs", config.pacing.batch_size_max);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, HttpConfig, NavigationConfig, OutputConfig, PacingConfig, ShutdownConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
