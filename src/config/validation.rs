use crate::config::types::{Config, HttpConfig, NavigationConfig, OutputConfig, PacingConfig};
use crate::dispatch::Pacing;
use crate::ConfigError;
use url::Url;

/// Largest batch a scheduler may assemble
const MAX_BATCH_SIZE: usize = 100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_pacing_config(&config.pacing)?;
    validate_http_config(&config.http)?;
    validate_navigation_config(&config.navigation)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates scheduler pacing
fn validate_pacing_config(config: &PacingConfig) -> Result<(), ConfigError> {
    if config.batch_size_max > MAX_BATCH_SIZE {
        return Err(ConfigError::Validation(format!(
            "batch_size_max must be <= {}, got {}",
            MAX_BATCH_SIZE, config.batch_size_max
        )));
    }

    Pacing::from(config).validate()
}

/// Validates the HTTP session settings
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agents.is_empty() {
        return Err(ConfigError::Validation(
            "user_agents must contain at least one entry".to_string(),
        ));
    }

    if let Some(index) = config.user_agents.iter().position(|agent| agent.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "user_agents[{}] cannot be empty",
            index
        )));
    }

    if config.request_timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(format!(
            "HTTP timeouts must be >= 1s, got request={}s connect={}s",
            config.request_timeout_secs, config.connect_timeout_secs
        )));
    }

    Ok(())
}

/// Validates the WebDriver endpoint and navigation timeout
fn validate_navigation_config(config: &NavigationConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.webdriver_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid webdriver_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "webdriver_url '{}' must use http or https",
            config.webdriver_url
        )));
    }

    if config.navigation_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "navigation_timeout_secs must be >= 1s".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
