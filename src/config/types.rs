use serde::Deserialize;

/// Main configuration structure for Touchline
///
/// Every section is optional; a missing section falls back to the built-in
/// pacing and transport defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pacing: PacingConfig,
    pub http: HttpConfig,
    pub navigation: NavigationConfig,
    pub shutdown: ShutdownConfig,
    pub output: OutputConfig,
}

/// Batch scheduler pacing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Smallest number of jobs pulled into one batch
    #[serde(rename = "batch-size-min")]
    pub batch_size_min: usize,

    /// Largest number of jobs pulled into one batch
    #[serde(rename = "batch-size-max")]
    pub batch_size_max: usize,

    /// Lower bound of the pause after a batch (seconds)
    #[serde(rename = "delay-min-secs")]
    pub delay_min_secs: u64,

    /// Upper bound of the pause after a batch (seconds)
    #[serde(rename = "delay-max-secs")]
    pub delay_max_secs: u64,

    /// How long a single queue pull waits before the batch is closed (milliseconds)
    #[serde(rename = "pull-timeout-ms")]
    pub pull_timeout_ms: u64,

    /// Pause after a pull times out (milliseconds)
    #[serde(rename = "idle-pause-ms")]
    pub idle_pause_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            batch_size_min: 3,
            batch_size_max: 5,
            delay_min_secs: 5,
            delay_max_secs: 10,
            pull_timeout_ms: 1000,
            idle_pause_ms: 100,
        }
    }
}

/// HTTP session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Pool of User-Agent values; one is picked at random per request
    #[serde(rename = "user-agents")]
    pub user_agents: Vec<String>,

    /// Whole-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agents: crate::fetch::DEFAULT_USER_AGENTS
                .iter()
                .map(|agent| agent.to_string())
                .collect(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Browser navigation configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Base URL of the WebDriver endpoint (geckodriver, chromedriver, ...)
    #[serde(rename = "webdriver-url")]
    pub webdriver_url: String,

    /// Hard limit for a single page navigation (seconds)
    #[serde(rename = "navigation-timeout-secs")]
    pub navigation_timeout_secs: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".to_string(),
            navigation_timeout_secs: 30,
        }
    }
}

/// Shutdown behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Whether configure() installs SIGINT/SIGTERM hooks
    #[serde(rename = "install-signal-hooks")]
    pub install_signal_hooks: bool,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            install_signal_hooks: true,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite fetch archive
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./touchline.db".to_string(),
        }
    }
}
