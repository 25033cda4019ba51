//! WebDriver browser context
//!
//! Talks the W3C WebDriver wire protocol to a running driver (geckodriver,
//! chromedriver, a Selenium grid) over `reqwest`. Each opened page is its own
//! WebDriver session; closing the context deletes all of them.

use crate::config::NavigationConfig;
use crate::dispatch::PooledResource;
use crate::TransportError;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// A browser page that can be pointed at a URL
#[async_trait]
pub trait Page: Send + Sync + 'static {
    /// Loads `url` and returns once the browser reports the load complete
    async fn goto(&self, url: &str) -> Result<(), TransportError>;
}

/// Every WebDriver response wraps its payload in `value`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct NewSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    message: String,
}

/// Browser context shared by every navigation job of a handler
#[derive(Debug)]
pub struct WebDriverContext {
    client: Client,
    endpoint: String,
    sessions: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl WebDriverContext {
    /// Creates a context for the driver at `config.webdriver_url`
    ///
    /// No connection is made until the first page is opened.
    pub fn new(config: &NavigationConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.webdriver_url.trim_end_matches('/').to_string(),
            sessions: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Starts a new WebDriver session and returns it as a page
    pub async fn open_page(&self) -> Result<WebDriverPage, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let response = self
            .client
            .post(format!("{}/session", self.endpoint))
            .json(&json!({ "capabilities": { "alwaysMatch": {} } }))
            .send()
            .await?;
        let session: NewSession = read_value(response).await?;

        debug!(session = %session.session_id, "WebDriver session opened");
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.push(session.session_id.clone());
        }

        Ok(WebDriverPage {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            session_id: session.session_id,
        })
    }

    /// Number of sessions opened and not yet deleted
    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Base URL of the driver
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PooledResource for WebDriverContext {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Deletes every open session, reporting the first failure
    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);

        let sessions = self
            .sessions
            .lock()
            .map(|mut s| std::mem::take(&mut *s))
            .unwrap_or_default();

        let mut first_error = None;
        for session in sessions {
            let deleted = match self
                .client
                .delete(format!("{}/session/{}", self.endpoint, session))
                .send()
                .await
            {
                Ok(response) => read_value::<IgnoredAny>(response).await.map(|_| ()),
                Err(e) => Err(e.into()),
            };

            if let Err(e) = deleted {
                warn!(session = %session, error = %e, "Failed to delete WebDriver session");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// One WebDriver session, used as a page
#[derive(Debug, Clone)]
pub struct WebDriverPage {
    client: Client,
    endpoint: String,
    session_id: String,
}

impl WebDriverPage {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[async_trait]
impl Page for WebDriverPage {
    async fn goto(&self, url: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!("{}/session/{}/url", self.endpoint, self.session_id))
            .json(&json!({ "url": url }))
            .send()
            .await?;

        read_value::<IgnoredAny>(response).await?;
        debug!(session = %self.session_id, url = %url, "Navigation complete");
        Ok(())
    }
}

/// Unwraps a WebDriver response, turning error payloads into `TransportError::WebDriver`
async fn read_value<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<Envelope<WireError>>(&text)
            .map(|e| format!("{}: {}", e.value.error, e.value.message))
            .unwrap_or(text);
        return Err(TransportError::WebDriver {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str::<Envelope<T>>(&text)
        .map(|e| e.value)
        .map_err(|e| TransportError::Other(format!("Malformed WebDriver response: {}", e)))
}
