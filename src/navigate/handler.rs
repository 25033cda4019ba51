//! Navigation handler

use crate::config::Config;
use crate::dispatch::{Dispatcher, Pacing, PooledResource, ResultHandle};
use crate::navigate::{Page, WebDriverContext, WebDriverPage};
use crate::{DispatchError, DispatchResult, TransportError};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::timeout;

type Opener<B> = Arc<dyn Fn() -> Result<B, TransportError> + Send + Sync>;

/// Paced page navigation dispatcher
///
/// Pages are owned by the caller; the handler only decides when each
/// navigation runs and bounds how long it may take.
pub struct NavigationHandler<B: PooledResource = WebDriverContext> {
    dispatcher: Dispatcher<B>,
    navigation_timeout: Duration,
    opener: Opener<B>,
}

impl<B: PooledResource> Clone for NavigationHandler<B> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            navigation_timeout: self.navigation_timeout,
            opener: Arc::clone(&self.opener),
        }
    }
}

impl<B: PooledResource> std::fmt::Debug for NavigationHandler<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationHandler")
            .field("dispatcher", &self.dispatcher)
            .field("navigation_timeout", &self.navigation_timeout)
            .finish()
    }
}

impl NavigationHandler<WebDriverContext> {
    /// Creates an unconfigured handler driving the configured WebDriver endpoint
    pub fn new(config: &Config) -> Self {
        let navigation = config.navigation.clone();
        Self::with_browser(config, move || WebDriverContext::new(&navigation))
    }

    /// Process-wide handler built from the default configuration
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<NavigationHandler> = OnceLock::new();
        GLOBAL.get_or_init(|| NavigationHandler::new(&Config::default()))
    }

    /// Opens a new page in the shared browser context
    pub async fn open_page(&self) -> DispatchResult<WebDriverPage> {
        let browser = self
            .dispatcher
            .resource()
            .ok_or(DispatchError::NotConfigured(self.dispatcher.name()))?;
        Ok(browser.open_page().await?)
    }
}

impl<B: PooledResource> NavigationHandler<B> {
    /// Creates an unconfigured handler whose browser context is built by `open`
    pub fn with_browser<F>(config: &Config, open: F) -> Self
    where
        F: Fn() -> Result<B, TransportError> + Send + Sync + 'static,
    {
        Self {
            dispatcher: Dispatcher::new(
                "NavigationHandler",
                Pacing::from(&config.pacing),
                config.shutdown.install_signal_hooks,
            ),
            navigation_timeout: Duration::from_secs(config.navigation.navigation_timeout_secs),
            opener: Arc::new(open),
        }
    }

    /// Opens the browser context and starts the scheduler; idempotent
    pub async fn configure(&self) -> DispatchResult<()> {
        let open = Arc::clone(&self.opener);
        self.dispatcher.configure_with(move || open()).await
    }

    /// Queues a navigation of `page` to `url`
    ///
    /// The returned handle resolves once the page has loaded, or to
    /// `TransportError::NavigationTimeout` if the load outlives the
    /// navigation timeout.
    ///
    /// # Errors
    ///
    /// * `DispatchError::NotConfigured` - configure() has not completed
    /// * `DispatchError::ShutDown` - shutdown() has started
    pub fn navigate<P>(&self, page: Arc<P>, url: &str) -> DispatchResult<ResultHandle<()>>
    where
        P: Page + ?Sized,
    {
        let limit = self.navigation_timeout;
        let url = url.to_string();

        self.dispatcher.submit(move |browser| async move {
            if browser.is_closed() {
                return Err(TransportError::Closed);
            }

            let outcome = timeout(limit, page.goto(&url)).await;
            match outcome {
                Ok(loaded) => loaded,
                Err(_) => Err(TransportError::NavigationTimeout { url, after: limit }),
            }
        })
    }

    /// Navigates `page` to `url` and waits for the load
    pub async fn goto<P>(&self, page: Arc<P>, url: &str) -> DispatchResult<()>
    where
        P: Page + ?Sized,
    {
        self.navigate(page, url)?.await
    }

    /// Stops the scheduler and closes the browser context; idempotent
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await
    }

    pub fn navigation_timeout(&self) -> Duration {
        self.navigation_timeout
    }

    /// The underlying dispatcher
    pub fn dispatcher(&self) -> &Dispatcher<B> {
        &self.dispatcher
    }

    pub fn is_configured(&self) -> bool {
        self.dispatcher.is_configured()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.dispatcher.is_shutting_down()
    }
}
