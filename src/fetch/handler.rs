//! Request handler
//!
//! Binds a [`Dispatcher`] to a [`Transport`]: every `fetch` becomes one job
//! on the dispatcher's queue, carrying a User-Agent drawn from the configured
//! pool.

use crate::config::Config;
use crate::dispatch::{Dispatcher, Pacing, ResultHandle};
use crate::fetch::{Body, HttpSession, ResponseShape, Transport};
use crate::{DispatchResult, TransportError};
use rand::seq::IndexedRandom;
use std::sync::{Arc, OnceLock};

type Opener<T> = Arc<dyn Fn() -> Result<T, TransportError> + Send + Sync>;

/// Paced HTTP GET dispatcher
///
/// Construct one explicitly and share it by cloning, or use the process-wide
/// instance from [`RequestHandler::global`].
pub struct RequestHandler<T: Transport = HttpSession> {
    dispatcher: Dispatcher<T>,
    user_agents: Arc<[String]>,
    opener: Opener<T>,
}

impl<T: Transport> Clone for RequestHandler<T> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            user_agents: Arc::clone(&self.user_agents),
            opener: Arc::clone(&self.opener),
        }
    }
}

impl<T: Transport> std::fmt::Debug for RequestHandler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandler")
            .field("dispatcher", &self.dispatcher)
            .field("user_agents", &self.user_agents.len())
            .finish()
    }
}

impl RequestHandler<HttpSession> {
    /// Creates an unconfigured handler backed by a `reqwest` session
    pub fn new(config: &Config) -> Self {
        let http = config.http.clone();
        Self::with_transport(config, move || HttpSession::new(&http))
    }

    /// Process-wide handler built from the default configuration
    ///
    /// Every thread and task receives the same instance.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<RequestHandler> = OnceLock::new();
        GLOBAL.get_or_init(|| RequestHandler::new(&Config::default()))
    }
}

impl<T: Transport> RequestHandler<T> {
    /// Creates an unconfigured handler whose transport is built by `open`
    ///
    /// `open` runs once, inside the first successful `configure()`.
    pub fn with_transport<F>(config: &Config, open: F) -> Self
    where
        F: Fn() -> Result<T, TransportError> + Send + Sync + 'static,
    {
        Self {
            dispatcher: Dispatcher::new(
                "RequestHandler",
                Pacing::from(&config.pacing),
                config.shutdown.install_signal_hooks,
            ),
            user_agents: config.http.user_agents.clone().into(),
            opener: Arc::new(open),
        }
    }

    /// Opens the transport and starts the scheduler; idempotent
    pub async fn configure(&self) -> DispatchResult<()> {
        let open = Arc::clone(&self.opener);
        self.dispatcher.configure_with(move || open()).await
    }

    /// Queues a GET of `url` and returns the handle of its body
    ///
    /// Never waits for the request itself; await the returned handle for the
    /// body or the transport error.
    ///
    /// # Errors
    ///
    /// * `DispatchError::NotConfigured` - configure() has not completed
    /// * `DispatchError::ShutDown` - shutdown() has started
    pub fn fetch(&self, url: &str, shape: ResponseShape) -> DispatchResult<ResultHandle<Body>> {
        let agent = self.user_agents.choose(&mut rand::rng()).cloned();
        let url = url.to_string();

        self.dispatcher.submit(move |transport| async move {
            transport.get(&url, agent.as_deref(), shape).await
        })
    }

    /// Fetches `url` and waits for its decoded text
    pub async fn fetch_text(&self, url: &str) -> DispatchResult<String> {
        Ok(self.fetch(url, ResponseShape::Text)?.await?.into_text())
    }

    /// Fetches `url` and waits for its raw bytes
    pub async fn fetch_bytes(&self, url: &str) -> DispatchResult<Vec<u8>> {
        Ok(self.fetch(url, ResponseShape::Raw)?.await?.into_bytes())
    }

    /// Stops the scheduler and closes the transport; idempotent
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await
    }

    /// User-Agent pool requests draw from
    pub fn user_agents(&self) -> &[String] {
        &self.user_agents
    }

    /// The underlying dispatcher
    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    pub fn is_configured(&self) -> bool {
        self.dispatcher.is_configured()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.dispatcher.is_shutting_down()
    }
}
