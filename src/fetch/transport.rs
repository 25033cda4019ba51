//! HTTP transport
//!
//! [`Transport`] is the seam between the request handler and the network.
//! [`HttpSession`] is the production implementation; tests substitute stubs.

use crate::config::HttpConfig;
use crate::dispatch::PooledResource;
use crate::fetch::{Body, ResponseShape};
use crate::TransportError;
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// Performs a single GET request
#[async_trait]
pub trait Transport: PooledResource {
    /// Fetches `url`, sending `user_agent` as the User-Agent header if given
    async fn get(
        &self,
        url: &str,
        user_agent: Option<&str>,
        shape: ResponseShape,
    ) -> Result<Body, TransportError>;
}

/// Pooled HTTP session shared by every job of a request handler
///
/// Non-success status codes are not errors; the body is returned as-is.
#[derive(Debug)]
pub struct HttpSession {
    client: Client,
    closed: AtomicBool,
}

impl HttpSession {
    /// Builds a session with the configured timeouts and compression support
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Http` if the TLS backend cannot be initialized
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self::from_client(client))
    }

    /// Wraps an already built client
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PooledResource for HttpSession {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Idle connections are released when the last clone of the client drops
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpSession {
    async fn get(
        &self,
        url: &str,
        user_agent: Option<&str>,
        shape: ResponseShape,
    ) -> Result<Body, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut request = self.client.get(url);
        if let Some(agent) = user_agent {
            request = request.header(USER_AGENT, agent);
        }

        let response = request.send().await?;
        debug!(url = %url, status = response.status().as_u16(), "Response received");

        let body = match shape {
            ResponseShape::Text => Body::Text(response.text().await?),
            ResponseShape::Raw => Body::Raw(response.bytes().await?.to_vec()),
        };

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> HttpSession {
        HttpSession::new(&HttpConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_get_text_sends_user_agent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/table"))
            .and(header("user-agent", "TestAgent/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<table></table>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let body = session()
            .get(
                &format!("{}/table", mock_server.uri()),
                Some("TestAgent/1.0"),
                ResponseShape::Text,
            )
            .await
            .unwrap();

        assert_eq!(body, Body::Text("<table></table>".to_string()));
    }

    #[tokio::test]
    async fn test_get_raw_keeps_bytes() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, 0x50, 0x4e, 0x47]))
            .mount(&mock_server)
            .await;

        let body = session()
            .get(
                &format!("{}/logo.png", mock_server.uri()),
                None,
                ResponseShape::Raw,
            )
            .await
            .unwrap();

        assert_eq!(body, Body::Raw(vec![0x89, 0x50, 0x4e, 0x47]));
    }

    #[tokio::test]
    async fn test_error_status_still_returns_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
            .mount(&mock_server)
            .await;

        let body = session()
            .get(
                &format!("{}/missing", mock_server.uri()),
                None,
                ResponseShape::Text,
            )
            .await
            .unwrap();

        assert_eq!(body.into_text(), "not here");
    }

    #[tokio::test]
    async fn test_closed_session_rejects_requests() {
        let session = session();
        session.close().await.unwrap();
        assert!(session.is_closed());

        let result = session
            .get("http://127.0.0.1:9/", None, ResponseShape::Text)
            .await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_http_error() {
        let result = session()
            .get("http://127.0.0.1:9/", None, ResponseShape::Text)
            .await;
        assert!(matches!(result, Err(TransportError::Http(_))));
    }
}
