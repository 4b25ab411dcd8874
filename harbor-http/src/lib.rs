//! HARBOR HTTP - Network Transport
//!
//! [`HttpTransport`] implements the cache's [`Transport`] trait with a pooled
//! reqwest client. The per-fetch timeout comes from the cache config, so one
//! client serves caches with different timeouts.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use harbor_core::{ConfigError, HarborResult, HttpConfig, Transport, TransportError};
use reqwest::Client;

/// HTTP(S) GET transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    user_agent: String,
}

impl HttpTransport {
    /// Build a transport from validated HTTP settings.
    pub fn new(config: &HttpConfig) -> HarborResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "http".to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

/// Map a reqwest failure to the transport taxonomy.
fn classify(url: &str, timeout: Duration, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else {
        TransportError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Bytes, TransportError> {
        tracing::debug!(url, ?timeout, "Fetching asset");

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let payload = response
            .bytes()
            .await
            .map_err(|e| classify(url, timeout, e))?;
        tracing::trace!(url, bytes = payload.len(), "Fetched asset");
        Ok(payload)
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
