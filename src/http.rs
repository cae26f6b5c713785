//! HTTP client abstraction for testability

use std::future::Future;
use std::time::Duration;

use tracing::{debug, trace, warn};
use url::Url;

use crate::config::HttpConfig;
use crate::error::TransportError;

/// Asynchronous HTTP GET, the only network operation the caches perform.
///
/// Implementations report every failure (connect, timeout, non-success
/// status, unreadable body) as a [`TransportError`].
pub trait HttpClient: Send + Sync + 'static {
  /// Performs a single HTTP GET and returns the full response body.
  fn get(&self, url: &Url) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

/// Real HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
  client: reqwest::Client,
  offline: bool,
}

impl ReqwestClient {
  /// Build a client with the configured timeout and user agent.
  pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(config.user_agent.clone())
      .build()
      .map_err(|e| TransportError::Request {
        url: String::new(),
        message: format!("failed to create HTTP client: {}", e),
      })?;

    Ok(Self {
      client,
      offline: false,
    })
  }

  /// Make every request fail without touching the network.
  ///
  /// The caches then serve whatever the disk tier already holds.
  pub fn offline(mut self) -> Self {
    self.offline = true;
    self
  }
}

impl HttpClient for ReqwestClient {
  async fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
    if self.offline {
      debug!(url = %url, "Offline mode, skipping request");
      return Err(TransportError::Request {
        url: url.to_string(),
        message: "offline mode".to_string(),
      });
    }

    trace!(url = %url, "HTTP GET request starting");

    let response = match self.client.get(url.clone()).send().await {
      Ok(resp) => {
        debug!(
          url = %url,
          status = resp.status().as_u16(),
          "HTTP response received"
        );
        resp
      }
      Err(e) => {
        warn!(
          url = %url,
          error = %e,
          is_connect = e.is_connect(),
          is_timeout = e.is_timeout(),
          "HTTP request failed"
        );
        return Err(TransportError::Request {
          url: url.to_string(),
          message: e.to_string(),
        });
      }
    };

    if !response.status().is_success() {
      warn!(url = %url, status = response.status().as_u16(), "HTTP error status");
      return Err(TransportError::Status {
        url: url.to_string(),
        status: response.status().as_u16(),
      });
    }

    match response.bytes().await {
      Ok(bytes) => {
        trace!(url = %url, bytes = bytes.len(), "HTTP response body read");
        Ok(bytes.to_vec())
      }
      Err(e) => {
        warn!(url = %url, error = %e, "Failed to read response body");
        Err(TransportError::Body {
          url: url.to_string(),
          message: e.to_string(),
        })
      }
    }
  }
}
