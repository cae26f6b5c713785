//! Structured resource cache: JSON records with offline fallback.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::coalesce::RequestCoalescer;
use super::key::{record_key, CacheKey};
use super::layer::CacheLayer;
use super::traits::{CacheResult, CacheSource};
use crate::error::{FetchError, TransportError};
use crate::http::HttpClient;

type SharedBytes = Result<Arc<Vec<u8>>, TransportError>;

/// Fetches JSON records network-first, persisting every response and falling
/// back to the last persisted copy when the network or decoding fails.
///
/// There is no memory tier: every call goes to the network once.
pub struct RecordCache<C> {
  layer: CacheLayer<C>,
  coalescer: Option<Arc<RequestCoalescer<SharedBytes>>>,
}

impl<C: HttpClient> RecordCache<C> {
  pub fn new(layer: CacheLayer<C>) -> Self {
    Self {
      layer,
      coalescer: Some(Arc::new(RequestCoalescer::new())),
    }
  }

  /// Give every caller its own network request, even for identical URLs.
  pub fn without_coalescing(mut self) -> Self {
    self.coalescer = None;
    self
  }

  /// Fetch `url` and decode it as `T`.
  ///
  /// 1. Malformed URL → `InvalidUrl`, nothing else attempted
  /// 2. GET; on success persist the raw body, then decode
  /// 3. On transport or decode failure, decode the persisted body instead
  /// 4. Nothing usable → the transport error, or `RequestFailed`
  pub async fn fetch<T>(&self, url: &str) -> Result<CacheResult<T>, FetchError>
  where
    T: DeserializeOwned,
  {
    let url = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    let key = record_key(&url);

    let transport_error = match self.download(&url, &key).await {
      Ok(bytes) => match serde_json::from_slice::<T>(&bytes) {
        Ok(data) => {
          debug!(url = %url, source = ?CacheSource::Network, "Record served");
          return Ok(CacheResult::from_network(data));
        }
        Err(e) => {
          warn!(url = %url, error = %e, "Response did not decode, trying cached copy");
          None
        }
      },
      Err(e) => Some(e),
    };

    if let Some(persisted) = self.layer.load(&key) {
      match serde_json::from_slice::<T>(&persisted.bytes) {
        Ok(data) => {
          info!(url = %url, "Loaded from local cache (offline mode)");
          return Ok(CacheResult::from_disk(data, persisted.cached_at));
        }
        Err(e) => debug!(url = %url, error = %e, "Cached copy did not decode"),
      }
    }

    Err(match transport_error {
      Some(e) => FetchError::Transport(e),
      None => FetchError::RequestFailed,
    })
  }

  /// GET `url` and persist the body under `key`, sharing the request with
  /// concurrent callers for the same key when coalescing is on.
  async fn download(&self, url: &Url, key: &CacheKey) -> SharedBytes {
    let work = || async {
      let bytes = self.layer.download(url).await?;
      self.layer.persist(key, &bytes);
      SharedBytes::Ok(Arc::new(bytes))
    };

    match &self.coalescer {
      Some(coalescer) => coalescer.run(key, work).await,
      None => work().await,
    }
  }
}

impl<C> Clone for RecordCache<C> {
  fn clone(&self) -> Self {
    Self {
      layer: self.layer.clone(),
      coalescer: self.coalescer.clone(),
    }
  }
}
