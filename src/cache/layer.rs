//! Cache layer that pairs the network client with the disk tier.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::key::CacheKey;
use super::store::ByteStore;
use crate::error::TransportError;
use crate::http::HttpClient;

/// Bytes read back from the disk tier.
pub struct Persisted {
  pub bytes: Vec<u8>,
  pub cached_at: Option<DateTime<Utc>>,
}

/// The network step and disk tier shared by both pipelines.
///
/// This layer sits between the pipelines and the outside world: it issues
/// the single GET per fetch, writes bodies through to the store, and reads
/// them back for promotion or offline fallback.
pub struct CacheLayer<C> {
  client: Arc<C>,
  store: Arc<dyn ByteStore>,
}

impl<C: HttpClient> CacheLayer<C> {
  pub fn new(client: Arc<C>, store: Arc<dyn ByteStore>) -> Self {
    Self { client, store }
  }

  /// Issue one GET for `url`.
  pub async fn download(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
    self.client.get(url).await
  }

  /// Write `bytes` under `key`, ignoring failure.
  ///
  /// Persistence is best-effort: a full disk or read-only cache directory
  /// must not fail a fetch that already has its data.
  pub fn persist(&self, key: &CacheKey, bytes: &[u8]) {
    if let Err(e) = self.store.write(key, bytes) {
      warn!(key = %key, error = %e, "Failed to persist cache entry");
    }
  }

  /// Read the persisted entry for `key`, if there is a readable one.
  pub fn load(&self, key: &CacheKey) -> Option<Persisted> {
    if !self.store.exists(key) {
      return None;
    }

    match self.store.read(key) {
      Ok(bytes) => Some(Persisted {
        cached_at: self.store.modified(key),
        bytes,
      }),
      Err(e) => {
        debug!(key = %key, error = %e, "Cache entry unreadable");
        None
      }
    }
  }
}

impl<C> Clone for CacheLayer<C> {
  fn clone(&self) -> Self {
    Self {
      client: Arc::clone(&self.client),
      store: Arc::clone(&self.store),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::key::record_key;
  use crate::cache::store::{DiskStore, NoopStore};
  use crate::http::mock::MockHttpClient;
  use tempfile::TempDir;

  const URL: &str = "https://api.itbook.store/1.0/new";

  #[tokio::test]
  async fn test_download_then_persist_and_load() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(DiskStore::open(temp_dir.path()).unwrap());
    let client = Arc::new(MockHttpClient::new().with_response(URL, "{}"));
    let layer = CacheLayer::new(client.clone(), store);

    let url = Url::parse(URL).unwrap();
    let key = record_key(&url);
    assert!(layer.load(&key).is_none());

    let bytes = layer.download(&url).await.unwrap();
    layer.persist(&key, &bytes);

    let persisted = layer.load(&key).unwrap();
    assert_eq!(persisted.bytes, b"{}");
    assert!(persisted.cached_at.is_some());
    assert_eq!(client.calls(), 1);
  }

  #[test]
  fn test_persist_failure_is_swallowed() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("records");
    let store = Arc::new(DiskStore::open(&root).unwrap());
    let layer = CacheLayer::new(Arc::new(MockHttpClient::new()), store);

    // Pull the directory out from under the store
    std::fs::remove_dir_all(&root).unwrap();

    let key = record_key(&Url::parse(URL).unwrap());
    layer.persist(&key, b"{}");
    assert!(layer.load(&key).is_none());
  }

  #[test]
  fn test_noop_store_never_loads() {
    let layer = CacheLayer::new(Arc::new(MockHttpClient::new()), Arc::new(NoopStore));
    let key = record_key(&Url::parse(URL).unwrap());
    layer.persist(&key, b"{}");
    assert!(layer.load(&key).is_none());
  }
}
