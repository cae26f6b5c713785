//! Binary resource cache: decoded images in memory, raw bytes on disk.

use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::coalesce::RequestCoalescer;
use super::key::{image_key, CacheKey, ImageKeyStrategy};
use super::layer::CacheLayer;
use super::memory::MemoryTier;
use crate::http::HttpClient;

type SharedImage = Option<Arc<DynamicImage>>;

/// Resolves image URLs through memory, then disk, then network.
///
/// Clones share the memory tier and the in-flight request table.
pub struct ImageCache<C> {
  layer: CacheLayer<C>,
  memory: Arc<MemoryTier<DynamicImage>>,
  coalescer: Option<Arc<RequestCoalescer<SharedImage>>>,
  strategy: ImageKeyStrategy,
}

impl<C: HttpClient> ImageCache<C> {
  pub fn new(layer: CacheLayer<C>) -> Self {
    Self {
      layer,
      memory: Arc::new(MemoryTier::new()),
      coalescer: Some(Arc::new(RequestCoalescer::new())),
      strategy: ImageKeyStrategy::default(),
    }
  }

  pub fn with_strategy(mut self, strategy: ImageKeyStrategy) -> Self {
    self.strategy = strategy;
    self
  }

  pub fn without_coalescing(mut self) -> Self {
    self.coalescer = None;
    self
  }

  /// Number of decoded images held in memory.
  #[cfg(test)]
  pub fn memory_len(&self) -> usize {
    self.memory.len()
  }

  /// Resolve `url` to a decoded image.
  ///
  /// Returns `None` for a malformed URL, a failed download, or a body that
  /// is not an image. Failures are logged, never surfaced.
  pub async fn resolve(&self, url: &str) -> Option<Arc<DynamicImage>> {
    let url = match Url::parse(url) {
      Ok(url) => url,
      Err(e) => {
        debug!(url, error = %e, "Not resolving malformed image URL");
        return None;
      }
    };
    let key = image_key(&url, self.strategy);

    if let Some(image) = self.memory.get(&key) {
      debug!(key = %key, "Image memory hit");
      return Some(image);
    }

    if let Some(image) = self.promote(&key) {
      return Some(image);
    }

    match &self.coalescer {
      Some(coalescer) => coalescer.run(&key, || self.download(&url, &key)).await,
      None => self.download(&url, &key).await,
    }
  }

  /// Decode the disk entry for `key` and lift it into memory.
  fn promote(&self, key: &CacheKey) -> Option<Arc<DynamicImage>> {
    let persisted = self.layer.load(key)?;
    match image::load_from_memory(&persisted.bytes) {
      Ok(image) => {
        debug!(key = %key, "Image promoted from disk");
        let image = Arc::new(image);
        self.memory.insert(key.clone(), image.clone());
        Some(image)
      }
      Err(e) => {
        debug!(key = %key, error = %e, "Disk entry is not an image, refetching");
        None
      }
    }
  }

  async fn download(&self, url: &Url, key: &CacheKey) -> SharedImage {
    let bytes = match self.layer.download(url).await {
      Ok(bytes) => bytes,
      Err(e) => {
        warn!(url = %url, error = %e, "Image download failed");
        return None;
      }
    };

    let image = match image::load_from_memory(&bytes) {
      Ok(image) => Arc::new(image),
      Err(e) => {
        warn!(url = %url, error = %e, "Downloaded body is not an image");
        return None;
      }
    };

    self.memory.insert(key.clone(), image.clone());
    self.layer.persist(key, &bytes);
    Some(image)
  }
}

impl<C> Clone for ImageCache<C> {
  fn clone(&self) -> Self {
    Self {
      layer: self.layer.clone(),
      memory: Arc::clone(&self.memory),
      coalescer: self.coalescer.clone(),
      strategy: self.strategy,
    }
  }
}
