//! Two-tier fetch cache for remote resources.
//!
//! Two pipelines share one HTTP client and one cache root:
//! - [`ImageCache`]: memory tier of decoded images over a disk tier of raw
//!   bytes (`<root>/images`), network last
//! - [`RecordCache`]: network first, raw JSON persisted to `<root>/records`,
//!   disk copy served when the network or decoding fails
//!
//! Disk entries are never deleted here. Every successful download
//! overwrites the entry for its key atomically.

mod coalesce;
mod images;
mod key;
mod layer;
mod memory;
mod records;
mod store;
mod traits;

pub use images::ImageCache;
pub use key::ImageKeyStrategy;
pub use layer::CacheLayer;
pub use records::RecordCache;
pub use store::{ByteStore, DiskStore, NoopStore};
pub use traits::{CacheResult, CacheSource};

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::CacheConfig;
use crate::error::StoreError;
use crate::http::HttpClient;

/// Both pipelines, built from one client and one configuration.
pub struct Caches<C> {
  pub images: ImageCache<C>,
  pub records: RecordCache<C>,
}

impl<C: HttpClient> Caches<C> {
  /// Open the disk tiers under `root` and wire both pipelines to `client`.
  ///
  /// With the cache disabled nothing is written and nothing is read back;
  /// images still get the memory tier.
  pub fn open(client: Arc<C>, config: &CacheConfig, root: &Path) -> Result<Self, StoreError> {
    let (image_store, record_store): (Arc<dyn ByteStore>, Arc<dyn ByteStore>) = if config.enabled {
      (
        Arc::new(DiskStore::open(root.join("images"))?),
        Arc::new(DiskStore::open(root.join("records"))?),
      )
    } else {
      info!("Disk cache disabled");
      (Arc::new(NoopStore), Arc::new(NoopStore))
    };

    let mut images =
      ImageCache::new(CacheLayer::new(client.clone(), image_store)).with_strategy(config.image_key);
    let mut records = RecordCache::new(CacheLayer::new(client, record_store));

    if !config.coalesce_requests {
      images = images.without_coalescing();
      records = records.without_coalescing();
    }

    Ok(Self { images, records })
  }
}

impl<C> Clone for Caches<C> {
  fn clone(&self) -> Self {
    Self {
      images: self.images.clone(),
      records: self.records.clone(),
    }
  }
}
