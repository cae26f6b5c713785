//! Byte store trait and on-disk implementation.

use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

use super::key::CacheKey;
use crate::error::StoreError;

/// Trait for durable byte storage backends (the disk tier).
///
/// Entries are opaque byte blobs addressed by [`CacheKey`]. Nothing is ever
/// deleted through this interface.
pub trait ByteStore: Send + Sync {
  /// Whether an entry exists for `key`.
  fn exists(&self, key: &CacheKey) -> bool;

  /// Read the full entry for `key`.
  fn read(&self, key: &CacheKey) -> Result<Vec<u8>, StoreError>;

  /// Replace the entry for `key` with `bytes`.
  ///
  /// Concurrent writers to the same key leave exactly one of their payloads
  /// in place (last write wins), never a mix of both.
  fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), StoreError>;

  /// When the entry for `key` was last written, if known.
  fn modified(&self, _key: &CacheKey) -> Option<DateTime<Utc>> {
    None
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStore;

impl ByteStore for NoopStore {
  fn exists(&self, _key: &CacheKey) -> bool {
    false // Always miss
  }

  fn read(&self, key: &CacheKey) -> Result<Vec<u8>, StoreError> {
    Err(StoreError::io(
      key.as_str(),
      std::io::Error::from(ErrorKind::NotFound),
    ))
  }

  fn write(&self, _key: &CacheKey, _bytes: &[u8]) -> Result<(), StoreError> {
    Ok(()) // Discard
  }
}

/// One file per key under a root directory.
///
/// ```text
/// {root}/{key}
/// ```
pub struct DiskStore {
  root: PathBuf,
}

impl DiskStore {
  /// Open a store rooted at `root`, creating the directory if needed.
  pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
    let root = root.into();
    fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
    info!(dir = %root.display(), "Disk cache opened");
    Ok(Self { root })
  }

  #[cfg(test)]
  pub fn root(&self) -> &std::path::Path {
    &self.root
  }

  /// Full path of the entry for `key`.
  pub fn path(&self, key: &CacheKey) -> Result<PathBuf, StoreError> {
    if !CacheKey::is_safe(key.as_str()) {
      return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(self.root.join(key.as_str()))
  }
}

impl ByteStore for DiskStore {
  fn exists(&self, key: &CacheKey) -> bool {
    self.path(key).map(|p| p.is_file()).unwrap_or(false)
  }

  fn read(&self, key: &CacheKey) -> Result<Vec<u8>, StoreError> {
    let path = self.path(key)?;
    fs::read(&path).map_err(|e| StoreError::io(path, e))
  }

  fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), StoreError> {
    let path = self.path(key)?;

    // Unique temp name per writer, then rename over the target
    let temp_path = self
      .root
      .join(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));

    if let Err(e) = fs::write(&temp_path, bytes) {
      let _ = fs::remove_file(&temp_path);
      return Err(StoreError::io(temp_path, e));
    }
    if let Err(e) = fs::rename(&temp_path, &path) {
      let _ = fs::remove_file(&temp_path);
      return Err(StoreError::io(path, e));
    }

    debug!(key = %key, bytes = bytes.len(), "Wrote cache entry");
    Ok(())
  }

  fn modified(&self, key: &CacheKey) -> Option<DateTime<Utc>> {
    let path = self.path(key).ok()?;
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn key(s: &str) -> CacheKey {
    super::super::key::record_key(&url::Url::parse(s).unwrap())
  }

  fn create_test_store() -> (DiskStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = DiskStore::open(temp_dir.path().join("records")).unwrap();
    (store, temp_dir)
  }

  #[test]
  fn test_open_creates_directory() {
    let (store, _temp_dir) = create_test_store();
    assert!(store.root().is_dir());
  }

  #[test]
  fn test_read_missing_is_error() {
    let (store, _temp_dir) = create_test_store();
    let k = key("https://example.com/missing");
    assert!(!store.exists(&k));
    assert!(matches!(store.read(&k), Err(StoreError::Io { .. })));
    assert!(store.modified(&k).is_none());
  }

  #[test]
  fn test_write_then_read() {
    let (store, _temp_dir) = create_test_store();
    let k = key("https://example.com/1.0/new");

    store.write(&k, b"hello").unwrap();

    assert!(store.exists(&k));
    assert_eq!(store.read(&k).unwrap(), b"hello");
    assert!(store.modified(&k).is_some());
  }

  #[test]
  fn test_write_replaces_and_leaves_no_temp_files() {
    let (store, _temp_dir) = create_test_store();
    let k = key("https://example.com/1.0/new");

    store.write(&k, b"first").unwrap();
    store.write(&k, b"second").unwrap();

    assert_eq!(store.read(&k).unwrap(), b"second");
    let names: Vec<_> = fs::read_dir(store.root())
      .unwrap()
      .map(|e| e.unwrap().file_name())
      .collect();
    assert_eq!(names.len(), 1);
  }

  #[test]
  fn test_concurrent_writes_last_one_wins_whole() {
    let (store, _temp_dir) = create_test_store();
    let store = std::sync::Arc::new(store);
    let k = key("https://example.com/cover.png");

    let handles: Vec<_> = (0..8u8)
      .map(|i| {
        let store = store.clone();
        let k = k.clone();
        std::thread::spawn(move || store.write(&k, &vec![i; 64 * 1024]).unwrap())
      })
      .collect();
    for h in handles {
      h.join().unwrap();
    }

    let bytes = store.read(&k).unwrap();
    assert_eq!(bytes.len(), 64 * 1024);
    assert!(bytes.iter().all(|b| *b == bytes[0]));
    assert_eq!(fs::read_dir(store.root()).unwrap().count(), 1);
  }

  #[test]
  fn test_rejects_unsafe_keys() {
    let (store, _temp_dir) = create_test_store();
    let bad = CacheKey::raw("../escape");
    assert!(matches!(store.write(&bad, b"x"), Err(StoreError::InvalidKey(_))));
    assert!(!store.exists(&bad));
  }

  #[test]
  fn test_noop_store_discards() {
    let store = NoopStore;
    let k = key("https://example.com/1.0/new");
    store.write(&k, b"hello").unwrap();
    assert!(!store.exists(&k));
    assert!(store.read(&k).is_err());
  }
}
