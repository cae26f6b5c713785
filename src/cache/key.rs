//! Cache key derivation.
//!
//! Keys double as file names in the disk tier, so every derivation here
//! produces a single path component with no separators and no `.`/`..`.

use std::fmt;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

/// Key used when percent-encoding produces nothing usable.
pub const FALLBACK_KEY: &str = "temp";

/// Longest file name most filesystems accept.
const MAX_KEY_LEN: usize = 255;

/// A filesystem-safe string under which an entry is stored in a tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
  pub fn as_str(&self) -> &str {
    &self.0
  }

  #[cfg(test)]
  pub(crate) fn raw(name: &str) -> Self {
    Self(name.to_string())
  }

  /// Whether `name` can be used as a single file name.
  pub fn is_safe(name: &str) -> bool {
    !name.is_empty()
      && name != "."
      && name != ".."
      && name.len() <= MAX_KEY_LEN
      && !name.contains(['/', '\\', '\0'])
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl AsRef<str> for CacheKey {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

/// How image URLs are mapped to cache keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKeyStrategy {
  /// Last path segment of the URL (`.../covers/9781617294136.png` →
  /// `9781617294136.png`). Two URLs sharing a file name share an entry.
  #[default]
  LastSegment,
  /// SHA-256 of the whole URL, keeping the file extension. Collision-free,
  /// but incompatible with caches written using `LastSegment`.
  UrlHash,
}

/// Derive the image key for `url`.
///
/// `LastSegment` falls back to the hash key when the URL has no usable last
/// segment (e.g. `https://host/`).
pub fn image_key(url: &Url, strategy: ImageKeyStrategy) -> CacheKey {
  match strategy {
    ImageKeyStrategy::LastSegment => {
      last_segment(url).map(CacheKey).unwrap_or_else(|| hashed_key(url))
    }
    ImageKeyStrategy::UrlHash => hashed_key(url),
  }
}

/// Derive the record key for `url`: the absolute URL, percent-encoded.
///
/// URLs too long to be a file name once encoded are hashed instead.
pub fn record_key(url: &Url) -> CacheKey {
  let encoded = urlencoding::encode(url.as_str());

  if encoded.is_empty() {
    return CacheKey(FALLBACK_KEY.to_string());
  }
  if !CacheKey::is_safe(&encoded) {
    return hashed_key(url);
  }
  CacheKey(encoded.into_owned())
}

fn last_segment(url: &Url) -> Option<String> {
  let segment = url.path_segments()?.next_back()?;
  CacheKey::is_safe(segment).then(|| segment.to_string())
}

fn hashed_key(url: &Url) -> CacheKey {
  let mut hasher = Sha256::new();
  hasher.update(url.as_str().as_bytes());
  let digest = hex::encode(hasher.finalize());

  let extension = last_segment(url).and_then(|segment| {
    let (_, ext) = segment.rsplit_once('.')?;
    let is_plain = !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    is_plain.then(|| ext.to_ascii_lowercase())
  });

  match extension {
    Some(ext) => CacheKey(format!("{}.{}", digest, ext)),
    None => CacheKey(digest),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
  }

  #[test]
  fn test_image_key_is_last_segment() {
    let key = image_key(
      &url("https://itbook.store/img/books/9781617294136.png"),
      ImageKeyStrategy::LastSegment,
    );
    assert_eq!(key.as_str(), "9781617294136.png");
  }

  #[test]
  fn test_image_key_collides_on_shared_file_name() {
    let a = image_key(&url("https://a.example/x/cover.png"), ImageKeyStrategy::LastSegment);
    let b = image_key(&url("https://b.example/y/cover.png"), ImageKeyStrategy::LastSegment);
    assert_eq!(a, b);

    let a = image_key(&url("https://a.example/x/cover.png"), ImageKeyStrategy::UrlHash);
    let b = image_key(&url("https://b.example/y/cover.png"), ImageKeyStrategy::UrlHash);
    assert_ne!(a, b);
  }

  #[test]
  fn test_url_hash_keeps_extension() {
    let key = image_key(&url("https://a.example/x/Cover.PNG"), ImageKeyStrategy::UrlHash);
    assert!(key.as_str().ends_with(".png"));
    assert_eq!(key.as_str().len(), 64 + 4);
  }

  #[test]
  fn test_image_key_without_segment_falls_back_to_hash() {
    let key = image_key(&url("https://a.example/"), ImageKeyStrategy::LastSegment);
    assert_eq!(key.as_str().len(), 64);
    assert!(CacheKey::is_safe(key.as_str()));
  }

  #[test]
  fn test_image_key_never_traverses() {
    // The URL parser resolves dot segments before we ever see them
    let key = image_key(&url("https://a.example/covers/.."), ImageKeyStrategy::LastSegment);
    assert!(CacheKey::is_safe(key.as_str()));
    assert_ne!(key.as_str(), "..");
  }

  #[test]
  fn test_record_key_is_deterministic_and_safe() {
    let a = record_key(&url("https://api.itbook.store/1.0/books/9781617294136"));
    let b = record_key(&url("https://api.itbook.store/1.0/books/9781617294136"));
    assert_eq!(a, b);
    assert_eq!(
      a.as_str(),
      "https%3A%2F%2Fapi.itbook.store%2F1.0%2Fbooks%2F9781617294136"
    );
    assert!(CacheKey::is_safe(a.as_str()));
  }

  #[test]
  fn test_record_key_distinguishes_urls() {
    let a = record_key(&url("https://api.itbook.store/1.0/books/1"));
    let b = record_key(&url("https://api.itbook.store/1.0/books/2"));
    let c = record_key(&url("https://api.itbook.store/1.0/books/1?page=2"));
    assert_ne!(a, b);
    assert_ne!(a, c);
  }

  #[test]
  fn test_overlong_record_key_is_hashed() {
    let long = format!("https://api.itbook.store/1.0/search/{}", "x".repeat(400));
    let key = record_key(&url(&long));
    assert!(CacheKey::is_safe(key.as_str()));
    assert_eq!(key.as_str().len(), 64);
  }

  #[test]
  fn test_is_safe() {
    assert!(CacheKey::is_safe("cover.png"));
    assert!(!CacheKey::is_safe(""));
    assert!(!CacheKey::is_safe("."));
    assert!(!CacheKey::is_safe(".."));
    assert!(!CacheKey::is_safe("a/b"));
    assert!(!CacheKey::is_safe("a\\b"));
  }
}
