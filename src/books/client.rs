use image::DynamicImage;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::api_types::{BookDetail, BookListResponse};
use crate::cache::{CacheResult, Caches};
use crate::error::FetchError;
use crate::http::{HttpClient, ReqwestClient};

/// IT Bookstore API client backed by the fetch cache.
///
/// Records go through the network first and fall back to their last
/// persisted copy; covers come from memory or disk when possible.
pub struct BookStoreClient<C = ReqwestClient> {
  base_url: Url,
  caches: Caches<C>,
}

impl<C: HttpClient> BookStoreClient<C> {
  pub fn new(base_url: &str, caches: Caches<C>) -> Result<Self, FetchError> {
    // Without a trailing slash `join` would replace the last path segment
    let normalized = if base_url.ends_with('/') {
      base_url.to_string()
    } else {
      format!("{}/", base_url)
    };
    let base_url =
      Url::parse(&normalized).map_err(|_| FetchError::InvalidUrl(base_url.to_string()))?;

    Ok(Self { base_url, caches })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Newly released books.
  pub async fn new_books(&self) -> Result<CacheResult<BookListResponse>, FetchError> {
    let url = self.endpoint("new")?;
    self.caches.records.fetch(url.as_str()).await
  }

  /// Full record for one book.
  pub async fn book_detail(&self, isbn13: &str) -> Result<CacheResult<BookDetail>, FetchError> {
    let url = self.endpoint(&format!("books/{}", urlencoding::encode(isbn13)))?;
    self.caches.records.fetch(url.as_str()).await
  }

  /// Cover image for a book, `None` when it cannot be obtained.
  pub async fn cover(&self, image_url: &str) -> Option<Arc<DynamicImage>> {
    self.caches.images.resolve(image_url).await
  }

  fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
    let url = self
      .base_url
      .join(path)
      .map_err(|_| FetchError::InvalidUrl(path.to_string()))?;
    debug!(url = %url, "Resolved endpoint");
    Ok(url)
  }
}

impl<C> Clone for BookStoreClient<C> {
  fn clone(&self) -> Self {
    Self {
      base_url: self.base_url.clone(),
      caches: self.caches.clone(),
    }
  }
}
