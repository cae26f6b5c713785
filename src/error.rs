//! Error types for the fetch-cache pipelines.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single network attempt.
///
/// Cloneable so that one failed request can be handed to every coalesced
/// waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
  /// The request could not be sent or no response arrived (connect, timeout, ...)
  #[error("request to {url} failed: {message}")]
  Request { url: String, message: String },

  /// The server answered with a non-success status
  #[error("HTTP {status} from {url}")]
  Status { url: String, status: u16 },

  /// The response body could not be read
  #[error("failed to read response from {url}: {message}")]
  Body { url: String, message: String },
}

/// Irrecoverable outcome of a structured fetch.
///
/// Decoding failures never appear here: they trigger the disk fallback and,
/// if that fails too, are reported as `RequestFailed`.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
  #[error("invalid URL: {0:?}")]
  InvalidUrl(String),

  #[error("request failed and no usable cached copy exists")]
  RequestFailed,

  #[error(transparent)]
  Transport(#[from] TransportError),
}

/// Failure of a byte store operation.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("cache I/O error at {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("cache key {0:?} is not a valid file name")]
  InvalidKey(String),
}

impl StoreError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }
}
