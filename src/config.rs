use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::ImageKeyStrategy;

const DEFAULT_API_URL: &str = "https://api.itbook.store/1.0/";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub http: HttpConfig,
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// Base URL the endpoint paths (`new`, `books/{isbn13}`) are joined onto
  pub base_url: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_API_URL.to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
  pub timeout_secs: u64,
  pub user_agent: String,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      timeout_secs: 30,
      user_agent: concat!("itbooks/", env!("CARGO_PKG_VERSION")).to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Disable to skip the disk tier entirely (memory tier still applies)
  pub enabled: bool,
  /// Root directory for cached files (default: $XDG_CACHE_HOME/itbooks)
  pub directory: Option<PathBuf>,
  /// How image URLs map to cache file names
  pub image_key: ImageKeyStrategy,
  /// Share one network request among concurrent requests for the same key
  pub coalesce_requests: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      directory: None,
      image_key: ImageKeyStrategy::default(),
      coalesce_requests: true,
    }
  }
}

impl CacheConfig {
  /// Resolve the cache root directory.
  ///
  /// `ITBOOKS_CACHE_DIR` wins over the configured directory, which wins over
  /// the platform cache directory.
  pub fn root(&self) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("ITBOOKS_CACHE_DIR") {
      return Ok(PathBuf::from(dir));
    }

    if let Some(dir) = &self.directory {
      return Ok(dir.clone());
    }

    dirs::cache_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
      .map(|p| p.join("itbooks"))
      .ok_or_else(|| eyre!("Could not determine cache directory"))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./itbooks.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/itbooks/config.yaml
  ///
  /// Falls back to built-in defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("itbooks.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("itbooks").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty file deserializes to null, which means "all defaults"
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.api.base_url, DEFAULT_API_URL);
    assert_eq!(config.http.timeout_secs, 30);
    assert!(config.cache.enabled);
    assert!(config.cache.coalesce_requests);
    assert_eq!(config.cache.image_key, ImageKeyStrategy::LastSegment);
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let config = Config::parse(
      r#"
cache:
  image_key: url_hash
  directory: /tmp/itbooks-test
"#,
    )
    .unwrap();

    assert_eq!(config.cache.image_key, ImageKeyStrategy::UrlHash);
    assert_eq!(
      config.cache.directory.as_deref(),
      Some(Path::new("/tmp/itbooks-test"))
    );
    assert!(config.cache.enabled);
    assert_eq!(config.api.base_url, DEFAULT_API_URL);
  }

  #[test]
  fn test_empty_file_is_default() {
    let config = Config::parse("  \n").unwrap();
    assert_eq!(config.http.timeout_secs, 30);
  }

  #[test]
  fn test_unknown_strategy_is_rejected() {
    assert!(Config::parse("cache:\n  image_key: md5\n").is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    let result = Config::load(Some(Path::new("/nonexistent/itbooks.yaml")));
    assert!(result.is_err());
  }

  #[test]
  fn test_load_from_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "http:\n  timeout_secs: 5\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.http.timeout_secs, 5);
  }
}
