//! Logging setup.
//!
//! The TUI owns the terminal, so interactive sessions log to a file under the
//! platform data directory. One-shot commands log to stderr, leaving stdout
//! for their output. Both honor `RUST_LOG` and default to `info`.

use color_eyre::{eyre::eyre, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "itbooks.log";
const DEFAULT_FILTER: &str = "info";

/// Keeps the non-blocking file writer alive. Dropping it flushes the log.
pub struct LoggingGuard {
  _file_guard: Option<WorkerGuard>,
}

/// Default log directory: `$XDG_DATA_HOME/itbooks`.
pub fn default_log_dir() -> Result<PathBuf> {
  dirs::data_dir()
    .map(|p| p.join("itbooks"))
    .ok_or_else(|| eyre!("Could not determine data directory"))
}

/// Log to `<log_dir>/itbooks.log`, truncating the previous session's log.
pub fn init_file(log_dir: &Path) -> Result<LoggingGuard> {
  fs::create_dir_all(log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;
  fs::write(log_dir.join(LOG_FILE), "")
    .map_err(|e| eyre!("Failed to reset log file in {}: {}", log_dir.display(), e))?;

  let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
  let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

  let file_layer = tracing_subscriber::fmt::layer()
    .with_writer(non_blocking)
    .with_ansi(false);

  tracing_subscriber::registry()
    .with(env_filter())
    .with(file_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  Ok(LoggingGuard {
    _file_guard: Some(file_guard),
  })
}

/// Log to stderr.
pub fn init_stderr() -> Result<LoggingGuard> {
  let stderr_layer = tracing_subscriber::fmt::layer()
    .with_writer(io::stderr)
    .with_target(false);

  tracing_subscriber::registry()
    .with(env_filter())
    .with(stderr_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  Ok(LoggingGuard { _file_guard: None })
}

fn env_filter() -> EnvFilter {
  let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
  filter_or_default(directives.as_deref())
}

/// Unparseable directives fall back to the default level.
fn filter_or_default(directives: Option<&str>) -> EnvFilter {
  directives
    .and_then(|d| EnvFilter::try_new(d).ok())
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_log_dir_is_namespaced() {
    if let Ok(dir) = default_log_dir() {
      assert!(dir.ends_with("itbooks"));
    }
  }

  #[test]
  fn test_filter_defaults_to_info() {
    assert_eq!(filter_or_default(None).to_string(), "info");
    assert_eq!(filter_or_default(Some("itbooks=notalevel")).to_string(), "info");
  }

  #[test]
  fn test_filter_uses_given_directives() {
    assert_eq!(filter_or_default(Some("itbooks=debug")).to_string(), "itbooks=debug");
  }
}
