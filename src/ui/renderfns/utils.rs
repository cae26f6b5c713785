use chrono::{DateTime, Local, Utc};
use ratatui::prelude::Color;

use crate::cache::CacheSource;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Render the API's "0".."5" rating as stars
pub fn rating_stars(rating: &str) -> String {
  let filled = rating.trim().parse::<usize>().unwrap_or(0).min(5);
  format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

/// Short label telling the user where a record came from
pub fn source_label(source: CacheSource, cached_at: Option<DateTime<Utc>>) -> String {
  match (source, cached_at) {
    (CacheSource::Network, _) => "live".to_string(),
    (CacheSource::Disk, Some(at)) => format!(
      "offline copy from {}",
      at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    ),
    (CacheSource::Disk, None) => "offline copy".to_string(),
  }
}

pub fn source_color(source: CacheSource) -> Color {
  match source {
    CacheSource::Network => Color::Green,
    CacheSource::Disk => Color::Yellow,
  }
}
