//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available,
//! with no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Gallery browsing
  pub page_size_options: Vec<usize>,
  pub default_page_size: usize,

  // Caching
  pub cache_ttl_secs: u64,

  // Session
  pub profile_refresh_secs: u64,

  // Status line
  pub error_display_secs: u64,

  // Share links
  pub link_scheme: String,

  // YouTube
  pub watch_url_prefix: String,
  pub thumbnail_url_template: String,
}

impl Constants {
  pub fn cache_ttl(&self) -> Duration {
    Duration::from_secs(self.cache_ttl_secs)
  }

  pub fn profile_refresh_interval(&self) -> Duration {
    Duration::from_secs(self.profile_refresh_secs)
  }

  pub fn error_display(&self) -> Duration {
    Duration::from_secs(self.error_display_secs)
  }

  /// Whether `size` is one of the selectable page sizes.
  pub fn is_page_size(&self, size: usize) -> bool {
    self.page_size_options.contains(&size)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
