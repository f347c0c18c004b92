#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Immutable settings a cache is built with.
///
/// Both options are resolved once, when the cache is built, and never change
/// for the lifetime of that cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "snake_case"))]
pub struct CacheConfiguration {
  /// When `true`, keys and values are stored as isolated serialized copies.
  /// When `false`, the cache shares the `Arc` it was given.
  pub store_by_value: bool,
  /// When `true`, puts, removals, hits and misses are counted.
  pub statistics_enabled: bool,
}

impl Default for CacheConfiguration {
  fn default() -> Self {
    Self {
      store_by_value: true,
      statistics_enabled: false,
    }
  }
}

impl CacheConfiguration {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn store_by_value(mut self, enabled: bool) -> Self {
    self.store_by_value = enabled;
    self
  }

  pub fn statistics_enabled(mut self, enabled: bool) -> Self {
    self.statistics_enabled = enabled;
    self
  }

  #[inline]
  pub fn is_store_by_value(&self) -> bool {
    self.store_by_value
  }

  #[inline]
  pub fn is_statistics_enabled(&self) -> bool {
    self.statistics_enabled
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_store_by_value_without_statistics() {
    let config = CacheConfiguration::default();
    assert!(config.is_store_by_value());
    assert!(!config.is_statistics_enabled());

    let config = config.store_by_value(false).statistics_enabled(true);
    assert!(!config.is_store_by_value());
    assert!(config.is_statistics_enabled());
  }
}
