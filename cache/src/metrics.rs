use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

/// Thread-safe running counters for a cache whose configuration enables
/// statistics. All counters are atomic and only ever move by a delta.
#[derive(Debug)]
pub(crate) struct Counters {
  puts: CachePadded<AtomicU64>,
  removals: CachePadded<AtomicU64>,
  hits: CachePadded<AtomicU64>,
  misses: CachePadded<AtomicU64>,

  cache_name: Arc<str>,
  cache_manager_name: RwLock<Arc<str>>,
  created_at: Instant,
}

impl Counters {
  fn new(cache_name: Arc<str>, cache_manager_name: Arc<str>) -> Self {
    Self {
      puts: CachePadded::new(AtomicU64::new(0)),
      removals: CachePadded::new(AtomicU64::new(0)),
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      cache_name,
      cache_manager_name: RwLock::new(cache_manager_name),
      created_at: Instant::now(),
    }
  }
}

/// The statistics of one cache.
///
/// When the configuration disables statistics this is the zero-sized
/// `Disabled` placeholder and every increment is a no-op.
#[derive(Debug)]
pub(crate) enum Statistics {
  Enabled(Box<Counters>),
  Disabled,
}

impl Statistics {
  pub(crate) fn new(enabled: bool, cache_name: Arc<str>, cache_manager_name: Arc<str>) -> Self {
    if enabled {
      Statistics::Enabled(Box::new(Counters::new(cache_name, cache_manager_name)))
    } else {
      Statistics::Disabled
    }
  }

  #[inline]
  pub(crate) fn is_enabled(&self) -> bool {
    matches!(self, Statistics::Enabled(_))
  }

  #[inline]
  pub(crate) fn increase_puts(&self, delta: u64) {
    if let Statistics::Enabled(c) = self {
      c.puts.fetch_add(delta, Ordering::Relaxed);
    }
  }

  #[inline]
  pub(crate) fn increase_removals(&self, delta: u64) {
    if let Statistics::Enabled(c) = self {
      c.removals.fetch_add(delta, Ordering::Relaxed);
    }
  }

  #[inline]
  pub(crate) fn increase_hits(&self, delta: u64) {
    if let Statistics::Enabled(c) = self {
      c.hits.fetch_add(delta, Ordering::Relaxed);
    }
  }

  #[inline]
  pub(crate) fn increase_misses(&self, delta: u64) {
    if let Statistics::Enabled(c) = self {
      c.misses.fetch_add(delta, Ordering::Relaxed);
    }
  }

  /// Relabels the counters with the name of the cache manager that now owns
  /// the cache. Counts are kept.
  pub(crate) fn set_cache_manager_name(&self, name: Arc<str>) {
    if let Statistics::Enabled(c) = self {
      *c.cache_manager_name.write() = name;
    }
  }

  /// Creates a point-in-time snapshot, or `None` when statistics are disabled.
  pub(crate) fn snapshot(&self) -> Option<StatisticsSnapshot> {
    let Statistics::Enabled(c) = self else {
      return None;
    };

    let hits = c.hits.load(Ordering::Relaxed);
    let misses = c.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    Some(StatisticsSnapshot {
      cache_name: c.cache_name.to_string(),
      cache_manager_name: c.cache_manager_name.read().to_string(),
      puts: c.puts.load(Ordering::Relaxed),
      removals: c.removals.load(Ordering::Relaxed),
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      uptime_secs: c.created_at.elapsed().as_secs(),
    })
  }
}

/// A point-in-time, public-facing snapshot of a cache's statistics.
#[derive(Clone)]
pub struct StatisticsSnapshot {
  /// The name of the cache.
  pub cache_name: String,
  /// The name of the cache manager the cache belongs to.
  pub cache_manager_name: String,
  /// The number of entries written.
  pub puts: u64,
  /// The number of entries removed.
  pub removals: u64,
  /// The number of lookups that found a value.
  pub hits: u64,
  /// The number of lookups that found nothing.
  pub misses: u64,
  /// hits / (hits + misses), or 0 before any lookup was counted.
  pub hit_ratio: f64,
  /// Seconds since the counters were created.
  pub uptime_secs: u64,
}

impl fmt::Debug for StatisticsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StatisticsSnapshot")
      .field("cache_name", &self.cache_name)
      .field("cache_manager_name", &self.cache_manager_name)
      .field("puts", &self.puts)
      .field("removals", &self.removals)
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
