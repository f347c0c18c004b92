use crate::config::CacheConfiguration;
use crate::listener::ListenerRegistry;
use crate::loader::CacheLoader;
use crate::manager::WeakCacheManager;
use crate::metrics::Statistics;
use crate::status::AtomicStatus;
use crate::storage::Storage;
use crate::task::pool::LoaderPool;

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

/// The internal, thread-safe core of a cache. Every `Cache` handle to the
/// same cache points at one `CacheShared`.
pub(crate) struct CacheShared<K, V> {
  pub(crate) name: Arc<str>,
  pub(crate) configuration: CacheConfiguration,
  pub(crate) storage: Box<dyn Storage<K, V>>,
  pub(crate) loader: Option<Arc<dyn CacheLoader<K, V>>>,
  pub(crate) listeners: ListenerRegistry<K, V>,
  pub(crate) statistics: Statistics,
  pub(crate) status: AtomicStatus,
  pub(crate) pool: LoaderPool,
  pub(crate) cache_manager: OnceCell<WeakCacheManager>,
}

impl<K, V> fmt::Debug for CacheShared<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("name", &self.name)
      .field("configuration", &self.configuration)
      .field("status", &self.status.load())
      .field("num_shards", &self.storage.num_shards())
      .field("has_loader", &self.loader.is_some())
      .field("loader_pool_shut_down", &self.pool.is_shutdown())
      .field("listeners", &self.listeners.len())
      .field("statistics", &self.statistics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<K, V> Drop for CacheShared<K, V> {
  fn drop(&mut self) {
    // Let idle loader workers exit even if the cache was never stopped.
    self.pool.shutdown();
  }
}
