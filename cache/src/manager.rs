//! The registry of named caches.

use crate::builder::CacheBuilder;
use crate::config::CacheConfiguration;
use crate::error::{CacheError, Result};
use crate::handles::Cache;
use crate::status::CacheStatus;

use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use dashmap::DashMap;

/// Optional capabilities a caller can ask a `CacheManager` about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionalFeature {
  /// Caches that share stored values instead of copying them.
  StoreByReference,
  /// Transactional cache operations.
  Transactions,
}

/// The type-erased view a manager has of the caches it owns.
trait ManagedCache: Send + Sync {
  fn name(&self) -> &str;
  fn status(&self) -> CacheStatus;
  fn stop(&self);
  fn as_any(&self) -> &dyn Any;
}

impl<K, V> ManagedCache for Cache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  fn name(&self) -> &str {
    Cache::name(self)
  }

  fn status(&self) -> CacheStatus {
    Cache::status(self)
  }

  fn stop(&self) {
    Cache::stop(self)
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}

struct ManagerInner {
  name: String,
  default_configuration: CacheConfiguration,
  caches: DashMap<String, Arc<dyn ManagedCache>>,
}

/// Owns a set of named caches.
///
/// Caches built through [`cache_builder`](CacheManager::cache_builder) are
/// registered and started by the manager. `CacheManager` is a cheap handle:
/// clones refer to the same registry.
#[derive(Clone)]
pub struct CacheManager {
  inner: Arc<ManagerInner>,
}

/// A non-owning reference from a cache back to its manager, so that a cache
/// does not keep its manager alive.
#[derive(Clone)]
pub(crate) struct WeakCacheManager(Weak<ManagerInner>);

impl WeakCacheManager {
  pub(crate) fn upgrade(&self) -> Option<CacheManager> {
    self.0.upgrade().map(|inner| CacheManager { inner })
  }
}

impl fmt::Debug for WeakCacheManager {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("WeakCacheManager")
      .field(&self.0.upgrade().map(|inner| inner.name.clone()))
      .finish()
  }
}

impl CacheManager {
  /// Creates an empty manager whose caches default to
  /// `CacheConfiguration::default()`.
  pub fn new(name: impl Into<String>) -> Self {
    Self::with_default_configuration(name, CacheConfiguration::default())
  }

  /// Creates an empty manager whose cache builders start from
  /// `configuration`.
  pub fn with_default_configuration(
    name: impl Into<String>,
    configuration: CacheConfiguration,
  ) -> Self {
    Self {
      inner: Arc::new(ManagerInner {
        name: name.into(),
        default_configuration: configuration,
        caches: DashMap::new(),
      }),
    }
  }

  pub fn name(&self) -> &str {
    &self.inner.name
  }

  pub fn default_configuration(&self) -> CacheConfiguration {
    self.inner.default_configuration
  }

  /// Returns a builder for a cache called `name`.
  ///
  /// Building it registers the new cache under `name` and starts it. A cache
  /// already registered under that name is replaced and stopped.
  pub fn cache_builder<K, V>(&self, name: impl Into<String>) -> CacheBuilder<K, V> {
    CacheBuilder::for_manager(name, self.clone())
  }

  /// Returns the cache registered under `name`, or `None` if there is none or
  /// it was built with different key or value types.
  pub fn get_cache<K, V>(&self, name: &str) -> Option<Cache<K, V>>
  where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
  {
    let managed = self.inner.caches.get(name)?.value().clone();
    managed.as_any().downcast_ref::<Cache<K, V>>().cloned()
  }

  /// Unregisters and stops the cache called `name`. Returns `false` if there
  /// was none.
  pub fn remove_cache(&self, name: &str) -> bool {
    match self.inner.caches.remove(name) {
      Some((_, cache)) => {
        cache.stop();
        tracing::debug!(manager = %self.inner.name, cache = name, "cache removed");
        true
      }
      None => false,
    }
  }

  pub fn cache_names(&self) -> Vec<String> {
    self.inner.caches.iter().map(|entry| entry.key().clone()).collect()
  }

  /// Stops and unregisters every cache.
  ///
  /// A panic while stopping one cache is logged and does not prevent the
  /// others from being stopped.
  pub fn shutdown(&self) {
    let names = self.cache_names();
    for name in names {
      let Some((_, cache)) = self.inner.caches.remove(&name) else {
        continue;
      };
      if panic::catch_unwind(AssertUnwindSafe(|| cache.stop())).is_err() {
        tracing::warn!(
          manager = %self.inner.name,
          cache = %cache.name(),
          status = %cache.status(),
          "error stopping cache during shutdown"
        );
      }
    }
    tracing::debug!(manager = %self.inner.name, "cache manager shut down");
  }

  /// Reports whether this implementation supports `feature`.
  pub fn is_supported(feature: OptionalFeature) -> bool {
    match feature {
      OptionalFeature::StoreByReference => true,
      OptionalFeature::Transactions => false,
    }
  }

  /// Transactions are not supported.
  pub fn user_transaction(&self) -> Result<()> {
    Err(CacheError::Unsupported("user transactions"))
  }

  pub(crate) fn downgrade(&self) -> WeakCacheManager {
    WeakCacheManager(Arc::downgrade(&self.inner))
  }

  /// Registers and starts a cache built for this manager, stopping the one it
  /// replaces.
  pub(crate) fn adopt<K, V>(&self, cache: Cache<K, V>)
  where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
  {
    if let Err(e) = cache.start() {
      tracing::warn!(manager = %self.inner.name, cache = %cache.name(), error = %e, "failed to start cache");
    }
    let name = cache.name().to_string();
    let replaced = self.inner.caches.insert(name, Arc::new(cache));
    if let Some(replaced) = replaced {
      replaced.stop();
      tracing::debug!(manager = %self.inner.name, cache = %replaced.name(), "replaced cache stopped");
    }
  }

  pub(crate) fn ptr_eq(&self, other: &CacheManager) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl fmt::Debug for CacheManager {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheManager")
      .field("name", &self.inner.name)
      .field("default_configuration", &self.inner.default_configuration)
      .field("caches", &self.cache_names())
      .finish()
  }
}

impl PartialEq for CacheManager {
  fn eq(&self, other: &Self) -> bool {
    self.ptr_eq(other)
  }
}

impl Eq for CacheManager {}
