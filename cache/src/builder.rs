use crate::config::CacheConfiguration;
use crate::error::BuildError;
use crate::handles::Cache;
use crate::listener::{CacheEntryListener, ListenerRegistration, ListenerRegistry, NotificationScope};
use crate::loader::CacheLoader;
use crate::manager::CacheManager;
use crate::metrics::Statistics;
use crate::serializer::Serializer;
use crate::shared::CacheShared;
use crate::status::{AtomicStatus, CacheStatus};
use crate::storage::{ByReferenceStorage, ByValueStorage, Storage};
use crate::store::default_shard_count;
use crate::task::pool::{LoaderPool, LOADER_THREADS};

use core::fmt;
use std::hash::Hash;
use std::sync::Arc;

use once_cell::sync::OnceCell;

/// A builder for creating `Cache` instances.
///
/// The storage semantics are fixed here: a store-by-value cache needs a key
/// and a value [`Serializer`], a store-by-reference cache does not.
///
/// A builder obtained from [`CacheManager::cache_builder`] registers and
/// starts the cache it builds. One created with [`CacheBuilder::new`] builds a
/// standalone, `Uninitialised` cache.
pub struct CacheBuilder<K, V> {
  name: String,
  cache_manager_name: String,
  configuration: CacheConfiguration,
  shards: usize,
  loader: Option<Arc<dyn CacheLoader<K, V>>>,
  listeners: Vec<ListenerRegistration<K, V>>,
  key_serializer: Option<Arc<dyn Serializer<K>>>,
  value_serializer: Option<Arc<dyn Serializer<V>>>,
  manager: Option<CacheManager>,
}

impl<K, V> fmt::Debug for CacheBuilder<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("name", &self.name)
      .field("cache_manager_name", &self.cache_manager_name)
      .field("configuration", &self.configuration)
      .field("shards", &self.shards)
      .field("has_loader", &self.loader.is_some())
      .field("listeners", &self.listeners.len())
      .field("has_serializers", &self.key_serializer.is_some())
      .field("managed", &self.manager.is_some())
      .finish()
  }
}

// --- General Configuration Methods ---
impl<K, V> CacheBuilder<K, V> {
  /// Creates a builder for a cache called `name`, owned by the cache manager
  /// called `cache_manager_name`, with the default configuration.
  pub fn new(name: impl Into<String>, cache_manager_name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      cache_manager_name: cache_manager_name.into(),
      configuration: CacheConfiguration::default(),
      shards: default_shard_count(),
      loader: None,
      listeners: Vec::new(),
      key_serializer: None,
      value_serializer: None,
      manager: None,
    }
  }

  pub(crate) fn for_manager(name: impl Into<String>, manager: CacheManager) -> Self {
    let mut builder = Self::new(name, manager.name());
    builder.configuration = manager.default_configuration();
    builder.manager = Some(manager);
    builder
  }

  /// Replaces the whole configuration.
  pub fn configuration(mut self, configuration: CacheConfiguration) -> Self {
    self.configuration = configuration;
    self
  }

  pub fn store_by_value(mut self, enabled: bool) -> Self {
    self.configuration.store_by_value = enabled;
    self
  }

  pub fn statistics_enabled(mut self, enabled: bool) -> Self {
    self.configuration.statistics_enabled = enabled;
    self
  }

  /// Sets the number of concurrent shards. Rounded up to a power of two.
  pub fn shards(mut self, shards: usize) -> Self {
    self.shards = shards.max(1).next_power_of_two();
    self
  }

  /// Sets the loader consulted on a `get` miss and by `load`/`load_all`.
  pub fn loader<L>(mut self, loader: L) -> Self
  where
    L: CacheLoader<K, V> + 'static,
  {
    self.loader = Some(Arc::new(loader));
    self
  }

  pub fn loader_arc(mut self, loader: Arc<dyn CacheLoader<K, V>>) -> Self {
    self.loader = Some(loader);
    self
  }

  /// Registers a listener the cache starts out with. Registering the same
  /// listener twice keeps the first registration.
  pub fn register_listener(
    mut self,
    listener: Arc<dyn CacheEntryListener<K, V>>,
    scope: NotificationScope,
    synchronous: bool,
  ) -> Self {
    let registration = ListenerRegistration::new(listener, scope, synchronous);
    if !self.listeners.contains(&registration) {
      self.listeners.push(registration);
    }
    self
  }

  /// Sets the serializers used by a store-by-value cache.
  pub fn serializers<KS, VS>(mut self, key_serializer: KS, value_serializer: VS) -> Self
  where
    KS: Serializer<K> + 'static,
    VS: Serializer<V> + 'static,
  {
    self.key_serializer = Some(Arc::new(key_serializer));
    self.value_serializer = Some(Arc::new(value_serializer));
    self
  }

  fn validate(&self) -> Result<(), BuildError> {
    if self.name.is_empty() {
      return Err(BuildError::EmptyName);
    }
    if self.cache_manager_name.is_empty() {
      return Err(BuildError::EmptyManagerName);
    }
    Ok(())
  }
}

#[cfg(feature = "serde")]
impl<K, V> CacheBuilder<K, V>
where
  K: serde::Serialize + serde::de::DeserializeOwned + 'static,
  V: serde::Serialize + serde::de::DeserializeOwned + 'static,
{
  /// Uses `bincode` for both keys and values under store-by-value.
  pub fn bincode(self) -> Self {
    use crate::serializer::BincodeSerializer;
    self.serializers(BincodeSerializer, BincodeSerializer)
  }
}

// --- Build Methods ---
impl<K, V> CacheBuilder<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Builds the cache.
  ///
  /// A standalone cache is returned `Uninitialised` and must be started
  /// before use. A managed cache is associated with its manager, registered
  /// under its name and started; a cache previously registered under that
  /// name is stopped.
  pub fn build(self) -> Result<Cache<K, V>, BuildError> {
    self.validate()?;
    let manager = self.manager;

    let storage: Box<dyn Storage<K, V>> = if self.configuration.store_by_value {
      match (self.key_serializer, self.value_serializer) {
        (Some(key_serializer), Some(value_serializer)) => Box::new(ByValueStorage::new(
          self.shards,
          key_serializer,
          value_serializer,
        )),
        _ => return Err(BuildError::SerializerRequired),
      }
    } else {
      Box::new(ByReferenceStorage::new(self.shards))
    };

    let name: Arc<str> = Arc::from(self.name);
    let listeners = ListenerRegistry::new(&name);
    for registration in self.listeners {
      listeners.register(registration);
    }

    let shared = CacheShared {
      statistics: Statistics::new(
        self.configuration.statistics_enabled,
        name.clone(),
        Arc::from(self.cache_manager_name),
      ),
      pool: LoaderPool::new(&name, LOADER_THREADS),
      name,
      configuration: self.configuration,
      storage,
      loader: self.loader,
      listeners,
      status: AtomicStatus::new(CacheStatus::Uninitialised),
      cache_manager: match &manager {
        Some(manager) => OnceCell::with_value(manager.downgrade()),
        None => OnceCell::new(),
      },
    };

    tracing::debug!(cache = %shared.name, configuration = ?shared.configuration, "cache built");
    let cache = Cache {
      shared: Arc::new(shared),
    };
    if let Some(manager) = manager {
      manager.adopt(cache.clone());
    }
    Ok(cache)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn store_by_value_without_serializers_is_rejected() {
    let result = CacheBuilder::<u32, u32>::new("c", "m").build();
    assert_eq!(result.unwrap_err(), BuildError::SerializerRequired);
  }

  #[test]
  fn names_must_not_be_empty() {
    let result = CacheBuilder::<u32, u32>::new("", "m").store_by_value(false).build();
    assert_eq!(result.unwrap_err(), BuildError::EmptyName);

    let result = CacheBuilder::<u32, u32>::new("c", "").store_by_value(false).build();
    assert_eq!(result.unwrap_err(), BuildError::EmptyManagerName);
  }

  #[test]
  fn a_built_cache_is_uninitialised() {
    let cache = CacheBuilder::<u32, u32>::new("c", "m")
      .store_by_value(false)
      .build()
      .unwrap();
    assert_eq!(cache.status(), CacheStatus::Uninitialised);
    assert_eq!(cache.name(), "c");
  }
}
