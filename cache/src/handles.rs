use crate::config::CacheConfiguration;
use crate::error::{CacheError, Result};
use crate::iter::{Cursor, Iter};
use crate::listener::{
  CacheEntryEvent, CacheEntryListener, EventType, ListenerRegistration, NotificationScope,
};
use crate::loader::{load_handle, CacheLoader, LoadHandle, LoaderArg};
use crate::manager::{CacheManager, WeakCacheManager};
use crate::metrics::StatisticsSnapshot;
use crate::shared::CacheShared;
use crate::status::CacheStatus;

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// A named, thread-safe cache.
///
/// `Cache` is a cheap handle: clones share the same underlying cache. Every
/// data operation requires the cache to be [`Started`](CacheStatus::Started)
/// and fails with [`CacheError::IllegalState`] otherwise.
///
/// On a miss, [`get`](Cache::get) falls back to the configured
/// [`CacheLoader`] and writes its result through. Concurrent misses on the
/// same key may each call the loader; the last write wins.
pub struct Cache<K, V> {
  pub(crate) shared: Arc<CacheShared<K, V>>,
}

impl<K, V> Clone for Cache<K, V> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<K, V> fmt::Debug for Cache<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Cache").field("shared", &self.shared).finish()
  }
}

// --- Lifecycle and identity ---
// None of these require the cache to be started.
impl<K, V> Cache<K, V> {
  pub fn name(&self) -> &str {
    &self.shared.name
  }

  pub fn status(&self) -> CacheStatus {
    self.shared.status.load()
  }

  pub fn configuration(&self) -> &CacheConfiguration {
    &self.shared.configuration
  }

  /// Returns the cache manager this cache was added to, if it is still alive.
  pub fn cache_manager(&self) -> Option<CacheManager> {
    self.shared.cache_manager.get().and_then(WeakCacheManager::upgrade)
  }

  /// Associates the cache with its owning manager. This may only happen once.
  ///
  /// The statistics are relabelled with the manager's name; their counts are
  /// kept.
  pub fn set_cache_manager(&self, manager: &CacheManager) -> Result<()> {
    self
      .shared
      .cache_manager
      .set(manager.downgrade())
      .map_err(|_| CacheError::AlreadyManaged)?;
    self
      .shared
      .statistics
      .set_cache_manager_name(Arc::from(manager.name()));
    Ok(())
  }

  /// Moves the cache from `Uninitialised` to `Started`. Starting an already
  /// started cache does nothing. A stopped cache cannot be restarted.
  pub fn start(&self) -> Result<()> {
    match self.status() {
      CacheStatus::Uninitialised => {
        self.shared.status.store(CacheStatus::Started);
        tracing::debug!(cache = %self.shared.name, "cache started");
        Ok(())
      }
      CacheStatus::Started => Ok(()),
      status => Err(CacheError::IllegalState { status }),
    }
  }

  /// Stops the cache: the loader pool stops accepting work, all entries are
  /// removed, and the cache ends up `Stopped`.
  ///
  /// Load jobs that are already queued or running are not waited for. Such a
  /// job writes through the ordinary `put` path, which fails once the status
  /// has left `Started`, so its handle completes with
  /// `CacheError::IllegalState`. A job whose status check happened just before
  /// the transition may still write into the cleared storage.
  pub fn stop(&self) {
    self.shared.status.store(CacheStatus::Stopping);
    self.shared.pool.shutdown();
    self.shared.storage.remove_all();
    self.shared.listeners.shutdown();
    self.shared.status.store(CacheStatus::Stopped);
    tracing::debug!(cache = %self.shared.name, "cache stopped");
  }

  #[inline]
  fn check_started(&self) -> Result<()> {
    let status = self.shared.status.load();
    if status != CacheStatus::Started {
      return Err(CacheError::IllegalState { status });
    }
    Ok(())
  }
}

impl<K, V> Cache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  // --- Reads ---

  /// Returns the value for `key`, consulting the loader on a miss.
  ///
  /// A value produced by the loader is written into the cache before it is
  /// returned. A loader failure is returned as `CacheError::Loader`.
  pub fn get(&self, key: &K) -> Result<Option<Arc<V>>> {
    self.check_started()?;
    self.get_internal(key)
  }

  /// Looks up every key with the same miss handling as [`get`](Cache::get).
  /// Keys that neither the cache nor the loader have map to `None`.
  pub fn get_all<I>(&self, keys: I) -> Result<HashMap<K, Option<Arc<V>>>>
  where
    I: IntoIterator<Item = K>,
  {
    self.check_started()?;
    let keys = keys.into_iter();
    let mut result = HashMap::with_capacity(keys.size_hint().0);
    for key in keys {
      let value = self.get_internal(&key)?;
      result.insert(key, value);
    }
    Ok(result)
  }

  pub fn contains_key(&self, key: &K) -> Result<bool> {
    self.check_started()?;
    self.shared.storage.contains_key(key)
  }

  /// Returns the number of entries. Not a point-in-time value under
  /// concurrent writes.
  pub fn len(&self) -> Result<usize> {
    self.check_started()?;
    Ok(self.shared.storage.len())
  }

  pub fn is_empty(&self) -> Result<bool> {
    Ok(self.len()? == 0)
  }

  /// Returns a snapshot of the statistics, or `None` when the configuration
  /// disables them.
  pub fn statistics(&self) -> Result<Option<StatisticsSnapshot>> {
    self.check_started()?;
    Ok(self.shared.statistics.snapshot())
  }

  /// Returns an iterator over the entries of the cache.
  ///
  /// The iterator is weakly consistent: it holds one shard's read lock at a
  /// time and may miss or repeat entries written concurrently.
  pub fn iter(&self) -> Result<Iter<'_, K, V>> {
    self.check_started()?;
    Ok(Iter::new(self, Cursor::default()))
  }

  /// Resumes iteration at a position previously taken from
  /// [`Iter::position`].
  pub fn iter_from(&self, cursor: Cursor) -> Result<Iter<'_, K, V>> {
    self.check_started()?;
    Ok(Iter::new(self, cursor))
  }

  // --- Asynchronous loading ---

  /// Loads `key` on a loader worker thread.
  ///
  /// `loader` overrides the configured loader for this call. Returns
  /// `Ok(None)` without scheduling anything when there is no loader or the
  /// key is already present. Otherwise the returned handle completes with the
  /// loaded value once it has been written into the cache (`None` if the
  /// loader had no value), or with the loader's error.
  pub fn load(
    &self,
    key: K,
    loader: Option<Arc<dyn CacheLoader<K, V>>>,
    arg: Option<LoaderArg>,
  ) -> Result<Option<LoadHandle<Option<Arc<V>>>>> {
    self.check_started()?;
    let Some(loader) = loader.or_else(|| self.shared.loader.clone()) else {
      return Ok(None);
    };
    if self.contains_key(&key)? {
      return Ok(None);
    }

    let (handle, completer) = load_handle();
    let cache = self.clone();
    self.shared.pool.submit(move || {
      let result = cache.load_one(&key, loader.as_ref(), arg.as_ref());
      if let Err(e) = &result {
        tracing::warn!(cache = %cache.shared.name, error = %e, "asynchronous load failed");
      }
      completer.complete(result);
    })?;
    Ok(Some(handle))
  }

  /// Loads every key in `keys` that is not already present, with a single
  /// `load_all` call on a loader worker thread.
  ///
  /// Returns `Ok(None)` when there is no loader. The handle completes with
  /// only the newly loaded entries after they have been written into the
  /// cache. A loader failure writes nothing. If storing one loaded entry
  /// fails, the handle completes with that error and the entries stored
  /// before it stay written, as with `put_all`.
  pub fn load_all(
    &self,
    keys: Vec<K>,
    loader: Option<Arc<dyn CacheLoader<K, V>>>,
    arg: Option<LoaderArg>,
  ) -> Result<Option<LoadHandle<HashMap<K, Arc<V>>>>> {
    self.check_started()?;
    let Some(loader) = loader.or_else(|| self.shared.loader.clone()) else {
      return Ok(None);
    };

    let (handle, completer) = load_handle();
    let cache = self.clone();
    self.shared.pool.submit(move || {
      let result = cache.load_missing(keys, loader.as_ref(), arg.as_ref());
      if let Err(e) = &result {
        tracing::warn!(cache = %cache.shared.name, error = %e, "asynchronous bulk load failed");
      }
      completer.complete(result);
    })?;
    Ok(Some(handle))
  }

  // --- Writes ---

  /// Stores `value` under `key`. The value may be given as `V` or `Arc<V>`.
  pub fn put(&self, key: K, value: impl Into<Arc<V>>) -> Result<()> {
    self.check_started()?;
    let value = value.into();
    let event_key = self.event_key(&key);
    let replaced = self.shared.storage.put(key, value.clone())?;
    self.shared.statistics.increase_puts(1);
    self.emit(event_key, written_event(replaced), Some(value));
    Ok(())
  }

  /// Stores `value` under `key` and returns the previous value.
  pub fn get_and_put(&self, key: K, value: impl Into<Arc<V>>) -> Result<Option<Arc<V>>> {
    self.check_started()?;
    let value = value.into();
    let event_key = self.event_key(&key);
    let previous = self.shared.storage.get_and_put(key, value.clone())?;
    self.shared.statistics.increase_puts(1);
    self.emit(event_key, written_event(previous.is_some()), Some(value));
    Ok(previous)
  }

  /// Stores every entry. If one entry fails to store, the entries before it
  /// stay written and are counted.
  pub fn put_all<I, T>(&self, entries: I) -> Result<()>
  where
    I: IntoIterator<Item = (K, T)>,
    T: Into<Arc<V>>,
  {
    self.check_started()?;
    let mut written = 0;
    let outcome = entries.into_iter().try_for_each(|(key, value)| -> Result<()> {
      let value = value.into();
      let event_key = self.event_key(&key);
      let replaced = self.shared.storage.put(key, value.clone())?;
      written += 1;
      self.emit(event_key, written_event(replaced), Some(value));
      Ok(())
    });
    self.shared.statistics.increase_puts(written);
    outcome
  }

  /// Stores `value` only if `key` has no mapping. Returns whether it was
  /// stored.
  pub fn put_if_absent(&self, key: K, value: impl Into<Arc<V>>) -> Result<bool> {
    self.check_started()?;
    let value = value.into();
    let event_key = self.event_key(&key);
    let stored = self.shared.storage.put_if_absent(key, value.clone())?;
    if stored {
      self.shared.statistics.increase_puts(1);
      self.emit(event_key, EventType::Created, Some(value));
    }
    Ok(stored)
  }

  /// Replaces the value of `key` only if its current value equals `old`.
  /// Counts as a put only when the replacement happens.
  pub fn compare_and_replace(&self, key: &K, old: &V, new: impl Into<Arc<V>>) -> Result<bool>
  where
    V: PartialEq,
  {
    self.check_started()?;
    let new = new.into();
    let replaced = self
      .shared
      .storage
      .replace_if(key, &|current: &V| current == old, new.clone())?;
    if replaced {
      self.shared.statistics.increase_puts(1);
      self.emit(self.event_key(key), EventType::Updated, Some(new));
    }
    Ok(replaced)
  }

  /// Replaces the value of `key` only if it has a mapping.
  ///
  /// Counted as a put whether or not a mapping existed.
  pub fn replace(&self, key: &K, value: impl Into<Arc<V>>) -> Result<bool> {
    self.check_started()?;
    let value = value.into();
    let replaced = self.shared.storage.replace(key, value.clone())?;
    self.shared.statistics.increase_puts(1);
    if replaced {
      self.emit(self.event_key(key), EventType::Updated, Some(value));
    }
    Ok(replaced)
  }

  /// Replaces the value of `key` if it has a mapping and returns the previous
  /// value. A found value counts as a hit and a put, otherwise a miss.
  pub fn get_and_replace(&self, key: &K, value: impl Into<Arc<V>>) -> Result<Option<Arc<V>>> {
    self.check_started()?;
    let value = value.into();
    let previous = self.shared.storage.get_and_replace(key, value.clone())?;
    if previous.is_some() {
      self.shared.statistics.increase_hits(1);
      self.shared.statistics.increase_puts(1);
      self.emit(self.event_key(key), EventType::Updated, Some(value));
    } else {
      self.shared.statistics.increase_misses(1);
    }
    Ok(previous)
  }

  // --- Removals ---

  pub fn remove(&self, key: &K) -> Result<bool> {
    self.check_started()?;
    let removed = self.shared.storage.remove(key)?;
    if removed {
      self.shared.statistics.increase_removals(1);
      self.emit(self.event_key(key), EventType::Removed, None);
    }
    Ok(removed)
  }

  /// Removes `key` and returns its value. A found value counts as a hit and a
  /// removal, otherwise a miss.
  pub fn get_and_remove(&self, key: &K) -> Result<Option<Arc<V>>> {
    self.check_started()?;
    let previous = self.shared.storage.get_and_remove(key)?;
    match &previous {
      Some(value) => {
        self.shared.statistics.increase_hits(1);
        self.shared.statistics.increase_removals(1);
        self.emit(self.event_key(key), EventType::Removed, Some(value.clone()));
      }
      None => self.shared.statistics.increase_misses(1),
    }
    Ok(previous)
  }

  /// Removes each key. Every requested key is counted as a removal, whether
  /// or not it was present.
  pub fn remove_keys(&self, keys: &[K]) -> Result<()> {
    self.check_started()?;
    for key in keys {
      if self.shared.storage.remove(key)? {
        self.emit(self.event_key(key), EventType::Removed, None);
      }
    }
    self.shared.statistics.increase_removals(keys.len() as u64);
    Ok(())
  }

  /// Removes every entry. The removal count grows by the size observed just
  /// before clearing.
  pub fn remove_all(&self) -> Result<()> {
    self.check_started()?;
    let size = if self.shared.statistics.is_enabled() {
      self.shared.storage.len()
    } else {
      0
    };

    if self.shared.listeners.is_empty() {
      self.shared.storage.remove_all();
    } else {
      // Listeners need the keys, so remove one by one.
      for key in self.collect_keys()? {
        if let Some(value) = self.shared.storage.get_and_remove(&key)? {
          self.emit(Some(key), EventType::Removed, Some(value));
        }
      }
    }

    self.shared.statistics.increase_removals(size as u64);
    Ok(())
  }

  // --- Listeners ---

  /// Registers a listener. Returns `false` if this listener is already
  /// registered, in which case its existing scope and synchronicity are kept.
  pub fn register_listener(
    &self,
    listener: Arc<dyn CacheEntryListener<K, V>>,
    scope: NotificationScope,
    synchronous: bool,
  ) -> bool {
    self
      .shared
      .listeners
      .register(ListenerRegistration::new(listener, scope, synchronous))
  }

  /// Unregisters a listener, whatever scope it was registered with.
  pub fn unregister_listener(&self, listener: &Arc<dyn CacheEntryListener<K, V>>) -> bool {
    self.shared.listeners.unregister(listener)
  }

  pub fn listener_registrations(&self) -> Vec<ListenerRegistration<K, V>> {
    self.shared.listeners.registrations()
  }

  // --- Internals ---

  fn get_internal(&self, key: &K) -> Result<Option<Arc<V>>> {
    if let Some(value) = self.shared.storage.get(key)? {
      return Ok(Some(value));
    }
    match &self.shared.loader {
      Some(loader) => self.get_from_loader(key, loader.as_ref()),
      None => Ok(None),
    }
  }

  fn get_from_loader(&self, key: &K, loader: &dyn CacheLoader<K, V>) -> Result<Option<Arc<V>>> {
    let Some(entry) = loader.load(key, None).map_err(CacheError::Loader)? else {
      return Ok(None);
    };
    let (key, value) = entry.into_parts();
    let event_key = self.event_key(&key);
    let replaced = self.shared.storage.put(key, value.clone())?;
    self.emit(event_key, written_event(replaced), Some(value.clone()));
    Ok(Some(value))
  }

  fn load_one(
    &self,
    key: &K,
    loader: &dyn CacheLoader<K, V>,
    arg: Option<&LoaderArg>,
  ) -> Result<Option<Arc<V>>> {
    let Some(entry) = loader.load(key, arg).map_err(CacheError::Loader)? else {
      return Ok(None);
    };
    let (key, value) = entry.into_parts();
    self.put(key, value.clone())?;
    Ok(Some(value))
  }

  fn load_missing(
    &self,
    keys: Vec<K>,
    loader: &dyn CacheLoader<K, V>,
    arg: Option<&LoaderArg>,
  ) -> Result<HashMap<K, Arc<V>>> {
    let mut missing = Vec::with_capacity(keys.len());
    for key in keys {
      if !self.contains_key(&key)? {
        missing.push(key);
      }
    }
    let loaded = loader.load_all(&missing, arg).map_err(CacheError::Loader)?;
    self.put_all(loaded.iter().map(|(k, v)| (k.clone(), v.clone())))?;
    Ok(loaded)
  }

  fn collect_keys(&self) -> Result<Vec<K>> {
    let mut keys = Vec::new();
    for entry in Iter::new(self, Cursor::default()) {
      keys.push(entry?.into_parts().0);
    }
    Ok(keys)
  }

  /// Clones the key for an event only when someone is listening.
  #[inline]
  fn event_key(&self, key: &K) -> Option<K> {
    if self.shared.listeners.is_empty() {
      None
    } else {
      Some(key.clone())
    }
  }

  #[inline]
  fn emit(&self, key: Option<K>, event_type: EventType, value: Option<Arc<V>>) {
    if let Some(key) = key {
      self.shared.listeners.notify(CacheEntryEvent {
        event_type,
        key,
        value,
      });
    }
  }
}

#[inline]
fn written_event(replaced: bool) -> EventType {
  if replaced {
    EventType::Updated
  } else {
    EventType::Created
  }
}
