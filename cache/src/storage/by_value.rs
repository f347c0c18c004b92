use super::{ScanBatch, Storage};
use crate::error::Result;
use crate::serializer::Serializer;
use crate::store::ShardedStore;

use std::hash::Hash;
use std::sync::Arc;

/// Copy-semantics storage: values are kept as serialized bytes.
///
/// Every write serializes, every read deserializes a fresh instance, so the
/// caller can never observe or mutate the stored state through a reference.
/// Keys are routed and compared by their own `Hash` and `Eq`. A key is stored
/// as a serialize/deserialize copy of the one handed in.
pub(crate) struct ByValueStorage<K, V> {
  store: ShardedStore<K, Vec<u8>>,
  key_serializer: Arc<dyn Serializer<K>>,
  value_serializer: Arc<dyn Serializer<V>>,
}

impl<K, V> ByValueStorage<K, V>
where
  K: Eq + Hash,
{
  pub(crate) fn new(
    num_shards: usize,
    key_serializer: Arc<dyn Serializer<K>>,
    value_serializer: Arc<dyn Serializer<V>>,
  ) -> Self {
    Self {
      store: ShardedStore::new(num_shards),
      key_serializer,
      value_serializer,
    }
  }

  #[inline]
  fn isolate_key(&self, key: &K) -> Result<K> {
    let bytes = self.key_serializer.serialize(key)?;
    self.key_serializer.deserialize(&bytes)
  }

  #[inline]
  fn value_bytes(&self, value: &V) -> Result<Vec<u8>> {
    self.value_serializer.serialize(value)
  }

  #[inline]
  fn materialize(&self, bytes: &[u8]) -> Result<Arc<V>> {
    self.value_serializer.deserialize(bytes).map(Arc::new)
  }

  fn materialize_opt(&self, bytes: Option<Vec<u8>>) -> Result<Option<Arc<V>>> {
    bytes.map(|b| self.materialize(&b)).transpose()
  }
}

impl<K, V> Storage<K, V> for ByValueStorage<K, V>
where
  K: Eq + Hash + Clone + Send + Sync,
  V: Send + Sync,
{
  fn get(&self, key: &K) -> Result<Option<Arc<V>>> {
    let stored = self.store.get_shard(key).read().get(key).cloned();
    self.materialize_opt(stored)
  }

  fn contains_key(&self, key: &K) -> Result<bool> {
    Ok(self.store.get_shard(key).read().contains_key(key))
  }

  fn put(&self, key: K, value: Arc<V>) -> Result<bool> {
    let key = self.isolate_key(&key)?;
    let value = self.value_bytes(&value)?;
    let shard = self.store.get_shard(&key);
    Ok(shard.write().insert(key, value).is_some())
  }

  fn put_if_absent(&self, key: K, value: Arc<V>) -> Result<bool> {
    let key = self.isolate_key(&key)?;
    let value = self.value_bytes(&value)?;
    let mut guard = self.store.get_shard(&key).write();
    if guard.contains_key(&key) {
      return Ok(false);
    }
    guard.insert(key, value);
    Ok(true)
  }

  fn get_and_put(&self, key: K, value: Arc<V>) -> Result<Option<Arc<V>>> {
    let key = self.isolate_key(&key)?;
    let value = self.value_bytes(&value)?;
    let previous = self.store.get_shard(&key).write().insert(key, value);
    self.materialize_opt(previous)
  }

  fn replace(&self, key: &K, value: Arc<V>) -> Result<bool> {
    let value = self.value_bytes(&value)?;
    let mut guard = self.store.get_shard(key).write();
    match guard.get_mut(key) {
      Some(slot) => {
        *slot = value;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  fn replace_if(&self, key: &K, expected: &dyn Fn(&V) -> bool, value: Arc<V>) -> Result<bool> {
    let value = self.value_bytes(&value)?;
    let mut guard = self.store.get_shard(key).write();
    let Some(slot) = guard.get_mut(key) else {
      return Ok(false);
    };
    let current = self.value_serializer.deserialize(slot)?;
    if !expected(&current) {
      return Ok(false);
    }
    *slot = value;
    Ok(true)
  }

  fn get_and_replace(&self, key: &K, value: Arc<V>) -> Result<Option<Arc<V>>> {
    let value = self.value_bytes(&value)?;
    let previous = {
      let mut guard = self.store.get_shard(key).write();
      guard.get_mut(key).map(|slot| std::mem::replace(slot, value))
    };
    self.materialize_opt(previous)
  }

  fn remove(&self, key: &K) -> Result<bool> {
    Ok(self.store.get_shard(key).write().remove(key).is_some())
  }

  fn get_and_remove(&self, key: &K) -> Result<Option<Arc<V>>> {
    // Decode before removing so a failed decode leaves the entry in place.
    let mut guard = self.store.get_shard(key).write();
    let Some(bytes) = guard.get(key) else {
      return Ok(None);
    };
    let previous = self.materialize(bytes)?;
    guard.remove(key);
    Ok(Some(previous))
  }

  fn len(&self) -> usize {
    self.store.len()
  }

  fn remove_all(&self) {
    self.store.clear();
  }

  fn num_shards(&self) -> usize {
    self.store.num_shards()
  }

  fn scan(&self, shard_index: usize, skip: usize, limit: usize) -> Result<Option<ScanBatch<K, V>>> {
    // Copy out under the read lock, decode after releasing it.
    let raw = self
      .store
      .scan_shard(shard_index, skip, limit, |key, value| (key.clone(), value.clone()));
    let Some((raw, exhausted)) = raw else {
      return Ok(None);
    };

    let mut batch = Vec::with_capacity(raw.len());
    for (key, value) in raw {
      batch.push((key, self.materialize(&value)?));
    }
    Ok(Some((batch, exhausted)))
  }
}
