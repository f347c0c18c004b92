use super::{ScanBatch, Storage};
use crate::error::Result;
use crate::store::ShardedStore;

use std::hash::Hash;
use std::sync::Arc;

/// Share-semantics storage: the exact `Arc` handed in is stored and handed
/// back out.
#[derive(Debug)]
pub(crate) struct ByReferenceStorage<K, V> {
  store: ShardedStore<K, Arc<V>>,
}

impl<K, V> ByReferenceStorage<K, V>
where
  K: Eq + Hash,
{
  pub(crate) fn new(num_shards: usize) -> Self {
    Self {
      store: ShardedStore::new(num_shards),
    }
  }
}

impl<K, V> Storage<K, V> for ByReferenceStorage<K, V>
where
  K: Eq + Hash + Clone + Send + Sync,
  V: Send + Sync,
{
  fn get(&self, key: &K) -> Result<Option<Arc<V>>> {
    Ok(self.store.get_shard(key).read().get(key).cloned())
  }

  fn contains_key(&self, key: &K) -> Result<bool> {
    Ok(self.store.get_shard(key).read().contains_key(key))
  }

  fn put(&self, key: K, value: Arc<V>) -> Result<bool> {
    let shard = self.store.get_shard(&key);
    Ok(shard.write().insert(key, value).is_some())
  }

  fn put_if_absent(&self, key: K, value: Arc<V>) -> Result<bool> {
    let mut guard = self.store.get_shard(&key).write();
    if guard.contains_key(&key) {
      return Ok(false);
    }
    guard.insert(key, value);
    Ok(true)
  }

  fn get_and_put(&self, key: K, value: Arc<V>) -> Result<Option<Arc<V>>> {
    let shard = self.store.get_shard(&key);
    Ok(shard.write().insert(key, value))
  }

  fn replace(&self, key: &K, value: Arc<V>) -> Result<bool> {
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
    let mut guard = self.store.get_shard(key).write();
    match guard.get_mut(key) {
      Some(slot) if expected(slot) => {
        *slot = value;
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  fn get_and_replace(&self, key: &K, value: Arc<V>) -> Result<Option<Arc<V>>> {
    let mut guard = self.store.get_shard(key).write();
    Ok(guard.get_mut(key).map(|slot| std::mem::replace(slot, value)))
  }

  fn remove(&self, key: &K) -> Result<bool> {
    Ok(self.store.get_shard(key).write().remove(key).is_some())
  }

  fn get_and_remove(&self, key: &K) -> Result<Option<Arc<V>>> {
    Ok(self.store.get_shard(key).write().remove(key))
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
    Ok(
      self
        .store
        .scan_shard(shard_index, skip, limit, |key, value| (key.clone(), value.clone())),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hands_back_the_same_arc() {
    let storage = ByReferenceStorage::new(4);
    let value = Arc::new(String::from("shared"));
    storage.put(1, value.clone()).unwrap();

    let fetched = storage.get(&1).unwrap().unwrap();
    assert!(Arc::ptr_eq(&value, &fetched));
  }

  #[test]
  fn replace_if_only_swaps_matching_values() {
    let storage = ByReferenceStorage::new(4);
    storage.put("k", Arc::new(1)).unwrap();

    assert!(!storage.replace_if(&"k", &|v| *v == 2, Arc::new(3)).unwrap());
    assert_eq!(*storage.get(&"k").unwrap().unwrap(), 1);

    assert!(storage.replace_if(&"k", &|v| *v == 1, Arc::new(3)).unwrap());
    assert_eq!(*storage.get(&"k").unwrap().unwrap(), 3);

    assert!(!storage.replace_if(&"missing", &|_| true, Arc::new(0)).unwrap());
  }
}
