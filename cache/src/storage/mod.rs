//! The key-value container underlying a cache.
//!
//! Two interchangeable implementations exist: [`ByReferenceStorage`] shares
//! the `Arc` it is given, [`ByValueStorage`] keeps serialized copies. One of
//! them is chosen once, when the cache is built.

mod by_reference;
mod by_value;

pub(crate) use by_reference::ByReferenceStorage;
pub(crate) use by_value::ByValueStorage;

use crate::error::Result;

use std::sync::Arc;

/// A batch of entries produced by [`Storage::scan`], plus whether the scanned
/// shard has no further entries past this batch.
pub(crate) type ScanBatch<K, V> = (Vec<(K, Arc<V>)>, bool);

/// The storage capability shared by both storage semantics.
///
/// `put_if_absent`, `replace_if` and the `get_and_*` operations hold the key's
/// shard write lock for their whole read-modify-write, so they are atomic with
/// respect to each other for a single key.
pub(crate) trait Storage<K, V>: Send + Sync {
  fn get(&self, key: &K) -> Result<Option<Arc<V>>>;

  fn contains_key(&self, key: &K) -> Result<bool>;

  /// Stores the mapping. Returns `true` if an existing mapping was overwritten.
  fn put(&self, key: K, value: Arc<V>) -> Result<bool>;

  fn put_if_absent(&self, key: K, value: Arc<V>) -> Result<bool>;

  fn get_and_put(&self, key: K, value: Arc<V>) -> Result<Option<Arc<V>>>;

  /// Replaces the value only if a mapping exists.
  fn replace(&self, key: &K, value: Arc<V>) -> Result<bool>;

  /// Replaces the value only if a mapping exists and `expected` accepts the
  /// current value.
  fn replace_if(&self, key: &K, expected: &dyn Fn(&V) -> bool, value: Arc<V>) -> Result<bool>;

  fn get_and_replace(&self, key: &K, value: Arc<V>) -> Result<Option<Arc<V>>>;

  fn remove(&self, key: &K) -> Result<bool>;

  fn get_and_remove(&self, key: &K) -> Result<Option<Arc<V>>>;

  fn len(&self) -> usize;

  fn remove_all(&self);

  fn num_shards(&self) -> usize;

  /// Reads up to `limit` entries of one shard after skipping `skip`.
  /// Returns `Ok(None)` once `shard_index` is past the last shard.
  fn scan(&self, shard_index: usize, skip: usize, limit: usize) -> Result<Option<ScanBatch<K, V>>>;
}
