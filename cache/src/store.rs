use core::fmt;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

pub(crate) type Shard<K, V> = RwLock<HashMap<K, V, ahash::RandomState>>;

/// A helper function to hash a key using a `BuildHasher`.
#[inline]
pub(crate) fn hash_key<K: Hash + ?Sized, H: BuildHasher>(hasher: &H, key: &K) -> u64 {
  let mut state = hasher.build_hasher();
  key.hash(&mut state);
  state.finish()
}

/// Returns the default number of shards for this machine.
pub(crate) fn default_shard_count() -> usize {
  (num_cpus::get() * 4).max(1).next_power_of_two()
}

/// A map that is partitioned into multiple, independently locked shards.
///
/// Operations on different keys rarely contend for the same lock. Operations
/// on one key always hit the same shard, so holding its write lock makes a
/// read-modify-write on that key atomic.
pub(crate) struct ShardedStore<K, V> {
  shards: Box<[CachePadded<Shard<K, V>>]>,
  hasher: ahash::RandomState,
}

impl<K, V> fmt::Debug for ShardedStore<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShardedStore")
      .field("num_shards", &self.shards.len())
      .finish()
  }
}

impl<K, V> ShardedStore<K, V>
where
  K: Eq + Hash,
{
  /// Creates a new `ShardedStore`. The shard count is rounded up to a power
  /// of two so the index can be computed with a mask.
  pub(crate) fn new(num_shards: usize) -> Self {
    let num_shards = num_shards.max(1).next_power_of_two();
    let hasher = ahash::RandomState::new();
    let mut shards = Vec::with_capacity(num_shards);
    for _ in 0..num_shards {
      let shard_map = HashMap::with_hasher(hasher.clone());
      shards.push(CachePadded::new(RwLock::new(shard_map)));
    }

    Self {
      shards: shards.into_boxed_slice(),
      hasher,
    }
  }

  /// Returns the lock guarding the shard that owns `key`.
  #[inline]
  pub(crate) fn get_shard<Q>(&self, key: &Q) -> &Shard<K, V>
  where
    K: std::borrow::Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let hash = hash_key(&self.hasher, key);
    let index = hash as usize & (self.shards.len() - 1);
    &self.shards[index]
  }

  #[inline]
  pub(crate) fn shard_at(&self, index: usize) -> Option<&Shard<K, V>> {
    self.shards.get(index).map(|padded_lock| &**padded_lock)
  }

  #[inline]
  pub(crate) fn num_shards(&self) -> usize {
    self.shards.len()
  }

  /// Returns an iterator over all the shard locks.
  pub(crate) fn iter_shards(&self) -> impl Iterator<Item = &Shard<K, V>> {
    self.shards.iter().map(|padded_lock| &**padded_lock)
  }

  /// Counts entries across all shards. Each shard is read-locked in turn, so
  /// the total is not a point-in-time value under concurrent writes.
  pub(crate) fn len(&self) -> usize {
    self.iter_shards().map(|shard| shard.read().len()).sum()
  }

  pub(crate) fn clear(&self) {
    for shard in self.iter_shards() {
      shard.write().clear();
    }
  }

  /// Copies up to `limit` entries of shard `shard_index`, skipping the first
  /// `skip`, through `map_fn`. Returns `None` if the shard index is out of
  /// range. The shard's read lock is held only for the duration of the call.
  pub(crate) fn scan_shard<T>(
    &self,
    shard_index: usize,
    skip: usize,
    limit: usize,
    mut map_fn: impl FnMut(&K, &V) -> T,
  ) -> Option<(Vec<T>, bool)> {
    let shard = self.shard_at(shard_index)?;
    let guard = shard.read();
    let batch: Vec<T> = guard
      .iter()
      .skip(skip)
      .take(limit)
      .map(|(key, value)| map_fn(key, value))
      .collect();
    let exhausted = skip + batch.len() >= guard.len();
    Some((batch, exhausted))
  }
}
