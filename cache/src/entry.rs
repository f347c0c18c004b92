use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An immutable key-value pair, as produced by cache iteration and returned
/// by a `CacheLoader`.
///
/// Two entries are equal when both their keys and their values are equal.
pub struct CacheEntry<K, V> {
  key: K,
  value: Arc<V>,
}

impl<K, V> CacheEntry<K, V> {
  /// Creates a new entry. The value may be given as `V` or as an `Arc<V>`.
  pub fn new(key: K, value: impl Into<Arc<V>>) -> Self {
    Self {
      key,
      value: value.into(),
    }
  }

  #[inline]
  pub fn key(&self) -> &K {
    &self.key
  }

  /// Returns a reference to the shared value.
  #[inline]
  pub fn value(&self) -> &Arc<V> {
    &self.value
  }

  pub fn into_parts(self) -> (K, Arc<V>) {
    (self.key, self.value)
  }
}

impl<K: Clone, V> Clone for CacheEntry<K, V> {
  fn clone(&self) -> Self {
    Self {
      key: self.key.clone(),
      value: self.value.clone(),
    }
  }
}

impl<K: PartialEq, V: PartialEq> PartialEq for CacheEntry<K, V> {
  fn eq(&self, other: &Self) -> bool {
    self.key == other.key && *self.value == *other.value
  }
}

impl<K: Eq, V: Eq> Eq for CacheEntry<K, V> {}

impl<K: Hash, V: Hash> Hash for CacheEntry<K, V> {
  fn hash<S: Hasher>(&self, state: &mut S) {
    self.key.hash(state);
    self.value.hash(state);
  }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for CacheEntry<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheEntry")
      .field("key", &self.key)
      .field("value", &self.value)
      .finish()
  }
}

impl<K, V> From<(K, Arc<V>)> for CacheEntry<K, V> {
  fn from((key, value): (K, Arc<V>)) -> Self {
    Self { key, value }
  }
}
