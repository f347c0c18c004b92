//! Contains types for iterating over a cache's contents.

use crate::entry::CacheEntry;
use crate::error::Result;
use crate::handles::Cache;

use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::Arc;

/// A resumable position within a cache's iteration.
///
/// A default cursor starts at the beginning of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
  shard_index: usize,
  items_seen_in_shard: usize,
}

pub const DEFAULT_ITER_BATCH_SIZE: usize = 64;

/// An iterator over the entries of a `Cache`.
///
/// Entries are fetched in batches, holding the read lock of one shard at a
/// time. This is **not** a point-in-time snapshot: entries written after
/// their shard has been scanned are missed, and a removal in a shard that is
/// being scanned can make a later entry of that shard be skipped or seen
/// twice.
///
/// Under store-by-value every yielded entry is a fresh copy. An entry that
/// fails to deserialize is yielded as an `Err`, after which iteration ends.
pub struct Iter<'a, K, V> {
  cache: &'a Cache<K, V>,
  // Each buffered entry carries the position just past it.
  buffer: VecDeque<(Cursor, K, Arc<V>)>,
  origin: Cursor,
  cursor: Cursor,
  last_yielded: Cursor,
  batch_size: usize,
  finished: bool,
}

impl<'a, K, V> Iter<'a, K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  pub(crate) fn new(cache: &'a Cache<K, V>, origin: Cursor) -> Self {
    Self {
      cache,
      buffer: VecDeque::with_capacity(DEFAULT_ITER_BATCH_SIZE),
      origin,
      cursor: origin,
      last_yielded: origin,
      batch_size: DEFAULT_ITER_BATCH_SIZE,
      finished: false,
    }
  }

  /// Returns the position just past the last entry yielded, for resuming
  /// later with `Cache::iter_from`.
  pub fn position(&self) -> Cursor {
    if self.buffer.is_empty() {
      self.cursor
    } else {
      self.last_yielded
    }
  }

  /// Restarts the iteration from where this iterator began.
  pub fn rewind(&mut self) {
    self.buffer.clear();
    self.cursor = self.origin;
    self.last_yielded = self.origin;
    self.finished = false;
  }

  /// Fills the buffer with the next batch. Shard locks are only held inside
  /// `scan`.
  fn refill_buffer(&mut self) -> Result<()> {
    let storage = &self.cache.shared.storage;

    while !self.finished && self.buffer.len() < self.batch_size {
      let limit = self.batch_size - self.buffer.len();
      let scanned = storage.scan(
        self.cursor.shard_index,
        self.cursor.items_seen_in_shard,
        limit,
      )?;
      let Some((batch, exhausted)) = scanned else {
        self.finished = true;
        break;
      };

      for (key, value) in batch {
        self.cursor.items_seen_in_shard += 1;
        self.buffer.push_back((self.cursor, key, value));
      }
      if exhausted {
        self.cursor.shard_index += 1;
        self.cursor.items_seen_in_shard = 0;
      }
    }
    Ok(())
  }
}

impl<'a, K, V> Iterator for Iter<'a, K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  type Item = Result<CacheEntry<K, V>>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.buffer.is_empty() {
      if self.finished {
        return None;
      }
      if let Err(e) = self.refill_buffer() {
        self.buffer.clear();
        self.finished = true;
        return Some(Err(e));
      }
    }

    let (position, key, value) = self.buffer.pop_front()?;
    self.last_yielded = position;
    Some(Ok(CacheEntry::new(key, value)))
  }
}
