#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use stowage::loader::from_fn;
use stowage::{
  BoxError, Cache, CacheBuilder, CacheEntryEvent, CacheEntryListener, CacheLoader, EventType,
};

pub const MANAGER: &str = "test-manager";

/// A started, store-by-reference cache with statistics enabled.
pub fn started_reference_cache(name: &str) -> Cache<String, String> {
  let cache = CacheBuilder::new(name, MANAGER)
    .store_by_value(false)
    .statistics_enabled(true)
    .shards(4)
    .build()
    .unwrap();
  cache.start().unwrap();
  cache
}

/// A started, store-by-value cache (bincode) with statistics enabled.
#[cfg(feature = "serde")]
pub fn started_value_cache(name: &str) -> Cache<String, String> {
  let cache = CacheBuilder::new(name, MANAGER)
    .statistics_enabled(true)
    .bincode()
    .shards(4)
    .build()
    .unwrap();
  cache.start().unwrap();
  cache
}

/// A loader producing `"{key}-loaded"` that counts its calls.
pub fn counting_loader(calls: Arc<AtomicUsize>) -> impl CacheLoader<String, String> {
  from_fn(move |key: &String| -> Result<Option<String>, BoxError> {
    calls.fetch_add(1, Ordering::SeqCst);
    Ok(Some(format!("{key}-loaded")))
  })
}

/// A loader that always fails.
pub fn failing_loader() -> impl CacheLoader<String, String> {
  from_fn(|key: &String| -> Result<Option<String>, BoxError> {
    Err(format!("source unavailable for {key}").into())
  })
}

/// Records every event it receives, in order.
#[derive(Default)]
pub struct RecordingListener {
  pub events: Mutex<Vec<(EventType, String, Option<String>)>>,
}

impl RecordingListener {
  pub fn snapshot(&self) -> Vec<(EventType, String, Option<String>)> {
    self.events.lock().clone()
  }
}

impl CacheEntryListener<String, String> for RecordingListener {
  fn on_event(&self, event: &CacheEntryEvent<String, String>) {
    self.events.lock().push((
      event.event_type,
      event.key.clone(),
      event.value.as_deref().cloned(),
    ));
  }
}

pub fn key(k: &str) -> String {
  k.to_string()
}
