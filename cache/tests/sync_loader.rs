mod common;

use common::{counting_loader, failing_loader, key, MANAGER};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stowage::loader::from_fn;
use stowage::{BoxError, CacheBuilder, CacheError};

#[test]
fn test_get_loads_once_then_serves_from_storage() {
  let calls = Arc::new(AtomicUsize::new(0));
  let cache = CacheBuilder::<String, String>::new("loading", MANAGER)
    .store_by_value(false)
    .statistics_enabled(true)
    .loader(counting_loader(calls.clone()))
    .build()
    .unwrap();
  cache.start().unwrap();

  let first = cache.get(&key("x")).unwrap().unwrap();
  assert_eq!(*first, "x-loaded");
  let second = cache.get(&key("x")).unwrap().unwrap();
  assert_eq!(*second, "x-loaded");
  assert_eq!(calls.load(Ordering::SeqCst), 1, "loader should run once");

  // A loader write is not an explicit put, and `get` touches no counters.
  let stats = cache.statistics().unwrap().unwrap();
  assert_eq!(stats.puts, 0);
  assert_eq!(stats.hits, 0);
  assert_eq!(stats.misses, 0);
}

#[test]
fn test_loader_miss_returns_none_and_stores_nothing() {
  let cache = CacheBuilder::<String, String>::new("loader-miss", MANAGER)
    .store_by_value(false)
    .loader(from_fn(|_: &String| -> Result<Option<String>, BoxError> { Ok(None) }))
    .build()
    .unwrap();
  cache.start().unwrap();

  assert!(cache.get(&key("x")).unwrap().is_none());
  assert!(!cache.contains_key(&key("x")).unwrap());
}

#[test]
fn test_loader_failure_propagates_from_get() {
  let cache = CacheBuilder::<String, String>::new("loader-failure", MANAGER)
    .store_by_value(false)
    .loader(failing_loader())
    .build()
    .unwrap();
  cache.start().unwrap();

  let err = cache.get(&key("x")).unwrap_err();
  assert!(matches!(err, CacheError::Loader(_)));
  assert!(err.to_string().contains("source unavailable for x"));
  assert!(!cache.contains_key(&key("x")).unwrap());
}

#[test]
fn test_get_all_resolves_misses_through_the_loader() {
  let calls = Arc::new(AtomicUsize::new(0));
  let cache = CacheBuilder::<String, String>::new("get-all-loading", MANAGER)
    .store_by_value(false)
    .loader(counting_loader(calls.clone()))
    .build()
    .unwrap();
  cache.start().unwrap();
  cache.put(key("a"), "cached".to_string()).unwrap();

  let all = cache.get_all(vec![key("a"), key("b")]).unwrap();
  assert_eq!(all[&key("a")].as_deref().map(String::as_str), Some("cached"));
  assert_eq!(all[&key("b")].as_deref().map(String::as_str), Some("b-loaded"));
  assert_eq!(calls.load(Ordering::SeqCst), 1);
  assert!(cache.contains_key(&key("b")).unwrap());
}

#[test]
fn test_explicit_values_are_never_overwritten_by_get() {
  let calls = Arc::new(AtomicUsize::new(0));
  let cache = CacheBuilder::<String, String>::new("no-overwrite", MANAGER)
    .store_by_value(false)
    .loader(counting_loader(calls.clone()))
    .build()
    .unwrap();
  cache.start().unwrap();

  cache.put(key("x"), "explicit".to_string()).unwrap();
  assert_eq!(*cache.get(&key("x")).unwrap().unwrap(), "explicit");
  assert_eq!(calls.load(Ordering::SeqCst), 0);
}
