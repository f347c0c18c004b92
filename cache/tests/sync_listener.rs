mod common;

use common::{counting_loader, key, started_reference_cache, RecordingListener, MANAGER};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use stowage::{
  CacheBuilder, CacheEntryEvent, CacheEntryListener, EventType, NotificationScope,
};

fn as_listener(listener: &Arc<RecordingListener>) -> Arc<dyn CacheEntryListener<String, String>> {
  listener.clone()
}

fn wait_for_events(listener: &RecordingListener, count: usize) {
  let deadline = Instant::now() + Duration::from_secs(2);
  while listener.events.lock().len() < count {
    assert!(Instant::now() < deadline, "timed out waiting for listener events");
    thread::sleep(Duration::from_millis(5));
  }
}

#[test]
fn test_registering_the_same_listener_twice_keeps_one() {
  let cache = started_reference_cache("listener-identity");
  let listener = as_listener(&Arc::new(RecordingListener::default()));

  assert!(cache.register_listener(listener.clone(), NotificationScope::Local, true));
  assert!(!cache.register_listener(listener.clone(), NotificationScope::All, false));
  let registrations = cache.listener_registrations();
  assert_eq!(registrations.len(), 1);
  assert_eq!(registrations[0].scope(), NotificationScope::Local);

  assert!(cache.unregister_listener(&listener));
  assert!(cache.listener_registrations().is_empty());
  assert!(!cache.unregister_listener(&listener));
}

#[test]
fn test_synchronous_listener_sees_every_mutation_in_order() {
  let cache = started_reference_cache("listener-sync");
  let recorder = Arc::new(RecordingListener::default());
  cache.register_listener(as_listener(&recorder), NotificationScope::Local, true);

  cache.put(key("k"), "v1".to_string()).unwrap();
  cache.put(key("k"), "v2".to_string()).unwrap();
  assert!(!cache.put_if_absent(key("k"), "ignored".to_string()).unwrap());
  cache.replace(&key("k"), "v3".to_string()).unwrap();
  cache.remove(&key("k")).unwrap();
  cache.remove(&key("k")).unwrap();

  // Synchronous delivery: everything is recorded by the time the calls return.
  assert_eq!(
    recorder.snapshot(),
    vec![
      (EventType::Created, key("k"), Some("v1".to_string())),
      (EventType::Updated, key("k"), Some("v2".to_string())),
      (EventType::Updated, key("k"), Some("v3".to_string())),
      (EventType::Removed, key("k"), None),
    ]
  );
}

#[test]
fn test_remove_all_notifies_each_removed_entry() {
  let cache = started_reference_cache("listener-remove-all");
  let recorder = Arc::new(RecordingListener::default());
  cache.put_all(vec![(key("a"), "1".to_string()), (key("b"), "2".to_string())]).unwrap();
  cache.register_listener(as_listener(&recorder), NotificationScope::All, true);

  cache.remove_all().unwrap();
  let mut removed: Vec<_> = recorder
    .snapshot()
    .into_iter()
    .map(|(event_type, k, v)| {
      assert_eq!(event_type, EventType::Removed);
      (k, v)
    })
    .collect();
  removed.sort();
  assert_eq!(
    removed,
    vec![(key("a"), Some("1".to_string())), (key("b"), Some("2".to_string()))]
  );
}

#[test]
fn test_loader_writes_are_notified() {
  let calls = Arc::new(AtomicUsize::new(0));
  let recorder = Arc::new(RecordingListener::default());
  let cache = CacheBuilder::<String, String>::new("listener-loader", MANAGER)
    .store_by_value(false)
    .loader(counting_loader(calls))
    .register_listener(as_listener(&recorder), NotificationScope::Local, true)
    .build()
    .unwrap();
  cache.start().unwrap();

  cache.get(&key("x")).unwrap();
  assert_eq!(
    recorder.snapshot(),
    vec![(EventType::Created, key("x"), Some("x-loaded".to_string()))]
  );
}

#[test]
fn test_remote_scoped_listeners_never_fire() {
  let cache = started_reference_cache("listener-remote");
  let recorder = Arc::new(RecordingListener::default());
  cache.register_listener(as_listener(&recorder), NotificationScope::Remote, true);

  cache.put(key("k"), "v".to_string()).unwrap();
  assert!(recorder.snapshot().is_empty());
}

#[test]
fn test_asynchronous_listener_preserves_order() {
  let cache = started_reference_cache("listener-async");
  let recorder = Arc::new(RecordingListener::default());
  cache.register_listener(as_listener(&recorder), NotificationScope::Local, false);

  for i in 0..50 {
    cache.put(key("k"), format!("v{i}")).unwrap();
  }
  wait_for_events(&recorder, 50);

  let values: Vec<_> = recorder.snapshot().into_iter().map(|(_, _, v)| v.unwrap()).collect();
  let expected: Vec<_> = (0..50).map(|i| format!("v{i}")).collect();
  assert_eq!(values, expected);
}

struct Panicking {
  calls: AtomicUsize,
}

impl CacheEntryListener<String, String> for Panicking {
  fn on_event(&self, _event: &CacheEntryEvent<String, String>) {
    self.calls.fetch_add(1, Ordering::SeqCst);
    panic!("listener failure");
  }
}

#[test]
fn test_a_panicking_listener_does_not_fail_the_operation() {
  let cache = started_reference_cache("listener-panic");
  let panicking = Arc::new(Panicking {
    calls: AtomicUsize::new(0),
  });
  let recorder = Arc::new(RecordingListener::default());
  cache.register_listener(panicking.clone(), NotificationScope::Local, true);
  cache.register_listener(as_listener(&recorder), NotificationScope::Local, true);

  cache.put(key("k"), "v".to_string()).unwrap();
  assert_eq!(panicking.calls.load(Ordering::SeqCst), 1);
  assert_eq!(recorder.snapshot().len(), 1);
  assert_eq!(*cache.get(&key("k")).unwrap().unwrap(), "v");
}
