mod common;

use common::{counting_loader, key, started_reference_cache, MANAGER};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use stowage::CacheBuilder;

#[test]
fn test_concurrent_put_if_absent_has_a_single_winner() {
  let cache = started_reference_cache("concurrent-pia");
  let num_threads = 16;
  let barrier = Arc::new(Barrier::new(num_threads));
  let mut handles = vec![];

  for i in 0..num_threads {
    let cache = cache.clone();
    let barrier = barrier.clone();
    handles.push(thread::spawn(move || {
      barrier.wait();
      cache.put_if_absent(key("contended"), format!("thread-{i}")).unwrap()
    }));
  }

  let winners = handles
    .into_iter()
    .map(|h| h.join().unwrap())
    .filter(|won| *won)
    .count();
  assert_eq!(winners, 1);
  assert_eq!(cache.statistics().unwrap().unwrap().puts, 1);
}

#[test]
fn test_concurrent_compare_and_replace_increments() {
  let cache = started_reference_cache("concurrent-cas");
  cache.put(key("counter"), "0".to_string()).unwrap();

  let num_threads = 8;
  let increments_per_thread = 100;
  let barrier = Arc::new(Barrier::new(num_threads));
  let mut handles = vec![];

  for _ in 0..num_threads {
    let cache = cache.clone();
    let barrier = barrier.clone();
    handles.push(thread::spawn(move || {
      barrier.wait();
      for _ in 0..increments_per_thread {
        loop {
          let current = cache.get(&key("counter")).unwrap().unwrap();
          let next = (current.parse::<u32>().unwrap() + 1).to_string();
          if cache.compare_and_replace(&key("counter"), &current, next).unwrap() {
            break;
          }
        }
      }
    }));
  }

  for handle in handles {
    handle.join().unwrap();
  }

  let total = (num_threads * increments_per_thread).to_string();
  assert_eq!(*cache.get(&key("counter")).unwrap().unwrap(), total);
}

#[test]
fn test_concurrent_misses_may_each_load() {
  let calls = Arc::new(AtomicUsize::new(0));
  let cache = CacheBuilder::<String, String>::new("concurrent-misses", MANAGER)
    .store_by_value(false)
    .loader(counting_loader(calls.clone()))
    .build()
    .unwrap();
  cache.start().unwrap();

  let num_threads = 8;
  let barrier = Arc::new(Barrier::new(num_threads));
  let handles: Vec<_> = (0..num_threads)
    .map(|_| {
      let cache = cache.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        cache.get(&key("x")).unwrap().unwrap()
      })
    })
    .collect();

  for handle in handles {
    assert_eq!(*handle.join().unwrap(), "x-loaded");
  }
  // No single-flight: at least one load, at most one per thread.
  let calls = calls.load(Ordering::SeqCst);
  assert!((1..=num_threads).contains(&calls));
}

#[test]
fn test_mixed_workload_keeps_the_cache_consistent() {
  let cache = started_reference_cache("concurrent-mixed");
  let num_threads = 8;
  let barrier = Arc::new(Barrier::new(num_threads));
  let mut handles = vec![];

  for t in 0..num_threads {
    let cache = cache.clone();
    let barrier = barrier.clone();
    handles.push(thread::spawn(move || {
      barrier.wait();
      for i in 0..200 {
        let k = format!("t{t}-k{}", i % 20);
        match i % 4 {
          0 | 1 => cache.put(k, i.to_string()).unwrap(),
          2 => drop(cache.get(&k).unwrap()),
          _ => drop(cache.remove(&k).unwrap()),
        }
      }
      // Leave one known entry per thread behind.
      cache.put(format!("t{t}-final"), "done".to_string()).unwrap();
    }));
  }

  for handle in handles {
    handle.join().unwrap();
  }

  for t in 0..num_threads {
    assert_eq!(*cache.get(&format!("t{t}-final")).unwrap().unwrap(), "done");
  }
  let iterated = cache.iter().unwrap().count();
  assert_eq!(iterated, cache.len().unwrap());
}
