use std::thread;
use std::time::Duration;
use stowage::loader::from_fn;
use stowage::{BoxError, CacheManager, CacheConfiguration};

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter("stowage=debug")
    .init();

  let manager = CacheManager::with_default_configuration(
    "loaders",
    CacheConfiguration::default().store_by_value(false),
  );

  // Pretend to be a slow backing store.
  let cache = manager
    .cache_builder::<u64, String>("users")
    .loader(from_fn(|id: &u64| -> Result<Option<String>, BoxError> {
      thread::sleep(Duration::from_millis(50));
      if *id == 0 {
        return Ok(None);
      }
      Ok(Some(format!("user-{id}")))
    }))
    .build()
    .expect("Failed to build cache");

  // A miss on `get` loads synchronously and writes through.
  println!("get(7) -> {:?}", cache.get(&7).unwrap());

  // `load_all` runs on the cache's loader threads and skips present keys.
  let handle = cache
    .load_all(vec![0, 1, 2, 7], None, None)
    .unwrap()
    .expect("a loader is configured");
  let loaded = handle.await.unwrap();
  println!("load_all loaded {} new entries: {:?}", loaded.len(), loaded);

  // A single-key load can also be waited on from a plain thread.
  let handle = cache.load(3, None, None).unwrap().unwrap();
  let waited = thread::spawn(move || handle.wait()).join().unwrap();
  println!("load(3) -> {:?}", waited.unwrap());

  println!("cache now holds {} entries", cache.len().unwrap());
  manager.shutdown();
}
