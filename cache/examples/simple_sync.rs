use std::sync::Arc;
use stowage::CacheManager;

fn main() {
  let manager = CacheManager::new("example");

  // Store-by-value caches need serializers; `bincode()` uses serde.
  let by_value = manager
    .cache_builder::<String, Vec<u32>>("by-value")
    .statistics_enabled(true)
    .bincode()
    .build()
    .expect("Failed to build cache");

  let numbers = Arc::new(vec![1, 2, 3]);
  by_value.put("numbers".to_string(), numbers.clone()).unwrap();
  let copy = by_value.get(&"numbers".to_string()).unwrap().unwrap();
  println!(
    "by-value: got {:?}, same allocation as the original: {}",
    copy,
    Arc::ptr_eq(&numbers, &copy)
  );

  // Store-by-reference caches hand back the very Arc that was stored.
  let by_reference = manager
    .cache_builder::<String, Vec<u32>>("by-reference")
    .store_by_value(false)
    .build()
    .expect("Failed to build cache");

  by_reference.put("numbers".to_string(), numbers.clone()).unwrap();
  let shared = by_reference.get(&"numbers".to_string()).unwrap().unwrap();
  println!(
    "by-reference: same allocation as the original: {}",
    Arc::ptr_eq(&numbers, &shared)
  );

  println!("\nStatistics: {:#?}", by_value.statistics().unwrap());
  println!("Caches: {:?}", manager.cache_names());

  manager.shutdown();
  println!("After shutdown, by-value is {}", by_value.status());
}
