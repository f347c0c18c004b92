use std::sync::Arc;
use std::thread;
use std::time::Duration;
use stowage::{
  CacheBuilder, CacheEntryEvent, CacheEntryListener, NotificationScope,
};

struct PrintingListener {
  label: &'static str,
}

impl CacheEntryListener<String, u32> for PrintingListener {
  fn on_event(&self, event: &CacheEntryEvent<String, u32>) {
    println!(
      "[{}] {} {} -> {:?} (on {:?})",
      self.label,
      event.event_type,
      event.key,
      event.value.as_deref(),
      thread::current().name().unwrap_or("unnamed"),
    );
  }
}

fn main() {
  let inline = Arc::new(PrintingListener { label: "sync" });
  let background = Arc::new(PrintingListener { label: "async" });

  let cache = CacheBuilder::<String, u32>::new("scores", "example")
    .store_by_value(false)
    .register_listener(inline, NotificationScope::Local, true)
    .register_listener(background, NotificationScope::All, false)
    .build()
    .expect("Failed to build cache");
  cache.start().unwrap();

  cache.put("alice".to_string(), 10).unwrap();
  cache.put("alice".to_string(), 12).unwrap();
  cache.get_and_remove(&"alice".to_string()).unwrap();

  // Give the notifier thread a moment to drain.
  thread::sleep(Duration::from_millis(100));
  cache.stop();
}
