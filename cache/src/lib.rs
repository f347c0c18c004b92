//! A pluggable, concurrent, in-process cache.
//!
//! # Features
//! - **Storage Semantics**: Store keys and values by value (isolated serialized
//!   copies) or by reference (the `Arc` you put is the `Arc` you get).
//! - **Write-Through Loading**: A `CacheLoader` populates misses on `get`, and
//!   `load`/`load_all` populate keys in the background on a small worker pool.
//! - **Listeners**: Observe entry creation, update and removal, synchronously
//!   or on a dedicated notifier thread.
//! - **Statistics**: Optional puts/removals/hits/misses counters.
//! - **Registry**: A `CacheManager` owns named caches and their lifecycle.
//!
//! ```
//! use stowage::CacheManager;
//!
//! let manager = CacheManager::new("app");
//! let cache = manager
//!   .cache_builder::<String, u64>("users")
//!   .store_by_value(false)
//!   .build()
//!   .unwrap();
//!
//! cache.put("alice".to_string(), 42).unwrap();
//! assert_eq!(cache.get(&"alice".to_string()).unwrap().as_deref(), Some(&42));
//! ```

// Public modules that form the API
pub mod builder;
pub mod config;
pub mod error;
pub mod handles;
pub mod iter;
pub mod listener;
pub mod loader;
pub mod manager;
pub mod metrics;
pub mod serializer;
pub mod status;

// Internal, crate-only modules
mod entry;
mod shared;
mod storage;
mod store;
mod task;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use config::CacheConfiguration;
pub use entry::CacheEntry;
pub use error::{BoxError, BuildError, CacheError, Result};
pub use handles::Cache;
pub use iter::{Cursor, Iter};
pub use listener::{CacheEntryEvent, CacheEntryListener, EventType, ListenerRegistration, NotificationScope};
pub use loader::{CacheLoader, LoadHandle, LoaderArg};
pub use manager::{CacheManager, OptionalFeature};
pub use metrics::StatisticsSnapshot;
#[cfg(feature = "serde")]
pub use serializer::BincodeSerializer;
pub use serializer::Serializer;
pub use status::CacheStatus;
