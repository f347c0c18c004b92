use crate::status::CacheStatus;

use thiserror::Error;

/// A type-erased error produced by a user-supplied `CacheLoader`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// The cache name was empty.
  #[error("cache name cannot be empty")]
  EmptyName,
  /// The owning cache manager name was empty.
  #[error("cache manager name cannot be empty")]
  EmptyManagerName,
  /// The configuration asks for store-by-value semantics, but no key/value
  /// serializers were supplied to the builder.
  #[error("store-by-value requires key and value serializers")]
  SerializerRequired,
}

/// Errors returned by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
  /// The operation requires a started cache.
  #[error("the cache status is not STARTED (current: {status})")]
  IllegalState { status: CacheStatus },

  /// The cache is already owned by a cache manager.
  #[error("a cache can only be associated with a cache manager once")]
  AlreadyManaged,

  /// The cache loader failed.
  #[error("cache loader failed: {0}")]
  Loader(#[source] BoxError),

  /// A key or value could not be converted to or from its stored form.
  #[error("serialization failed: {0}")]
  Serialization(String),

  /// A load task ended without producing a result.
  #[error("load task was abandoned before completing")]
  LoadAbandoned,

  /// The loader worker pool no longer accepts tasks.
  #[error("loader pool has been shut down")]
  Shutdown,

  /// The requested capability is not supported.
  #[error("unsupported operation: {0}")]
  Unsupported(&'static str),
}

/// A specialized `Result` type for cache operations.
pub type Result<T, E = CacheError> = std::result::Result<T, E>;
