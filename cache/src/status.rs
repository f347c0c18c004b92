use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// The coarse-grained lifecycle state of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStatus {
  /// Built but not yet started.
  Uninitialised,
  /// Usable.
  Started,
  /// `stop()` is in progress.
  Stopping,
  /// Stopped; all data operations fail.
  Stopped,
}

impl CacheStatus {
  fn from_u8(raw: u8) -> Self {
    match raw {
      0 => CacheStatus::Uninitialised,
      1 => CacheStatus::Started,
      2 => CacheStatus::Stopping,
      _ => CacheStatus::Stopped,
    }
  }

  fn as_u8(self) -> u8 {
    match self {
      CacheStatus::Uninitialised => 0,
      CacheStatus::Started => 1,
      CacheStatus::Stopping => 2,
      CacheStatus::Stopped => 3,
    }
  }
}

impl fmt::Display for CacheStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CacheStatus::Uninitialised => write!(f, "UNINITIALISED"),
      CacheStatus::Started => write!(f, "STARTED"),
      CacheStatus::Stopping => write!(f, "STOPPING"),
      CacheStatus::Stopped => write!(f, "STOPPED"),
    }
  }
}

/// An atomically readable and writable `CacheStatus`.
///
/// Writes use `Release` and reads use `Acquire`, so a transition made by one
/// thread is observed by the next read on any other thread.
#[derive(Debug)]
pub(crate) struct AtomicStatus(AtomicU8);

impl AtomicStatus {
  pub(crate) fn new(status: CacheStatus) -> Self {
    Self(AtomicU8::new(status.as_u8()))
  }

  #[inline]
  pub(crate) fn load(&self) -> CacheStatus {
    CacheStatus::from_u8(self.0.load(Ordering::Acquire))
  }

  #[inline]
  pub(crate) fn store(&self, status: CacheStatus) {
    self.0.store(status.as_u8(), Ordering::Release);
  }
}
