use crate::entry::CacheEntry;
use crate::error::{BoxError, CacheError, Result};

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, Thread};

use parking_lot::Mutex;

/// An opaque, caller-supplied argument passed through to a `CacheLoader`.
pub type LoaderArg = Arc<dyn Any + Send + Sync>;

/// An external data source the cache can populate missing entries from.
///
/// Loaders may be called on the caller's thread (a `get` miss) or on one of
/// the cache's loader worker threads (`load`/`load_all`).
pub trait CacheLoader<K, V>: Send + Sync {
  /// Loads the entry for `key`. `Ok(None)` means the source has no value.
  fn load(&self, key: &K, arg: Option<&LoaderArg>) -> Result<Option<CacheEntry<K, V>>, BoxError>;

  /// Loads every key the source has a value for.
  ///
  /// The default implementation calls `load` once per key and fails on the
  /// first error.
  fn load_all(&self, keys: &[K], arg: Option<&LoaderArg>) -> Result<HashMap<K, Arc<V>>, BoxError>
  where
    K: Eq + Hash,
  {
    let mut loaded = HashMap::with_capacity(keys.len());
    for key in keys {
      if let Some(entry) = self.load(key, arg)? {
        let (key, value) = entry.into_parts();
        loaded.insert(key, value);
      }
    }
    Ok(loaded)
  }
}

/// A `CacheLoader` backed by a closure returning the value for a key.
pub struct FnLoader<K, V, F> {
  f: F,
  _marker: PhantomData<fn(&K) -> V>,
}

/// Wraps a closure as a `CacheLoader`.
///
/// ```
/// use stowage::loader::{from_fn, CacheLoader};
///
/// let loader = from_fn(|key: &String| Ok(Some(format!("{key}-loaded"))));
/// let entry = loader.load(&"x".to_string(), None).unwrap().unwrap();
/// assert_eq!(**entry.value(), "x-loaded");
/// ```
pub fn from_fn<K, V, F>(f: F) -> FnLoader<K, V, F>
where
  F: Fn(&K) -> Result<Option<V>, BoxError> + Send + Sync,
{
  FnLoader {
    f,
    _marker: PhantomData,
  }
}

impl<K, V, F> CacheLoader<K, V> for FnLoader<K, V, F>
where
  K: Clone,
  F: Fn(&K) -> Result<Option<V>, BoxError> + Send + Sync,
{
  fn load(&self, key: &K, _arg: Option<&LoaderArg>) -> Result<Option<CacheEntry<K, V>>, BoxError> {
    Ok((self.f)(key)?.map(|value| CacheEntry::new(key.clone(), value)))
  }
}

/// A waiter blocked on a `LoadHandle`.
enum Waiter {
  Sync(Thread),
  Async(Waker),
}

impl Waiter {
  fn wake(self) {
    match self {
      Waiter::Sync(thread) => thread.unpark(),
      Waiter::Async(waker) => waker.wake(),
    }
  }
}

enum State<T> {
  Pending(Option<Waiter>),
  Complete(Result<T>),
  Taken,
}

struct Inner<T> {
  state: Mutex<State<T>>,
}

/// The result of an asynchronous `load` or `load_all`.
///
/// The handle completes once the loaded entries have been written into the
/// cache (or the load failed). It can be waited on from a thread with
/// [`wait`](LoadHandle::wait), polled with [`try_wait`](LoadHandle::try_wait),
/// or `.await`ed. Cancellation is not supported.
#[must_use = "a load handle does nothing unless waited on or polled"]
pub struct LoadHandle<T> {
  inner: Arc<Inner<T>>,
}

/// The producing side of a `LoadHandle`. Dropping it without completing
/// fails the handle with `CacheError::LoadAbandoned`.
pub(crate) struct Completer<T> {
  inner: Option<Arc<Inner<T>>>,
}

pub(crate) fn load_handle<T>() -> (LoadHandle<T>, Completer<T>) {
  let inner = Arc::new(Inner {
    state: Mutex::new(State::Pending(None)),
  });
  (
    LoadHandle {
      inner: inner.clone(),
    },
    Completer { inner: Some(inner) },
  )
}

impl<T> Completer<T> {
  pub(crate) fn complete(mut self, result: Result<T>) {
    if let Some(inner) = self.inner.take() {
      Self::finish(&inner, result);
    }
  }

  fn finish(inner: &Inner<T>, result: Result<T>) {
    let waiter = {
      let mut state = inner.state.lock();
      match std::mem::replace(&mut *state, State::Complete(result)) {
        State::Pending(waiter) => waiter,
        _ => None,
      }
    };
    if let Some(waiter) = waiter {
      waiter.wake();
    }
  }
}

impl<T> Drop for Completer<T> {
  fn drop(&mut self) {
    if let Some(inner) = self.inner.take() {
      Self::finish(&inner, Err(CacheError::LoadAbandoned));
    }
  }
}

impl<T> LoadHandle<T> {
  /// Returns `true` once the load has finished, successfully or not.
  pub fn is_done(&self) -> bool {
    !matches!(*self.inner.state.lock(), State::Pending(_))
  }

  /// Blocks the current thread until the load finishes.
  pub fn wait(self) -> Result<T> {
    loop {
      {
        let mut state = self.inner.state.lock();
        if !matches!(*state, State::Pending(_)) {
          return Self::take(&mut state);
        }
        *state = State::Pending(Some(Waiter::Sync(thread::current())));
      }
      // Spurious wakeups just loop back to the state check.
      thread::park();
    }
  }

  /// Takes the result if the load has finished, without blocking.
  ///
  /// Returns `None` while the load is in flight. After a result has been
  /// taken, further calls return `None` as well.
  pub fn try_wait(&mut self) -> Option<Result<T>> {
    let mut state = self.inner.state.lock();
    if matches!(*state, State::Complete(_)) {
      Some(Self::take(&mut state))
    } else {
      None
    }
  }

  /// Cancellation is not supported: a started load always runs to completion.
  pub fn cancel(&self) -> Result<()> {
    Err(CacheError::Unsupported("cancelling a load"))
  }

  fn take(state: &mut State<T>) -> Result<T> {
    match std::mem::replace(state, State::Taken) {
      State::Complete(result) => result,
      // `wait` consumes the handle and `try_wait` only takes completed
      // results, so a second take cannot be observed through the public API.
      _ => Err(CacheError::LoadAbandoned),
    }
  }
}

impl<T> Future for LoadHandle<T> {
  type Output = Result<T>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let mut state = self.inner.state.lock();
    if matches!(*state, State::Pending(_)) {
      *state = State::Pending(Some(Waiter::Async(cx.waker().clone())));
      return Poll::Pending;
    }
    Poll::Ready(Self::take(&mut state))
  }
}

impl<T> fmt::Debug for LoadHandle<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LoadHandle")
      .field("done", &self.is_done())
      .finish()
  }
}
