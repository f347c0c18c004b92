use crate::task::notifier::Notifier;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

/// The kind of mutation a `CacheEntryEvent` describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
  /// A mapping was added for a key that had none.
  Created,
  /// The value of an existing mapping was overwritten.
  Updated,
  /// A mapping was removed.
  Removed,
}

impl fmt::Display for EventType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EventType::Created => write!(f, "created"),
      EventType::Updated => write!(f, "updated"),
      EventType::Removed => write!(f, "removed"),
    }
  }
}

/// Which events a listener wants to see, by origin.
///
/// A cache only ever produces local events, so a listener registered with
/// `Remote` is kept in the registry but never called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationScope {
  Local,
  Remote,
  All,
}

impl NotificationScope {
  #[inline]
  pub(crate) fn accepts_local(self) -> bool {
    matches!(self, NotificationScope::Local | NotificationScope::All)
  }
}

/// A mutation of a single cache entry.
#[derive(Debug)]
pub struct CacheEntryEvent<K, V> {
  pub event_type: EventType,
  pub key: K,
  /// The new value for `Created`/`Updated`, the removed value for `Removed`
  /// when the operation observed it.
  pub value: Option<Arc<V>>,
}

/// An observer that can be registered with a cache to be told about entry
/// mutations.
///
/// Synchronous listeners run on the thread that performed the mutation,
/// after it has been applied. Asynchronous listeners run on the cache's
/// notifier thread, in the order the mutations were dispatched.
pub trait CacheEntryListener<K, V>: Send + Sync {
  fn on_event(&self, event: &CacheEntryEvent<K, V>);
}

/// A listener together with its scope and synchronicity.
///
/// Equality is by listener identity only: the same listener cannot be
/// registered twice with different scopes.
pub struct ListenerRegistration<K, V> {
  listener: Arc<dyn CacheEntryListener<K, V>>,
  scope: NotificationScope,
  synchronous: bool,
}

impl<K, V> ListenerRegistration<K, V> {
  pub fn new(
    listener: Arc<dyn CacheEntryListener<K, V>>,
    scope: NotificationScope,
    synchronous: bool,
  ) -> Self {
    Self {
      listener,
      scope,
      synchronous,
    }
  }

  pub fn listener(&self) -> &Arc<dyn CacheEntryListener<K, V>> {
    &self.listener
  }

  pub fn scope(&self) -> NotificationScope {
    self.scope
  }

  pub fn is_synchronous(&self) -> bool {
    self.synchronous
  }

  #[inline]
  fn is_for(&self, listener: &Arc<dyn CacheEntryListener<K, V>>) -> bool {
    same_listener(&self.listener, listener)
  }
}

impl<K, V> Clone for ListenerRegistration<K, V> {
  fn clone(&self) -> Self {
    Self {
      listener: self.listener.clone(),
      scope: self.scope,
      synchronous: self.synchronous,
    }
  }
}

impl<K, V> PartialEq for ListenerRegistration<K, V> {
  fn eq(&self, other: &Self) -> bool {
    same_listener(&self.listener, &other.listener)
  }
}

impl<K, V> Eq for ListenerRegistration<K, V> {}

impl<K, V> fmt::Debug for ListenerRegistration<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ListenerRegistration")
      .field("listener", &Arc::as_ptr(&self.listener).cast::<()>())
      .field("scope", &self.scope)
      .field("synchronous", &self.synchronous)
      .finish()
  }
}

/// Compares the data pointers, ignoring vtables.
#[inline]
fn same_listener<K, V>(
  a: &Arc<dyn CacheEntryListener<K, V>>,
  b: &Arc<dyn CacheEntryListener<K, V>>,
) -> bool {
  std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

/// The concurrency-safe set of listeners registered with one cache.
pub(crate) struct ListenerRegistry<K, V> {
  registrations: RwLock<Vec<ListenerRegistration<K, V>>>,
  notifier: Notifier<K, V>,
}

impl<K, V> ListenerRegistry<K, V>
where
  K: Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  pub(crate) fn new(cache_name: &str) -> Self {
    Self {
      registrations: RwLock::new(Vec::new()),
      notifier: Notifier::new(cache_name),
    }
  }

  /// Adds the registration unless its listener is already present.
  pub(crate) fn register(&self, registration: ListenerRegistration<K, V>) -> bool {
    let mut guard = self.registrations.write();
    if guard.iter().any(|r| r == &registration) {
      return false;
    }
    guard.push(registration);
    true
  }

  /// Removes the registration of `listener`, whatever its scope.
  pub(crate) fn unregister(&self, listener: &Arc<dyn CacheEntryListener<K, V>>) -> bool {
    let mut guard = self.registrations.write();
    let before = guard.len();
    guard.retain(|r| !r.is_for(listener));
    guard.len() != before
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.registrations.read().is_empty()
  }

  pub(crate) fn registrations(&self) -> Vec<ListenerRegistration<K, V>> {
    self.registrations.read().clone()
  }

  /// Delivers a local event to every interested listener.
  ///
  /// The registration list is copied before any listener runs, so a listener
  /// may register or unregister listeners without deadlocking.
  pub(crate) fn notify(&self, event: CacheEntryEvent<K, V>) {
    let targets: Vec<ListenerRegistration<K, V>> = {
      let guard = self.registrations.read();
      guard
        .iter()
        .filter(|r| r.scope.accepts_local())
        .cloned()
        .collect()
    };
    if targets.is_empty() {
      return;
    }

    let event = Arc::new(event);
    for registration in targets {
      if registration.synchronous {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
          registration.listener.on_event(&event)
        }));
        if outcome.is_err() {
          tracing::error!(
            event_type = %event.event_type,
            "synchronous cache entry listener panicked"
          );
        }
      } else {
        self.notifier.dispatch(registration.listener, event.clone());
      }
    }
  }
}

impl<K, V> ListenerRegistry<K, V> {
  pub(crate) fn len(&self) -> usize {
    self.registrations.read().len()
  }

  /// Stops the notifier thread. Events already queued are still delivered.
  pub(crate) fn shutdown(&self) {
    self.notifier.stop();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Noop;
  impl CacheEntryListener<u32, u32> for Noop {
    fn on_event(&self, _event: &CacheEntryEvent<u32, u32>) {}
  }

  #[test]
  fn identity_decides_membership() {
    let registry = ListenerRegistry::<u32, u32>::new("test");
    let a: Arc<dyn CacheEntryListener<u32, u32>> = Arc::new(Noop);
    let b: Arc<dyn CacheEntryListener<u32, u32>> = Arc::new(Noop);

    assert!(registry.register(ListenerRegistration::new(a.clone(), NotificationScope::Local, true)));
    assert!(!registry.register(ListenerRegistration::new(a.clone(), NotificationScope::All, false)));
    assert!(registry.register(ListenerRegistration::new(b.clone(), NotificationScope::Local, true)));
    assert_eq!(registry.len(), 2);

    // The first registration's scope is the one that stuck.
    let kept = registry
      .registrations()
      .into_iter()
      .find(|r| same_listener(r.listener(), &a))
      .unwrap();
    assert_eq!(kept.scope(), NotificationScope::Local);
    assert!(kept.is_synchronous());

    assert!(registry.unregister(&a));
    assert!(!registry.unregister(&a));
    assert_eq!(registry.len(), 1);
  }
}
