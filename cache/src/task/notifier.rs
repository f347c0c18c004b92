use crate::listener::{CacheEntryEvent, CacheEntryListener};

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;

/// A message sent to the notifier thread.
pub(crate) type Notification<K, V> = (
  Arc<dyn CacheEntryListener<K, V>>,
  Arc<CacheEntryEvent<K, V>>,
);

enum State<K, V> {
  Idle,
  Running(Sender<Notification<K, V>>),
  Stopped,
}

/// The background thread responsible for calling asynchronous listeners.
///
/// The thread is spawned on the first asynchronous dispatch. Once stopped it
/// never restarts and further dispatches are dropped.
pub(crate) struct Notifier<K, V> {
  state: Mutex<State<K, V>>,
  thread_name: String,
}

impl<K, V> Notifier<K, V>
where
  K: Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  pub(crate) fn new(cache_name: &str) -> Self {
    Self {
      state: Mutex::new(State::Idle),
      thread_name: format!("stowage-notifier-{}", cache_name),
    }
  }

  pub(crate) fn dispatch(
    &self,
    listener: Arc<dyn CacheEntryListener<K, V>>,
    event: Arc<CacheEntryEvent<K, V>>,
  ) {
    let mut state = self.state.lock();
    if let State::Idle = *state {
      match self.spawn() {
        Some(sender) => *state = State::Running(sender),
        None => return,
      }
    }
    if let State::Running(sender) = &*state {
      // Unbounded, so this never blocks while the state lock is held.
      let _ = sender.send((listener, event));
    }
  }

  fn spawn(&self) -> Option<Sender<Notification<K, V>>> {
    let (tx, rx) = unbounded::<Notification<K, V>>();
    let spawned = thread::Builder::new()
      .name(self.thread_name.clone())
      .spawn(move || {
        // Ends once every sender is gone and the queue is drained.
        while let Ok((listener, event)) = rx.recv() {
          let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(&event)));
          if outcome.is_err() {
            tracing::error!(
              event_type = %event.event_type,
              "asynchronous cache entry listener panicked"
            );
          }
        }
      });

    match spawned {
      Ok(_) => Some(tx),
      Err(e) => {
        tracing::error!(error = %e, "failed to spawn cache notifier thread");
        None
      }
    }
  }
}

impl<K, V> Notifier<K, V> {
  /// Disconnects the queue. The thread exits after delivering what was
  /// already queued; this call does not wait for it.
  pub(crate) fn stop(&self) {
    *self.state.lock() = State::Stopped;
  }
}
