use crate::error::{CacheError, Result};

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

/// The number of worker threads each cache uses for `load`/`load_all`.
pub(crate) const LOADER_THREADS: usize = 2;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of worker threads executing loader jobs.
///
/// Threads are spawned lazily, on the first submitted job, so caches that
/// never load asynchronously never own a thread.
pub(crate) struct LoaderPool {
  state: Mutex<PoolState>,
  size: usize,
  thread_prefix: String,
}

enum PoolState {
  Idle,
  Running(Sender<Job>),
  Shutdown,
}

impl LoaderPool {
  pub(crate) fn new(cache_name: &str, size: usize) -> Self {
    Self {
      state: Mutex::new(PoolState::Idle),
      size: size.max(1),
      thread_prefix: format!("stowage-loader-{}", cache_name),
    }
  }

  /// Queues a job. Fails with `CacheError::Shutdown` once `shutdown` has been
  /// called.
  pub(crate) fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
    let mut state = self.state.lock();
    if let PoolState::Idle = *state {
      *state = PoolState::Running(self.spawn_workers()?);
    }
    match &*state {
      PoolState::Running(sender) => sender
        .send(Box::new(job))
        .map_err(|_| CacheError::Shutdown),
      _ => Err(CacheError::Shutdown),
    }
  }

  fn spawn_workers(&self) -> Result<Sender<Job>> {
    let (tx, rx) = unbounded::<Job>();
    let mut spawned = 0;
    for i in 0..self.size {
      let rx = rx.clone();
      let result = thread::Builder::new()
        .name(format!("{}-{}", self.thread_prefix, i))
        .spawn(move || worker_loop(rx));
      match result {
        Ok(_) => spawned += 1,
        Err(e) => tracing::error!(error = %e, worker = i, "failed to spawn loader worker"),
      }
    }
    if spawned == 0 {
      return Err(CacheError::Shutdown);
    }
    tracing::debug!(workers = spawned, pool = %self.thread_prefix, "loader pool started");
    Ok(tx)
  }

  /// Stops accepting jobs. Queued and running jobs still finish on the
  /// worker threads; this call does not wait for them.
  pub(crate) fn shutdown(&self) {
    *self.state.lock() = PoolState::Shutdown;
  }

  pub(crate) fn is_shutdown(&self) -> bool {
    matches!(*self.state.lock(), PoolState::Shutdown)
  }
}

fn worker_loop(rx: Receiver<Job>) {
  // Ends once the pool drops its sender and the queue is drained.
  while let Ok(job) = rx.recv() {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
      tracing::error!("loader job panicked");
    }
  }
}
