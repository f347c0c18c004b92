//! This module contains the background workers of a cache: the loader pool
//! that runs `load`/`load_all` jobs, and the notifier that calls
//! asynchronous entry listeners.

pub(crate) mod notifier;
pub(crate) mod pool;
