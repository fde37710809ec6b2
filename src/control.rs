//! Cooperative shutdown for the dispatch loop.
//!
//! The scheduler hands out a [`ShutdownHandle`] before it starts running;
//! any holder (signal handler, orchestration layer) can request a stop. The
//! dispatch loop checks the token once per iteration and switches to the
//! drain path, so every queued batch still receives an explicit outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop token. Cloning is cheap; all clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a cooperative stop. Idempotent.
    pub fn request(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
