//! Monotonic fetch counters shared between the dispatch loop and workers.
//!
//! Counters only ever go up within one crawl cycle; consumers read a
//! [`CounterSnapshot`] at the end (or during the run) to reconcile URLs in
//! against outcomes out.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counters for one crawl cycle.
#[derive(Debug, Default)]
pub struct FetchCounters {
    urls_fetched: AtomicU64,
    urls_failed: AtomicU64,
    urls_skipped: AtomicU64,
    batches_dispatched: AtomicU64,
    batches_requeued: AtomicU64,
    tasks_rejected: AtomicU64,
    tasks_timed_out: AtomicU64,
    hard_terminations: AtomicU64,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub urls_fetched: u64,
    pub urls_failed: u64,
    pub urls_skipped: u64,
    pub batches_dispatched: u64,
    pub batches_requeued: u64,
    pub tasks_rejected: u64,
    pub tasks_timed_out: u64,
    pub hard_terminations: u64,
}

impl CounterSnapshot {
    /// Total URLs that received an outcome of any kind.
    pub fn urls_total(&self) -> u64 {
        self.urls_fetched + self.urls_failed + self.urls_skipped
    }
}

impl FetchCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_urls_fetched(&self, n: u64) {
        self.urls_fetched.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_urls_failed(&self, n: u64) {
        self.urls_failed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_urls_skipped(&self, n: u64) {
        self.urls_skipped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_batches_dispatched(&self, n: u64) {
        self.batches_dispatched.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_batches_requeued(&self, n: u64) {
        self.batches_requeued.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_tasks_rejected(&self, n: u64) {
        self.tasks_rejected.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_tasks_timed_out(&self, n: u64) {
        self.tasks_timed_out.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_hard_terminations(&self, n: u64) {
        self.hard_terminations.fetch_add(n, Ordering::Relaxed);
    }

    pub fn urls_fetched(&self) -> u64 {
        self.urls_fetched.load(Ordering::Relaxed)
    }

    pub fn urls_failed(&self) -> u64 {
        self.urls_failed.load(Ordering::Relaxed)
    }

    pub fn urls_skipped(&self) -> u64 {
        self.urls_skipped.load(Ordering::Relaxed)
    }

    pub fn batches_dispatched(&self) -> u64 {
        self.batches_dispatched.load(Ordering::Relaxed)
    }

    pub fn batches_requeued(&self) -> u64 {
        self.batches_requeued.load(Ordering::Relaxed)
    }

    pub fn tasks_rejected(&self) -> u64 {
        self.tasks_rejected.load(Ordering::Relaxed)
    }

    pub fn tasks_timed_out(&self) -> u64 {
        self.tasks_timed_out.load(Ordering::Relaxed)
    }

    pub fn hard_terminations(&self) -> u64 {
        self.hard_terminations.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            urls_fetched: self.urls_fetched(),
            urls_failed: self.urls_failed(),
            urls_skipped: self.urls_skipped(),
            batches_dispatched: self.batches_dispatched(),
            batches_requeued: self.batches_requeued(),
            tasks_rejected: self.tasks_rejected(),
            tasks_timed_out: self.tasks_timed_out(),
            hard_terminations: self.hard_terminations(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_snapshot() {
        let counters = FetchCounters::new();
        counters.add_urls_fetched(3);
        counters.add_urls_skipped(2);
        counters.add_urls_failed(1);
        counters.add_batches_dispatched(2);
        counters.add_tasks_rejected(1);

        let snap = counters.snapshot();
        assert_eq!(snap.urls_fetched, 3);
        assert_eq!(snap.urls_skipped, 2);
        assert_eq!(snap.urls_failed, 1);
        assert_eq!(snap.urls_total(), 6);
        assert_eq!(snap.batches_dispatched, 2);
        assert_eq!(snap.tasks_rejected, 1);
        assert_eq!(snap.hard_terminations, 0);
    }
}
