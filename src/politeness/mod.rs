//! Per-group politeness state: the single source of truth for which groups
//! may fetch now.
//!
//! A group is either *active* (a task is fetching it right now), *pending*
//! (idle, allowed to run again at its recorded next-fetch time), or unknown
//! (immediately eligible). The tracker is owned by the dispatch loop; worker
//! tasks report completion over a channel and the loop applies [`finish`]
//! on their behalf, so every transition touches both maps in one place.
//!
//! [`finish`]: PolitenessTracker::finish

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::batch::GroupKey;

/// Scheduled next fetch for an active group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextFetch {
    /// The group may fetch its next batch once this time has passed.
    At(Instant),
    /// No further batches are expected for this group this cycle.
    LastBatch,
}

#[derive(Debug, Default)]
pub struct PolitenessTracker {
    active: HashMap<GroupKey, NextFetch>,
    pending: HashMap<GroupKey, Instant>,
}

impl PolitenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the group is being fetched, or idle with a next-fetch
    /// time still in the future.
    pub fn is_blocked(&self, key: &GroupKey) -> bool {
        if self.active.contains_key(key) {
            return true;
        }
        match self.pending.get(key) {
            Some(next) => *next > Instant::now(),
            None => false,
        }
    }

    /// Mark the group as being fetched, recording when it may run again.
    ///
    /// Panics if the group is already active: two in-flight tasks for one
    /// group means the dispatch bookkeeping is broken, and silently
    /// continuing would violate the per-group ordering guarantee.
    pub fn activate(&mut self, key: &GroupKey, next: NextFetch) {
        if self.active.contains_key(key) {
            panic!("activate called on already-active group: {key}");
        }
        tracing::trace!(group = %key, "making group active");
        self.pending.remove(key);
        self.active.insert(key.clone(), next);
    }

    /// Push an active group's next-fetch time forward by the wall-clock
    /// overhead spent dispatching, so the crawl delay is measured from
    /// dispatch completion rather than submission. No-op for last batches
    /// and zero deltas.
    pub fn adjust_active(&mut self, key: &GroupKey, delta: Duration) {
        if delta.is_zero() {
            return;
        }
        if let Some(NextFetch::At(next)) = self.active.get_mut(key) {
            *next += delta;
        }
    }

    /// Release the group's active state: the sole exit from `active`.
    /// A last batch drops the group entirely; otherwise the recorded
    /// next-fetch time becomes its pending entry.
    ///
    /// Panics if the group is not active — a completion report for a group
    /// the tracker never activated indicates a bookkeeping bug upstream.
    pub fn finish(&mut self, key: &GroupKey) {
        match self.active.remove(key) {
            Some(NextFetch::At(next)) => {
                tracing::trace!(group = %key, "finished batch, group pending until {:?}", next);
                self.pending.insert(key.clone(), next);
            }
            Some(NextFetch::LastBatch) => {
                tracing::trace!(group = %key, "finished last batch, dropping group");
            }
            None => panic!("finish called on non-active group: {key}"),
        }
    }

    pub fn is_active(&self, key: &GroupKey) -> bool {
        self.active.contains_key(key)
    }

    pub fn is_pending(&self, key: &GroupKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> GroupKey {
        GroupKey::new(s)
    }

    #[tokio::test]
    async fn unknown_group_is_immediately_eligible() {
        let tracker = PolitenessTracker::new();
        assert!(!tracker.is_blocked(&key("a")));
    }

    #[tokio::test]
    async fn active_group_is_blocked_until_finished() {
        let mut tracker = PolitenessTracker::new();
        let k = key("a");
        tracker.activate(&k, NextFetch::At(Instant::now()));
        assert!(tracker.is_blocked(&k));
        assert!(tracker.is_active(&k));
        assert!(!tracker.is_pending(&k));

        tracker.finish(&k);
        assert!(!tracker.is_active(&k));
        assert!(tracker.is_pending(&k));
        // next-fetch time already reached: eligible again
        assert!(!tracker.is_blocked(&k));
    }

    #[tokio::test]
    async fn pending_group_blocks_until_next_fetch_time() {
        let mut tracker = PolitenessTracker::new();
        let k = key("a");
        tracker.activate(&k, NextFetch::At(Instant::now() + Duration::from_secs(60)));
        tracker.finish(&k);
        assert!(tracker.is_pending(&k));
        assert!(tracker.is_blocked(&k));
    }

    #[tokio::test]
    async fn last_batch_finish_drops_the_group() {
        let mut tracker = PolitenessTracker::new();
        let k = key("a");
        tracker.activate(&k, NextFetch::LastBatch);
        tracker.finish(&k);
        assert!(!tracker.is_active(&k));
        assert!(!tracker.is_pending(&k));
        assert!(!tracker.is_blocked(&k));
    }

    #[tokio::test]
    async fn group_is_never_active_and_pending_at_once() {
        let mut tracker = PolitenessTracker::new();
        let k = key("a");
        for _ in 0..3 {
            tracker.activate(&k, NextFetch::At(Instant::now() + Duration::from_secs(60)));
            assert!(tracker.is_active(&k) && !tracker.is_pending(&k));
            tracker.finish(&k);
            assert!(!tracker.is_active(&k) && tracker.is_pending(&k));
            // re-activating must pull it back out of pending
        }
        assert_eq!(tracker.active_count(), 0);
        assert_eq!(tracker.pending_count(), 1);
    }

    #[tokio::test]
    async fn adjust_active_pushes_next_fetch_forward() {
        let mut tracker = PolitenessTracker::new();
        let k = key("a");
        let base = Instant::now() + Duration::from_secs(10);
        tracker.activate(&k, NextFetch::At(base));
        tracker.adjust_active(&k, Duration::from_secs(5));
        tracker.finish(&k);
        assert!(tracker.is_blocked(&k));
        // the pending deadline moved: still blocked well past the base time
        match tracker.pending.get(&k) {
            Some(next) => assert_eq!(*next, base + Duration::from_secs(5)),
            None => panic!("group should be pending"),
        }
    }

    #[tokio::test]
    async fn adjust_active_ignores_last_batches_and_zero_deltas() {
        let mut tracker = PolitenessTracker::new();
        let k = key("a");
        tracker.activate(&k, NextFetch::LastBatch);
        tracker.adjust_active(&k, Duration::from_secs(5));
        tracker.finish(&k);
        assert!(!tracker.is_pending(&k));

        let base = Instant::now() + Duration::from_secs(10);
        tracker.activate(&k, NextFetch::At(base));
        tracker.adjust_active(&k, Duration::ZERO);
        tracker.finish(&k);
        assert_eq!(tracker.pending.get(&k), Some(&base));
    }

    #[test]
    #[should_panic(expected = "finish called on non-active group")]
    fn finish_on_non_active_group_panics() {
        let mut tracker = PolitenessTracker::new();
        tracker.finish(&key("never-activated"));
    }

    #[test]
    #[should_panic(expected = "activate called on already-active group")]
    fn activate_on_active_group_panics() {
        let mut tracker = PolitenessTracker::new();
        let k = key("a");
        tracker.activate(&k, NextFetch::LastBatch);
        tracker.activate(&k, NextFetch::LastBatch);
    }
}
