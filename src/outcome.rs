//! Per-URL terminal outcomes and the sink they are delivered to.
//!
//! Every work item that enters the scheduler leaves it through exactly one
//! [`Outcome`]: fetched, failed, or explicitly skipped with a reason. The
//! sink is append-only; reconciling URLs in against outcomes out is how a
//! crawl cycle proves nothing was silently dropped.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::batch::WorkItem;
use crate::fetcher::FetchResult;

/// Terminal status for one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlStatus {
    /// Fetch completed; the outcome carries the fetch result.
    Fetched,
    /// Dropped because the crawl deadline passed or the group was blocked
    /// under the skip-blocked policy.
    SkippedTimeLimit,
    /// Dropped because the fetch pool rejected the batch at submit time.
    SkippedDeferred,
    /// Dropped because the cycle was interrupted or the task was cancelled
    /// before this URL was fetched.
    SkippedInterrupted,
    /// The fetch itself failed; the detail field carries the error.
    Failed,
}

/// One work item's terminal record.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub item: WorkItem,
    pub status: UrlStatus,
    /// Present only for `Fetched`.
    pub result: Option<FetchResult>,
    /// Diagnostic detail: the fetch error, or why the item was skipped.
    pub detail: Option<String>,
}

impl Outcome {
    pub fn fetched(item: WorkItem, result: FetchResult) -> Self {
        Self {
            item,
            status: UrlStatus::Fetched,
            result: Some(result),
            detail: None,
        }
    }

    pub fn failed(item: WorkItem, detail: String) -> Self {
        Self {
            item,
            status: UrlStatus::Failed,
            result: None,
            detail: Some(detail),
        }
    }

    pub fn skipped(item: WorkItem, status: UrlStatus, detail: Option<String>) -> Self {
        Self {
            item,
            status,
            result: None,
            detail,
        }
    }
}

/// Append-only receiver of outcome records.
///
/// `record` is synchronous so it can be called from drop guards on the
/// cancellation path; implementations should hand off quickly (buffer,
/// channel) rather than block.
pub trait OutcomeSink: Send + Sync {
    fn record(&self, outcome: Outcome);
}

/// Sink that buffers outcomes in memory. Suitable for tests and small
/// cycles; production embedders typically forward to their own pipeline.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Outcome>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<Outcome> {
        self.records.lock().unwrap().clone()
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<Outcome> {
        std::mem::take(&mut *self.records.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_status(&self, status: UrlStatus) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.status == status)
            .count()
    }
}

impl OutcomeSink for MemorySink {
    fn record(&self, outcome: Outcome) {
        self.records.lock().unwrap().push(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_counts_by_status() {
        let sink = MemorySink::new();
        sink.record(Outcome::skipped(
            WorkItem::new("http://a.test/1", 1.0),
            UrlStatus::SkippedTimeLimit,
            None,
        ));
        sink.record(Outcome::skipped(
            WorkItem::new("http://a.test/2", 1.0),
            UrlStatus::SkippedTimeLimit,
            None,
        ));
        sink.record(Outcome::failed(
            WorkItem::new("http://a.test/3", 1.0),
            "connection refused".to_string(),
        ));

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.count_status(UrlStatus::SkippedTimeLimit), 2);
        assert_eq!(sink.count_status(UrlStatus::Failed), 1);
        assert_eq!(sink.count_status(UrlStatus::Fetched), 0);

        let drained = sink.drain();
        assert_eq!(drained.len(), 3);
        assert!(sink.is_empty());
    }
}
