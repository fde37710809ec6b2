//! One batch fetched end-to-end, with guaranteed completion reporting.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::batch::{Batch, GroupKey, WorkItem};
use crate::counters::FetchCounters;
use crate::fetcher::Fetcher;
use crate::outcome::{Outcome, OutcomeSink, UrlStatus};

/// Completion report sent back to the dispatch loop, which applies it to
/// the politeness tracker.
#[derive(Debug)]
pub(super) enum TaskEvent {
    Finished { key: GroupKey },
}

/// The capabilities a task gets from its scheduler: completion reporting,
/// the outcome sink, and the shared counters. Injected at construction so
/// tasks are testable against a fake scheduler.
#[derive(Clone)]
pub(super) struct TaskContext {
    pub(super) events: mpsc::UnboundedSender<TaskEvent>,
    pub(super) sink: Arc<dyn OutcomeSink>,
    pub(super) counters: Arc<FetchCounters>,
}

pub(super) struct FetchTask<F> {
    ctx: TaskContext,
    fetcher: Arc<F>,
    batch: Batch,
}

impl<F: Fetcher> FetchTask<F> {
    pub(super) fn new(ctx: TaskContext, fetcher: Arc<F>, batch: Batch) -> Self {
        Self {
            ctx,
            fetcher,
            batch,
        }
    }

    /// Hand the batch back after a rejected submission.
    pub(super) fn into_batch(self) -> Batch {
        self.batch
    }

    /// Fetch every URL in the batch, in order, recording one outcome per
    /// URL. The completion guard reports `Finished` exactly once however
    /// this future ends — including cancellation by the per-task timeout or
    /// an executor abort — and converts unfetched items into interrupted
    /// skips so the cycle still reconciles.
    pub(super) async fn run(self) {
        let Self {
            ctx,
            fetcher,
            batch,
        } = self;
        let mut guard = CompletionGuard {
            ctx,
            key: batch.key,
            remaining: batch.items.into(),
        };

        while let Some(item) = guard.remaining.front().cloned() {
            let fetched = fetcher.fetch(&item).await;
            // Only dequeue once the fetch has resolved: a cancellation
            // mid-fetch leaves the item for the guard to skip.
            guard.remaining.pop_front();
            match fetched {
                Ok(result) => {
                    guard.ctx.counters.add_urls_fetched(1);
                    guard.ctx.sink.record(Outcome::fetched(item, result));
                }
                Err(err) => {
                    tracing::debug!(url = %item.url, "fetch failed: {err}");
                    guard.ctx.counters.add_urls_failed(1);
                    guard.ctx.sink.record(Outcome::failed(item, err.to_string()));
                }
            }
        }
    }
}

/// Runs on every exit path of [`FetchTask::run`]: emits skips for whatever
/// was not fetched and releases the group via the completion channel.
struct CompletionGuard {
    ctx: TaskContext,
    key: GroupKey,
    remaining: VecDeque<WorkItem>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.remaining.is_empty() {
            tracing::warn!(
                group = %self.key,
                unfetched = self.remaining.len(),
                "task ended early, skipping unfetched urls"
            );
            self.ctx.counters.add_urls_skipped(self.remaining.len() as u64);
            for item in self.remaining.drain(..) {
                self.ctx.sink.record(Outcome::skipped(
                    item,
                    UrlStatus::SkippedInterrupted,
                    Some("task cancelled before fetch".to_string()),
                ));
            }
        }
        // The receiver only disappears once the scheduler is done; a send
        // failure then is harmless.
        let _ = self.ctx.events.send(TaskEvent::Finished {
            key: self.key.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Batch;
    use crate::fetcher::{FetchError, FetchPolicy, FetchResult, Fetcher, HttpHeaders};
    use crate::outcome::MemorySink;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FlakyFetcher {
        policy: FetchPolicy,
    }

    #[async_trait]
    impl Fetcher for FlakyFetcher {
        async fn fetch(&self, item: &WorkItem) -> Result<FetchResult, FetchError> {
            if item.url.contains("bad") {
                return Err(FetchError::Http(503));
            }
            Ok(FetchResult {
                final_url: item.url.clone(),
                status_code: 200,
                content_type: Some("text/html".to_string()),
                content: Vec::new(),
                headers: HttpHeaders::new(),
            })
        }

        fn abort(&self) {}

        fn max_threads(&self) -> usize {
            1
        }

        fn policy(&self) -> &FetchPolicy {
            &self.policy
        }
    }

    fn context(sink: Arc<MemorySink>) -> (TaskContext, mpsc::UnboundedReceiver<TaskEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            TaskContext {
                events,
                sink,
                counters: Arc::new(FetchCounters::new()),
            },
            rx,
        )
    }

    fn batch(urls: &[&str]) -> Batch {
        Batch::last(
            GroupKey::new("test:group:1"),
            urls.iter().map(|u| WorkItem::new(*u, 1.0)).collect(),
        )
    }

    #[tokio::test]
    async fn per_url_failure_does_not_abort_the_batch() {
        let sink = Arc::new(MemorySink::new());
        let (ctx, mut rx) = context(Arc::clone(&sink));
        let counters = Arc::clone(&ctx.counters);
        let fetcher = Arc::new(FlakyFetcher {
            policy: FetchPolicy::new(),
        });

        let task = FetchTask::new(
            ctx,
            fetcher,
            batch(&["http://a.test/ok1", "http://a.test/bad", "http://a.test/ok2"]),
        );
        task.run().await;

        assert_eq!(sink.count_status(UrlStatus::Fetched), 2);
        assert_eq!(sink.count_status(UrlStatus::Failed), 1);
        assert_eq!(counters.urls_fetched(), 2);
        assert_eq!(counters.urls_failed(), 1);

        match rx.try_recv() {
            Ok(TaskEvent::Finished { key }) => assert_eq!(key, GroupKey::new("test:group:1")),
            Err(_) => panic!("task must report completion exactly once"),
        }
        assert!(rx.try_recv().is_err(), "no second completion report");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_skips_unfetched_items_and_still_reports() {
        struct SlowFetcher {
            policy: FetchPolicy,
        }

        #[async_trait]
        impl Fetcher for SlowFetcher {
            async fn fetch(&self, item: &WorkItem) -> Result<FetchResult, FetchError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(FetchResult {
                    final_url: item.url.clone(),
                    status_code: 200,
                    content_type: None,
                    content: Vec::new(),
                    headers: HttpHeaders::new(),
                })
            }

            fn abort(&self) {}

            fn max_threads(&self) -> usize {
                1
            }

            fn policy(&self) -> &FetchPolicy {
                &self.policy
            }
        }

        let sink = Arc::new(MemorySink::new());
        let (ctx, mut rx) = context(Arc::clone(&sink));
        let counters = Arc::clone(&ctx.counters);
        let fetcher = Arc::new(SlowFetcher {
            policy: FetchPolicy::new(),
        });

        let task = FetchTask::new(ctx, fetcher, batch(&["http://a.test/1", "http://a.test/2"]));
        let cancelled = tokio::time::timeout(Duration::from_secs(1), task.run()).await;
        assert!(cancelled.is_err(), "task should have been cut off");

        // Both URLs were still unfetched; the guard skips them and reports.
        assert_eq!(sink.count_status(UrlStatus::SkippedInterrupted), 2);
        assert_eq!(counters.urls_skipped(), 2);
        assert!(matches!(rx.try_recv(), Ok(TaskEvent::Finished { .. })));
    }
}
