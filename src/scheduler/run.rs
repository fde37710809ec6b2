//! The dispatch loop: politeness-aware batch dispatch with deadline and
//! shutdown draining.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::batch::Batch;
use crate::config::FetchqConfig;
use crate::control::ShutdownHandle;
use crate::counters::{CounterSnapshot, FetchCounters};
use crate::executor::{Submit, TaskExecutor};
use crate::fetcher::Fetcher;
use crate::outcome::{Outcome, OutcomeSink, UrlStatus};
use crate::politeness::{NextFetch, PolitenessTracker};

use super::mode::ReadinessMode;
use super::queue::BatchQueue;
use super::task::{FetchTask, TaskContext, TaskEvent};

/// End-of-cycle report: the counters plus how the cycle ended.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub counters: CounterSnapshot,
    /// The loop ended on a shutdown request rather than deadline/exhaustion.
    pub interrupted: bool,
    /// The pool had to be hard-terminated; in-flight outcomes may be lost.
    pub forced_termination: bool,
}

/// Orchestrates one crawl cycle: owns the queue, the politeness tracker,
/// and the executor; the only component that sees the whole drain decision.
pub struct FetchScheduler<F: Fetcher> {
    fetcher: Arc<F>,
    queue: BatchQueue,
    tracker: PolitenessTracker,
    executor: TaskExecutor,
    sink: Arc<dyn OutcomeSink>,
    counters: Arc<FetchCounters>,
    events_tx: mpsc::UnboundedSender<TaskEvent>,
    events_rx: mpsc::UnboundedReceiver<TaskEvent>,
    crawl_end: Instant,
    idle_sleep: Duration,
    termination_timeout: Duration,
    shutdown: ShutdownHandle,
}

impl<F: Fetcher> FetchScheduler<F> {
    /// Build a scheduler for one crawl cycle ending at `crawl_end`.
    /// The pool is sized from `fetcher.max_threads()` and the readiness
    /// mode from `fetcher.policy().skip_blocked_groups()`.
    pub fn new(
        fetcher: Arc<F>,
        source: Box<dyn Iterator<Item = Batch> + Send>,
        sink: Arc<dyn OutcomeSink>,
        cfg: &FetchqConfig,
        crawl_end: Instant,
    ) -> Self {
        let counters = Arc::new(FetchCounters::new());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let executor = TaskExecutor::new(
            fetcher.max_threads(),
            cfg.task_timeout(),
            Arc::clone(&counters),
        );
        Self {
            queue: BatchQueue::new(source, cfg.max_queue_memory_items, cfg.spool_dir.clone()),
            tracker: PolitenessTracker::new(),
            executor,
            fetcher,
            sink,
            counters,
            events_tx,
            events_rx,
            crawl_end,
            idle_sleep: cfg.idle_sleep(),
            termination_timeout: cfg.termination_timeout(),
            shutdown: ShutdownHandle::new(),
        }
    }

    /// Token for requesting a cooperative stop; checked once per iteration.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn counters(&self) -> Arc<FetchCounters> {
        Arc::clone(&self.counters)
    }

    /// Run the cycle to completion. Always terminates within the
    /// termination grace of `crawl_end`, and every batch consumed from the
    /// source ends in per-URL outcomes.
    pub async fn run(mut self) -> Result<CrawlSummary> {
        let mode = if self.fetcher.policy().skip_blocked_groups() {
            ReadinessMode::Efficient
        } else {
            ReadinessMode::Polite
        };
        info!(?mode, "starting fetch dispatch loop");

        let mut interrupted = false;
        loop {
            if self.shutdown.is_requested() {
                warn!("shutdown requested, leaving dispatch loop");
                interrupted = true;
                break;
            }
            if Instant::now() >= self.crawl_end {
                debug!("crawl end time reached, leaving dispatch loop");
                break;
            }
            if self.queue.is_empty() {
                break;
            }

            self.apply_finished_events();

            match self.next_ready(mode)? {
                Some(batch) => self.dispatch(batch),
                None => {
                    trace!("nothing ready to fetch, sleeping");
                    tokio::time::sleep(self.idle_sleep).await;
                }
            }
        }

        // Everything still queued gets an explicit skip outcome.
        let status = if interrupted {
            UrlStatus::SkippedInterrupted
        } else {
            UrlStatus::SkippedTimeLimit
        };
        self.drain_remaining(status)?;
        self.apply_finished_events();

        let clean = self.executor.terminate(self.termination_timeout).await;
        if !clean {
            warn!("had to hard-terminate fetching; some in-flight outcomes may be lost");
            self.fetcher.abort();
        }
        self.apply_finished_events();

        let summary = CrawlSummary {
            counters: self.counters.snapshot(),
            interrupted,
            forced_termination: !clean,
        };
        info!(
            fetched = summary.counters.urls_fetched,
            failed = summary.counters.urls_failed,
            skipped = summary.counters.urls_skipped,
            "fetch cycle complete"
        );
        Ok(summary)
    }

    /// Apply completion reports from finished tasks to the tracker. This is
    /// the only place groups leave the active state.
    fn apply_finished_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                TaskEvent::Finished { key } => self.tracker.finish(&key),
            }
        }
    }

    /// Scan for the next batch whose group is not blocked: the queue head
    /// first, then lazy pulls from the source. Blocked batches are handled
    /// per the mode — requeued (Polite), skipped with outcomes (Efficient),
    /// or returned anyway (Rude). `None` means nothing is ready right now.
    fn next_ready(&mut self, mode: ReadinessMode) -> Result<Option<Batch>> {
        loop {
            let head_key = self.queue.peek_queued()?.map(|batch| batch.key.clone());
            let mut head_blocked = false;
            if let Some(key) = head_key {
                if !self.tracker.is_blocked(&key) {
                    return Ok(self.queue.pop_queued()?);
                }
                head_blocked = true;
            }

            if head_blocked {
                match mode {
                    // Leave the head in place; it is re-checked after the
                    // idle sleep once the group frees up.
                    ReadinessMode::Polite => {}
                    ReadinessMode::Rude => return Ok(self.queue.pop_queued()?),
                    ReadinessMode::Efficient => {
                        if let Some(batch) = self.queue.pop_queued()? {
                            trace!(group = %batch.key, urls = batch.len(), "dropping blocked batch");
                            self.skip_batch(&batch, UrlStatus::SkippedTimeLimit, None);
                        }
                        continue;
                    }
                }
            }

            // Nothing usable in the queue; see what the source has.
            let Some(batch) = self.queue.pull_source() else {
                return Ok(None);
            };
            if !self.tracker.is_blocked(&batch.key) {
                return Ok(Some(batch));
            }
            match mode {
                ReadinessMode::Polite => {
                    trace!(group = %batch.key, "group still active or pending, requeueing batch");
                    self.counters.add_batches_requeued(1);
                    self.queue.requeue(batch)?;
                }
                ReadinessMode::Rude => return Ok(Some(batch)),
                ReadinessMode::Efficient => {
                    trace!(group = %batch.key, urls = batch.len(), "dropping blocked batch");
                    self.skip_batch(&batch, UrlStatus::SkippedTimeLimit, None);
                }
            }
        }
    }

    /// Activate the batch's group and hand the batch to the executor. A
    /// rejected submission is recovered locally: release the group, skip
    /// the URLs as deferred, and keep the loop moving.
    fn dispatch(&mut self, batch: Batch) {
        let key = batch.key.clone();
        let urls = batch.len();
        let next = if batch.last_batch {
            trace!(group = %key, urls, "dispatching last batch");
            NextFetch::LastBatch
        } else {
            let next_fetch = Instant::now() + batch.crawl_delay;
            trace!(group = %key, urls, "dispatching batch, group next eligible at {next_fetch:?}");
            NextFetch::At(next_fetch)
        };
        self.tracker.activate(&key, next);

        let ctx = TaskContext {
            events: self.events_tx.clone(),
            sink: Arc::clone(&self.sink),
            counters: Arc::clone(&self.counters),
        };
        let task = FetchTask::new(ctx, Arc::clone(&self.fetcher), batch);

        let dispatch_start = Instant::now();
        match self.executor.execute(task, FetchTask::run) {
            Submit::Accepted => {
                self.counters.add_batches_dispatched(1);
                // Crawl delay is measured from dispatch completion, not
                // submission, so compensate for the time spent here.
                self.tracker.adjust_active(&key, dispatch_start.elapsed());
            }
            Submit::Rejected(task) => {
                let batch = task.into_batch();
                warn!(group = %key, urls, "fetch pool rejected batch, deferring its urls");
                self.tracker.finish(&key);
                self.counters.add_tasks_rejected(1);
                self.skip_batch(
                    &batch,
                    UrlStatus::SkippedDeferred,
                    Some("fetch pool saturated at submit time"),
                );
            }
        }
    }

    /// Flush everything still queued, ignoring politeness, emitting the
    /// given skip status per URL.
    fn drain_remaining(&mut self, status: UrlStatus) -> Result<()> {
        if self.queue.is_empty() {
            return Ok(());
        }
        debug!("draining unprocessed batches");
        while !self.queue.is_empty() {
            if let Some(batch) = self.next_ready(ReadinessMode::Rude)? {
                self.skip_batch(&batch, status, None);
            }
        }
        Ok(())
    }

    fn skip_batch(&self, batch: &Batch, status: UrlStatus, detail: Option<&str>) {
        trace!(group = %batch.key, urls = batch.len(), ?status, "skipping batch");
        self.counters.add_urls_skipped(batch.len() as u64);
        for item in &batch.items {
            self.sink
                .record(Outcome::skipped(item.clone(), status, detail.map(str::to_string)));
        }
    }
}
