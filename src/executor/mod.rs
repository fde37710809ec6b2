//! Bounded concurrent task pool with per-task timeout and deterministic,
//! deadline-bounded shutdown.
//!
//! Keeps at most `max_workers` fetch tasks in flight. Submission never
//! queues: a full pool hands the task straight back so the caller can make
//! its own skip decision. Each accepted task runs under a per-task timeout
//! so one stalled fetch cannot wedge the pool.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::counters::FetchCounters;

/// Outcome of a submission attempt. A rejected task is returned un-run so
/// the caller still owns its work items.
pub enum Submit<T> {
    Accepted,
    Rejected(T),
}

pub struct TaskExecutor {
    tasks: JoinSet<bool>,
    max_workers: usize,
    task_timeout: Duration,
    counters: Arc<FetchCounters>,
}

impl TaskExecutor {
    pub fn new(max_workers: usize, task_timeout: Duration, counters: Arc<FetchCounters>) -> Self {
        Self {
            tasks: JoinSet::new(),
            max_workers: max_workers.max(1),
            task_timeout,
            counters,
        }
    }

    /// Tasks currently in flight (including finished-but-unreaped ones).
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Submit a task. `run` converts it into its future only once a pool
    /// slot is secured; on rejection the task is handed back untouched.
    pub fn execute<T, F>(&mut self, task: T, run: impl FnOnce(T) -> F) -> Submit<T>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.reap_finished();
        if self.tasks.len() >= self.max_workers {
            return Submit::Rejected(task);
        }

        let timeout = self.task_timeout;
        let fut = run(task);
        self.tasks
            .spawn(async move { tokio::time::timeout(timeout, fut).await.is_err() });
        Submit::Accepted
    }

    /// Let in-flight tasks finish within `grace`; anything still running
    /// past that is aborted. Returns true when every task finished on its
    /// own, false when a hard termination was necessary.
    pub async fn terminate(&mut self, grace: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            if self.tasks.is_empty() {
                return true;
            }
            match tokio::time::timeout_at(deadline, self.tasks.join_next()).await {
                Ok(Some(joined)) => self.record_joined(joined),
                Ok(None) => return true,
                Err(_) => break,
            }
        }

        let stragglers = self.tasks.len();
        tracing::warn!(
            stragglers,
            "termination grace expired, aborting remaining fetch tasks"
        );
        self.counters.add_hard_terminations(1);
        self.tasks.abort_all();
        while let Some(joined) = self.tasks.join_next().await {
            self.record_joined(joined);
        }
        false
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            self.record_joined(joined);
        }
    }

    fn record_joined(&self, joined: Result<bool, tokio::task::JoinError>) {
        match joined {
            Ok(timed_out) => {
                if timed_out {
                    self.counters.add_tasks_timed_out(1);
                    tracing::warn!("fetch task exceeded its timeout and was cancelled");
                }
            }
            Err(err) if err.is_cancelled() => {}
            Err(err) => tracing::error!("fetch task panicked: {err}"),
        }
    }
}
