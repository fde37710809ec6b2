//! Shared test support: scripted fetchers and batch builders.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use fetchq::batch::{Batch, GroupKey, WorkItem};
use fetchq::fetcher::{FetchError, FetchPolicy, FetchResult, Fetcher, HttpHeaders};

pub fn batch(key: &str, urls: &[&str], last_batch: bool, crawl_delay: Duration) -> Batch {
    let items = urls.iter().map(|url| WorkItem::new(*url, 1.0)).collect();
    Batch::new(GroupKey::new(key), items, last_batch, crawl_delay)
}

pub fn source(batches: Vec<Batch>) -> Box<dyn Iterator<Item = Batch> + Send> {
    Box::new(batches.into_iter())
}

fn ok_result(url: &str) -> FetchResult {
    let mut headers = HttpHeaders::new();
    headers.add("content-type", "text/html");
    FetchResult {
        final_url: url.to_string(),
        status_code: 200,
        content_type: Some("text/html".to_string()),
        content: b"<html></html>".to_vec(),
        headers,
    }
}

/// Fetcher that answers every URL, optionally after a fixed latency, and
/// records when each fetch completed.
pub struct StubFetcher {
    policy: FetchPolicy,
    max_threads: usize,
    delay: Duration,
    pub fetched: Mutex<Vec<(String, Instant)>>,
}

impl StubFetcher {
    pub fn new(max_threads: usize) -> Self {
        Self {
            policy: FetchPolicy::new(),
            max_threads,
            delay: Duration::ZERO,
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Variant with the skip-blocked-groups policy enabled.
    pub fn efficient(max_threads: usize) -> Self {
        let mut fetcher = Self::new(max_threads);
        fetcher.policy = FetchPolicy::new().with_skip_blocked_groups(true);
        fetcher
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn fetch_time(&self, url_suffix: &str) -> Option<Instant> {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .find(|(url, _)| url.ends_with(url_suffix))
            .map(|(_, at)| *at)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, item: &WorkItem) -> Result<FetchResult, FetchError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.fetched
            .lock()
            .unwrap()
            .push((item.url.clone(), Instant::now()));
        Ok(ok_result(&item.url))
    }

    fn abort(&self) {}

    fn max_threads(&self) -> usize {
        self.max_threads
    }

    fn policy(&self) -> &FetchPolicy {
        &self.policy
    }
}

/// Fetcher whose fetches never complete; for timeout and termination tests.
pub struct StallingFetcher {
    policy: FetchPolicy,
    max_threads: usize,
    pub started: AtomicUsize,
    pub aborted: AtomicUsize,
}

impl StallingFetcher {
    pub fn new(max_threads: usize) -> Self {
        Self {
            policy: FetchPolicy::new(),
            max_threads,
            started: AtomicUsize::new(0),
            aborted: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Fetcher for StallingFetcher {
    async fn fetch(&self, _item: &WorkItem) -> Result<FetchResult, FetchError> {
        self.started.fetch_add(1, Ordering::Relaxed);
        std::future::pending().await
    }

    fn abort(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    fn max_threads(&self) -> usize {
        self.max_threads
    }

    fn policy(&self) -> &FetchPolicy {
        &self.policy
    }
}
