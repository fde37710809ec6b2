//! Fetcher collaborator interface.
//!
//! The scheduler never performs network I/O itself; it drives an
//! implementation of [`Fetcher`] supplied by the embedding crawler. The
//! trait also carries the read-only policy knobs the scheduler consults:
//! pool size and the skip-vs-defer decision for blocked groups.

mod headers;
mod policy;

pub use headers::HttpHeaders;
pub use policy::{FetchPolicy, PolicyError, DEFAULT_CRAWL_DELAY, DEFAULT_MAX_CONTENT_SIZE};

use async_trait::async_trait;
use thiserror::Error;

use crate::batch::WorkItem;

/// Result of fetching one URL.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// URL the content was actually served from (after redirects).
    pub final_url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
    pub headers: HttpHeaders,
}

/// Error fetching one URL. Recorded as that URL's outcome; never aborts
/// the rest of the batch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("HTTP {0}")]
    Http(u16),
    #[error("content too large: {size} bytes (limit {limit})")]
    ContentTooLarge { size: u64, limit: u64 },
    #[error("fetch aborted")]
    Aborted,
}

/// The external fetch transport plus its policy accessors.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Fetch one work item. A failure here is that URL's outcome, nothing
    /// more; implementations should not retry indefinitely.
    async fn fetch(&self, item: &WorkItem) -> Result<FetchResult, FetchError>;

    /// Best-effort cancellation of in-flight transport work. Called when
    /// the scheduler has to force-terminate the pool.
    fn abort(&self);

    /// Maximum concurrent fetch tasks this fetcher supports; sizes the pool.
    fn max_threads(&self) -> usize;

    fn policy(&self) -> &FetchPolicy;
}
