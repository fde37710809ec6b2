//! Fetch policy: the read-only knobs the scheduler and fetcher share.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use thiserror::Error;

/// Default cap on fetched content size, in bytes.
pub const DEFAULT_MAX_CONTENT_SIZE: u64 = 64 * 1024;

/// Default spacing between fetches of one group when the upstream stage
/// supplies no crawl delay of its own.
pub const DEFAULT_CRAWL_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// A content-size limit was set for a MIME type outside the allow-list.
    #[error("'{0}' is not a supported MIME type")]
    InvalidMimeType(String),
}

/// Policy configuration for a crawl cycle.
///
/// `skip_blocked_groups` selects the readiness mode: skip batches whose
/// group is blocked (throughput) versus defer them for a later re-check
/// (completeness). Content-size limits are per MIME type with a default
/// fallback; when a non-empty allow-list of MIME types is configured,
/// limits may only be set for listed types.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    skip_blocked_groups: bool,
    default_crawl_delay: Duration,
    default_max_content_size: u64,
    max_content_sizes: HashMap<String, u64>,
    valid_mime_types: HashSet<String>,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            skip_blocked_groups: false,
            default_crawl_delay: DEFAULT_CRAWL_DELAY,
            default_max_content_size: DEFAULT_MAX_CONTENT_SIZE,
            max_content_sizes: HashMap::new(),
            valid_mime_types: HashSet::new(),
        }
    }
}

impl FetchPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip batches whose group is blocked instead of deferring them.
    pub fn with_skip_blocked_groups(mut self, skip: bool) -> Self {
        self.skip_blocked_groups = skip;
        self
    }

    pub fn with_default_crawl_delay(mut self, delay: Duration) -> Self {
        self.default_crawl_delay = delay;
        self
    }

    /// Restrict content-size overrides to the given MIME types.
    pub fn with_valid_mime_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_mime_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn skip_blocked_groups(&self) -> bool {
        self.skip_blocked_groups
    }

    pub fn default_crawl_delay(&self) -> Duration {
        self.default_crawl_delay
    }

    pub fn set_default_max_content_size(&mut self, size: u64) {
        self.default_max_content_size = size;
    }

    pub fn default_max_content_size(&self) -> u64 {
        self.default_max_content_size
    }

    /// Set a per-MIME-type content-size limit. Fails when an allow-list is
    /// configured and the type is not on it.
    pub fn set_max_content_size(&mut self, mime_type: &str, size: u64) -> Result<(), PolicyError> {
        if !self.valid_mime_types.is_empty() && !self.valid_mime_types.contains(mime_type) {
            return Err(PolicyError::InvalidMimeType(mime_type.to_string()));
        }
        self.max_content_sizes.insert(mime_type.to_string(), size);
        Ok(())
    }

    /// Content-size limit for a MIME type, falling back to the default.
    pub fn max_content_size(&self, mime_type: &str) -> u64 {
        self.max_content_sizes
            .get(mime_type)
            .copied()
            .unwrap_or(self.default_max_content_size)
    }
}
