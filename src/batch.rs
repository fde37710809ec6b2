//! Work units flowing through the scheduler: group keys, URL work items, and
//! the per-group batches the upstream grouping stage produces.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Key identifying a fetch-politeness domain.
///
/// Opaque to the scheduler: everything sharing a key is rate-limited
/// together. The upstream grouping stage decides what a key means; for
/// host-based politeness use [`GroupKey::from_url`], which normalises a URL
/// down to `scheme:host:port` so different paths on the same origin share
/// one politeness budget.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey(String);

impl GroupKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive a host-based group key from a URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed =
            url::Url::parse(url).with_context(|| format!("invalid URL for group key: {url}"))?;

        let scheme = parsed.scheme();
        let host = parsed
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("URL missing host for group key: {url}"))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| anyhow::anyhow!("URL missing port and unknown default: {url}"))?;

        Ok(Self(format!("{scheme}:{host}:{port}")))
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One URL to fetch, plus the scoring/context metadata the fetcher needs.
/// The scheduler never looks inside beyond the URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub url: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl WorkItem {
    pub fn new(url: impl Into<String>, score: f64) -> Self {
        Self {
            url: url.into(),
            score,
            metadata: HashMap::new(),
        }
    }
}

/// An ordered set of work items sharing one group key, fetched together in
/// one task. Produced once by the upstream grouping stage and immutable
/// afterwards; serializable so queued batches can spill to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub key: GroupKey,
    pub items: Vec<WorkItem>,
    /// No further batches for this group will arrive in this crawl cycle.
    pub last_batch: bool,
    /// Minimum spacing before the group's next batch may run. Only
    /// meaningful when `last_batch` is false.
    pub crawl_delay: Duration,
}

impl Batch {
    pub fn new(key: GroupKey, items: Vec<WorkItem>, last_batch: bool, crawl_delay: Duration) -> Self {
        Self {
            key,
            items,
            last_batch,
            crawl_delay,
        }
    }

    /// The final batch for a group; no crawl delay applies after it.
    pub fn last(key: GroupKey, items: Vec<WorkItem>) -> Self {
        Self::new(key, items, true, Duration::ZERO)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
