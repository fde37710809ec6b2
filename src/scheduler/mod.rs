//! Politeness-aware fetch dispatch.
//!
//! Pulls batches from the upstream group stream through a spillover queue,
//! decides per-batch readiness against the politeness tracker, runs ready
//! batches on the bounded executor, and drains everything left over at
//! deadline or shutdown so no URL ends without an outcome.

mod mode;
mod queue;
mod run;
mod task;

pub use mode::ReadinessMode;
pub use run::{CrawlSummary, FetchScheduler};
