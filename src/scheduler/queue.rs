//! Batch intake: the spillover queue in front of the lazily-pulled
//! upstream source.

use std::path::PathBuf;

use crate::batch::Batch;
use crate::spillover::{SpilloverQueue, SpoolError};

/// Buffered batches plus the upstream iterator they came from. Owned
/// exclusively by the dispatch loop.
pub(super) struct BatchQueue {
    spool: SpilloverQueue<Batch>,
    source: std::iter::Peekable<Box<dyn Iterator<Item = Batch> + Send>>,
}

impl BatchQueue {
    pub(super) fn new(
        source: Box<dyn Iterator<Item = Batch> + Send>,
        max_in_memory: usize,
        spool_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            spool: SpilloverQueue::new(max_in_memory, spool_dir),
            source: source.peekable(),
        }
    }

    /// True only when both the buffered batches and the upstream source
    /// are exhausted.
    pub(super) fn is_empty(&mut self) -> bool {
        self.spool.is_empty() && self.source.peek().is_none()
    }

    pub(super) fn peek_queued(&mut self) -> Result<Option<&Batch>, SpoolError> {
        self.spool.peek()
    }

    pub(super) fn pop_queued(&mut self) -> Result<Option<Batch>, SpoolError> {
        self.spool.pop()
    }

    /// Pull the next batch the upstream stage has produced, if any.
    pub(super) fn pull_source(&mut self) -> Option<Batch> {
        self.source.next()
    }

    /// Put a not-yet-ready batch back at the tail of the queue.
    pub(super) fn requeue(&mut self, batch: Batch) -> Result<(), SpoolError> {
        self.spool.push(batch)
    }
}
