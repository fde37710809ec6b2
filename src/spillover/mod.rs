//! Bounded in-memory FIFO queue with transparent disk overflow.
//!
//! Holds up to `max_in_memory` items resident; anything beyond that is
//! serialized to an anonymous temp file and read back in FIFO order as the
//! memory window drains. The queue never drops an item silently: if the
//! overflow file cannot be created or read, the error is fatal and must be
//! propagated by the caller.

mod disk;

use std::collections::VecDeque;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use disk::DiskSpool;

/// Fatal resource error from the overflow store.
#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("failed to create spillover file: {0}")]
    Create(#[source] std::io::Error),
    #[error("spillover I/O failed: {0}")]
    Io(#[source] std::io::Error),
    #[error("failed to encode spillover record: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode spillover record: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("spillover file truncated mid-record")]
    Truncated,
}

/// FIFO queue bounded in memory, overflowing to disk.
///
/// Invariant: the in-memory deque always holds the oldest unconsumed items;
/// everything on disk is newer than everything in memory. `push` therefore
/// goes to disk whenever the disk side is non-empty, even if the memory
/// window has room.
pub struct SpilloverQueue<T> {
    memory: VecDeque<T>,
    max_in_memory: usize,
    disk: Option<DiskSpool<T>>,
    spool_dir: Option<PathBuf>,
}

impl<T: Serialize + DeserializeOwned> SpilloverQueue<T> {
    /// `spool_dir` overrides where the overflow file is created; the system
    /// temp dir is used when `None`. The file itself is created lazily on
    /// first overflow.
    pub fn new(max_in_memory: usize, spool_dir: Option<PathBuf>) -> Self {
        Self {
            memory: VecDeque::new(),
            max_in_memory: max_in_memory.max(1),
            disk: None,
            spool_dir,
        }
    }

    pub fn len(&self) -> usize {
        self.memory.len() + self.disk.as_ref().map_or(0, DiskSpool::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append at the tail. Requeued items go through here too, so a blocked
    /// head can never starve items behind it of their queue position.
    pub fn push(&mut self, item: T) -> Result<(), SpoolError> {
        let overflow = self.memory.len() >= self.max_in_memory
            || self.disk.as_ref().is_some_and(|d| !d.is_empty());
        if !overflow {
            self.memory.push_back(item);
            return Ok(());
        }

        let spool = match self.disk.take() {
            Some(spool) => spool,
            None => DiskSpool::create(self.spool_dir.as_deref())?,
        };
        self.disk.insert(spool).append(&item)
    }

    /// The oldest unconsumed item, without removing it.
    pub fn peek(&mut self) -> Result<Option<&T>, SpoolError> {
        self.refill()?;
        Ok(self.memory.front())
    }

    /// Dequeue the oldest unconsumed item.
    pub fn pop(&mut self) -> Result<Option<T>, SpoolError> {
        self.refill()?;
        Ok(self.memory.pop_front())
    }

    /// Reload the memory window from disk once it runs dry.
    fn refill(&mut self) -> Result<(), SpoolError> {
        if !self.memory.is_empty() {
            return Ok(());
        }
        if let Some(spool) = self.disk.as_mut() {
            while self.memory.len() < self.max_in_memory {
                match spool.pop_front()? {
                    Some(item) => self.memory.push_back(item),
                    None => break,
                }
            }
        }
        Ok(())
    }
}
