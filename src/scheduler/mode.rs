/// How the dispatch loop treats a batch whose group is blocked.
///
/// `Efficient` trades completeness for throughput (never wait on a slow
/// group), `Polite` the reverse (head-of-line delay but nothing dropped),
/// and `Rude` exists solely so the final drain terminates regardless of
/// politeness state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessMode {
    /// Drop blocked batches immediately, recording a time-limit skip per URL.
    Efficient,
    /// Requeue blocked batches at the spillover tail for a later re-check.
    Polite,
    /// Ignore politeness entirely; only used while draining at shutdown.
    Rude,
}
