use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals of relayer activity.
#[derive(Debug, Default)]
pub struct RelayerCounters {
    pub msgs_relayed: AtomicU64,
    pub batches_committed: AtomicU64,
    pub batches_finalized: AtomicU64,
    pub batches_skipped: AtomicU64,
    /// Confirmations received, whether the transaction succeeded or reverted.
    pub msgs_relayed_confirmed: AtomicU64,
    pub batches_committed_confirmed: AtomicU64,
    pub batches_finalized_confirmed: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub msgs_relayed: u64,
    pub batches_committed: u64,
    pub batches_finalized: u64,
    pub batches_skipped: u64,
    pub msgs_relayed_confirmed: u64,
    pub batches_committed_confirmed: u64,
    pub batches_finalized_confirmed: u64,
}

impl RelayerCounters {
    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CountersSnapshot {
            msgs_relayed: get(&self.msgs_relayed),
            batches_committed: get(&self.batches_committed),
            batches_finalized: get(&self.batches_finalized),
            batches_skipped: get(&self.batches_skipped),
            msgs_relayed_confirmed: get(&self.msgs_relayed_confirmed),
            batches_committed_confirmed: get(&self.batches_committed_confirmed),
            batches_finalized_confirmed: get(&self.batches_finalized_confirmed),
        }
    }
}
