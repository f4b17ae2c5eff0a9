use std::collections::HashMap;

use parking_lot::Mutex;

/// Transactions waiting for their confirmation, keyed by correlation ID.
///
/// Submitters insert after a successful send and the reconciliation loop
/// takes the entry out when the confirmation arrives, so each entry is
/// resolved at most once.
#[derive(Debug)]
pub struct PendingTxRegistry<V> {
    entries: Mutex<HashMap<String, V>>,
}

impl<V> Default for PendingTxRegistry<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> PendingTxRegistry<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` under `id`, returning the entry it replaced.
    pub fn insert(&self, id: impl Into<String>, value: V) -> Option<V> {
        self.entries.lock().insert(id.into(), value)
    }

    /// Removes and returns the entry for `id`.
    pub fn take(&self, id: &str) -> Option<V> {
        self.entries.lock().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
