// # Registry Store
//
// Latest full membership snapshot of one registry backend.
//
// ## Sharing
//
// One Store per backend. Its watcher is the only writer; the synchronizer
// reads it. Both hold it through an `Arc<Store>`.
//
// ## Consistency
//
// - `set` swaps the whole snapshot under a write lock
// - `hosts` clones the current `Arc<Snapshot>` under a read lock
// - a returned snapshot is never mutated afterwards, so readers always see
//   exactly one writer's `set` (or the initial empty state)

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::model::{AddressRecord, Snapshot};

#[derive(Debug, Default)]
struct Inner {
    snapshot: Arc<Snapshot>,
    last_updated: Option<DateTime<Utc>>,
}

/// Concurrency-safe host → address records map for one backend
///
/// # Example
///
/// ```rust
/// use meshsync_core::{AddressRecord, Snapshot, Store};
///
/// let store = Store::new();
///
/// let mut snapshot = Snapshot::new();
/// snapshot.insert(
///     "demo.tetrate.io".to_string(),
///     vec![AddressRecord::new("8.8.8.8").with_port("http", 80)],
/// );
/// store.set(snapshot);
///
/// let hosts = store.hosts();
/// assert_eq!(hosts.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Store {
    inner: RwLock<Inner>,
}

impl Store {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole snapshot
    ///
    /// Duplicate addresses within a host are collapsed; the first record wins.
    pub fn set(&self, snapshot: Snapshot) {
        let snapshot: Snapshot = snapshot
            .into_iter()
            .map(|(host, records)| (host, dedup_by_address(records)))
            .collect();

        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.snapshot = Arc::new(snapshot);
        guard.last_updated = Some(Utc::now());
    }

    /// Current snapshot, unaffected by later `set` calls
    pub fn hosts(&self) -> Arc<Snapshot> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard.snapshot)
    }

    /// Records for a single host
    pub fn records(&self, host: &str) -> Option<Vec<AddressRecord>> {
        self.hosts().get(host).cloned()
    }

    /// Number of hosts in the current snapshot
    pub fn len(&self) -> usize {
        self.hosts().len()
    }

    /// Check if the current snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.hosts().is_empty()
    }

    /// Time of the last `set`, if any
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.last_updated
    }
}

fn dedup_by_address(records: Vec<AddressRecord>) -> Vec<AddressRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.address.clone()))
        .collect()
}
