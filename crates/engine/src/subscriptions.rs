//! Subscription registry and change notification
//!
//! # Design Notes
//!
//! - **Per-batch passes**: `notify` runs once per committed batch with the
//!   set of DataIDs that batch changed
//! - **Stable pass list**: the active list is copied at the start of a pass;
//!   callbacks may subscribe or dispose (themselves or others) freely
//! - **Exactness**: only subscriptions whose seen records intersect the
//!   changed set are re-read; a callback fires only when the re-read data
//!   differs deeply from the stored data, at most once per pass
//! - **Identity**: re-read data is recycled into the stored data, so an
//!   unchanged sub-tree keeps its allocation
//! - **No locks held during callbacks**

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

use strata_core::{DataId, Disposable, Snapshot};
use strata_storage::RecordSource;

use crate::reader;
use crate::recycle::recycle_nodes_into;

/// Callback invoked with the new snapshot after a relevant change
pub type SubscriptionCallback = Arc<dyn Fn(&Snapshot) + Send + Sync>;

struct SubscriptionEntry {
    snapshot: Mutex<Snapshot>,
    callback: SubscriptionCallback,
    disposed: AtomicBool,
}

/// Active subscriptions, in subscription order
pub struct SubscriptionRegistry {
    entries: Mutex<BTreeMap<u64, Arc<SubscriptionEntry>>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Watch the data of `snapshot`
    ///
    /// The returned disposable removes the subscription; disposal is
    /// idempotent and takes effect immediately, even mid-pass.
    pub fn subscribe(self: &Arc<Self>, snapshot: Snapshot, callback: SubscriptionCallback) -> Disposable {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let entry = Arc::new(SubscriptionEntry {
            snapshot: Mutex::new(snapshot),
            callback,
            disposed: AtomicBool::new(false),
        });
        self.entries.lock().insert(id, Arc::clone(&entry));
        trace!(target: "strata::subscriptions", id, "Subscribed");

        let registry: Weak<Self> = Arc::downgrade(self);
        Disposable::new(move || {
            entry.disposed.store(true, Ordering::SeqCst);
            if let Some(registry) = registry.upgrade() {
                registry.entries.lock().remove(&id);
                trace!(target: "strata::subscriptions", id, "Unsubscribed");
            }
        })
    }

    /// Number of active subscriptions
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no subscription is active
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Run one notification pass for a committed batch
    ///
    /// Returns the number of callbacks invoked.
    pub fn notify(&self, source: &RecordSource, changed: &HashSet<DataId>) -> usize {
        if changed.is_empty() {
            return 0;
        }
        let active: Vec<Arc<SubscriptionEntry>> = self.entries.lock().values().cloned().collect();

        let mut updated = Vec::new();
        for entry in active {
            if entry.disposed.load(Ordering::SeqCst) {
                continue;
            }
            let mut current = entry.snapshot.lock();
            if !current.is_affected_by(changed) {
                continue;
            }
            let fresh = reader::read(&current.selector, source);
            let data = recycle_nodes_into(&current.data, fresh.data);
            let data_changed =
                !data.same_identity(&current.data) || fresh.is_missing_data != current.is_missing_data;
            let next = Snapshot {
                selector: fresh.selector,
                data,
                seen_records: fresh.seen_records,
                is_missing_data: fresh.is_missing_data,
            };
            *current = next.clone();
            drop(current);
            if data_changed {
                updated.push((entry, next));
            }
        }

        let mut notified = 0;
        for (entry, snapshot) in updated {
            if entry.disposed.load(Ordering::SeqCst) {
                continue;
            }
            (entry.callback)(&snapshot);
            notified += 1;
        }
        debug!(
            target: "strata::subscriptions",
            changed = changed.len(),
            notified,
            "Notification pass"
        );
        notified
    }
}
