//! RecordStore: versioned, copy-on-write home of the normalized graph
//!
//! # Design Notes
//!
//! - **Single writer**: a writer mutex serializes commits and evictions
//! - **Lock-light reads**: readers clone an `Arc<RecordSource>` under a
//!   short read lock and then work without any lock held
//! - **Atomic commits**: a batch is staged against the current source and
//!   validated before anything becomes visible; on error nothing changes
//! - **Version**: `AtomicU64`, bumped once per non-empty commit or eviction;
//!   updated under the source write lock so a view's version always matches
//!   its records
//! - **Structural sharing**: records a batch leaves unchanged keep their `Arc`
//!
//! # Invariants
//!
//! - Every reference written by a batch targets a DataID that is existent,
//!   nonexistent or written by the same batch
//! - A field never changes shape once stored
//! - Versions are strictly increasing across visible commits

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use strata_core::{DataId, Record, StrataError, StrataResult};

use crate::batch::{RecordMutation, WriteBatch};
use crate::record_source::{RecordSource, RecordState, RecordStatus};
use crate::snapshot::StoreView;

/// Outcome of a commit or eviction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitResult {
    /// Store version after the operation
    pub version: u64,
    /// DataIDs whose stored state actually changed
    pub changed: HashSet<DataId>,
}

impl CommitResult {
    /// Whether the operation changed any record
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Versioned record store
///
/// Thread-safe: wrap in `Arc` and share. Reads never block on a commit in
/// progress for longer than the final pointer swap.
#[derive(Debug)]
pub struct RecordStore {
    /// Currently published source
    source: RwLock<Arc<RecordSource>>,
    /// Serializes commits and evictions
    writer: Mutex<()>,
    /// Version of the published source
    version: AtomicU64,
}

impl RecordStore {
    /// Create an empty store at version 0
    pub fn new() -> Self {
        Self::with_source(RecordSource::new())
    }

    /// Create a store seeded with `source` at version 0
    pub fn with_source(source: RecordSource) -> Self {
        Self {
            source: RwLock::new(Arc::new(source)),
            writer: Mutex::new(()),
            version: AtomicU64::new(0),
        }
    }

    /// Current store version
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Take a point-in-time view of committed records
    pub fn view(&self) -> StoreView {
        let source = self.source.read();
        StoreView::new(self.version.load(Ordering::SeqCst), Arc::clone(&source))
    }

    /// Shared handle to a stored record
    pub fn get(&self, id: &DataId) -> Option<Arc<Record>> {
        self.source.read().get_arc(id)
    }

    /// Status of a DataID in the current source
    pub fn status(&self, id: &DataId) -> RecordStatus {
        self.source.read().status(id)
    }

    /// Number of known DataIDs
    pub fn len(&self) -> usize {
        self.source.read().len()
    }

    /// Whether no DataID is known
    pub fn is_empty(&self) -> bool {
        self.source.read().is_empty()
    }

    /// Apply a batch of mutations as one atomic commit
    ///
    /// Mutations are applied in order, so the later of two writes to the same
    /// field wins. An empty batch is a no-op and does not bump the version.
    ///
    /// # Errors
    ///
    /// - `StrataError::ShapeMismatch` if a write changes a field's shape
    /// - `StrataError::DanglingReference` if a written reference targets an
    ///   unknown DataID
    ///
    /// On error the store is unchanged.
    pub fn apply_batch(&self, batch: WriteBatch) -> StrataResult<CommitResult> {
        if batch.is_empty() {
            return Ok(CommitResult {
                version: self.current_version(),
                changed: HashSet::new(),
            });
        }

        let _writer = self.writer.lock();
        let base = Arc::clone(&*self.source.read());

        let mut staged: FxHashMap<DataId, RecordState> = FxHashMap::default();
        let mut written_refs: Vec<(DataId, String, DataId)> = Vec::new();

        for mutation in batch {
            match mutation {
                RecordMutation::Merge {
                    id,
                    typename,
                    fields,
                } => {
                    let current = match staged.get(&id).or_else(|| base.state(&id)) {
                        Some(RecordState::Existent(record)) => Arc::clone(record),
                        _ => Arc::new(Record::new(id.clone(), None)),
                    };
                    if let (Some(old), Some(new)) = (current.typename(), typename.as_deref()) {
                        if old != new {
                            tracing::warn!(
                                target: "strata::store",
                                id = %id,
                                old,
                                new,
                                "Record typename changed"
                            );
                        }
                    }
                    let merged = current.merged_with(typename.as_deref(), &fields)?;
                    for (key, value) in &fields {
                        for target in value.referenced_ids() {
                            written_refs.push((id.clone(), key.clone(), target.clone()));
                        }
                    }
                    staged.insert(id, RecordState::Existent(Arc::new(merged)));
                }
                RecordMutation::Delete(id) => {
                    staged.insert(id, RecordState::Nonexistent);
                }
            }
        }

        for (id, field, target) in written_refs {
            let known = match staged.get(&target) {
                Some(_) => true,
                None => base.status(&target) != RecordStatus::Unknown,
            };
            if !known {
                debug!(target: "strata::store", id = %id, field = %field, target_id = %target, "Rejected batch with dangling reference");
                return Err(StrataError::DanglingReference { id, field, target });
            }
        }

        let changed: HashSet<DataId> = staged
            .iter()
            .filter(|(id, state)| base.state(id) != Some(*state))
            .map(|(id, _)| id.clone())
            .collect();

        let mut next = (*base).clone();
        for (id, state) in staged {
            if changed.contains(&id) {
                next.set_state(id, state);
            }
        }

        let version = self.publish(next);
        debug!(
            target: "strata::store",
            version,
            changed = changed.len(),
            "Committed batch"
        );
        Ok(CommitResult { version, changed })
    }

    /// Evict every DataID not in the set returned by `mark`
    ///
    /// `mark` runs against the current source while commits are blocked, so
    /// nothing written concurrently can be evicted. Evicted ids become
    /// unknown. The version is bumped only if something was evicted.
    pub fn evict_unmarked<F>(&self, mark: F) -> CommitResult
    where
        F: FnOnce(&RecordSource) -> HashSet<DataId>,
    {
        let _writer = self.writer.lock();
        let base = Arc::clone(&*self.source.read());
        let keep = mark(&base);

        let evicted: HashSet<DataId> = base
            .ids()
            .filter(|id| !keep.contains(*id))
            .cloned()
            .collect();
        if evicted.is_empty() {
            trace!(target: "strata::store", "Eviction found nothing to remove");
            return CommitResult {
                version: self.current_version(),
                changed: evicted,
            };
        }

        let mut next = (*base).clone();
        for id in &evicted {
            next.remove(id);
        }
        let version = self.publish(next);
        debug!(target: "strata::store", version, evicted = evicted.len(), "Evicted records");
        CommitResult {
            version,
            changed: evicted,
        }
    }

    /// Swap in a new source and bump the version; caller holds the writer lock
    fn publish(&self, next: RecordSource) -> u64 {
        let mut source = self.source.write();
        *source = Arc::new(next);
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}
