//! Retention manager: reference-counted pins on DataIDs
//!
//! # Design Notes
//!
//! - **Per-DataID counts**: `retain` adds one to every id in the selector's
//!   closure; overlapping selectors each contribute
//! - **Roots recomputed at GC time**: `mark` re-walks every retained
//!   selector against the source being collected, so ids linked after the
//!   retain are kept too
//! - **Release buffer**: with a buffer size `n`, the `n` most recently
//!   released roots stay retained until pushed out by newer releases
//!
//! Callers serialize `retain`, `release` and `mark` with store writes.

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

use strata_core::{DataId, NormalizationSelector};
use strata_storage::RecordSource;

use crate::checker;

/// Identifies one `retain` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetainToken(u64);

struct RetainedRoot {
    selector: NormalizationSelector,
    ids: HashSet<DataId>,
}

/// Retain counts and retained roots
pub struct RetentionManager {
    counts: DashMap<DataId, usize>,
    roots: Mutex<FxHashMap<RetainToken, RetainedRoot>>,
    release_buffer: Mutex<VecDeque<RetainToken>>,
    release_buffer_size: usize,
    next_token: AtomicU64,
}

impl RetentionManager {
    /// Create a manager with the given release buffer size
    pub fn new(release_buffer_size: usize) -> Self {
        Self {
            counts: DashMap::new(),
            roots: Mutex::new(FxHashMap::default()),
            release_buffer: Mutex::new(VecDeque::new()),
            release_buffer_size,
            next_token: AtomicU64::new(1),
        }
    }

    /// Pin the closure of `selector` as computed against `source`
    pub fn retain(&self, selector: NormalizationSelector, source: &RecordSource) -> RetainToken {
        let token = RetainToken(self.next_token.fetch_add(1, Ordering::SeqCst));
        let ids = checker::closure(&selector, source);
        for id in &ids {
            *self.counts.entry(id.clone()).or_insert(0) += 1;
        }
        trace!(target: "strata::gc", token = token.0, ids = ids.len(), "Retained selector");
        self.roots.lock().insert(token, RetainedRoot { selector, ids });
        token
    }

    /// Release a retain
    ///
    /// Returns whether any count actually dropped (with a release buffer the
    /// drop may belong to an older release). Releasing twice is a no-op.
    pub fn release(&self, token: RetainToken) -> bool {
        if !self.roots.lock().contains_key(&token) {
            return false;
        }
        let expired = {
            let mut buffer = self.release_buffer.lock();
            if buffer.contains(&token) {
                return false;
            }
            buffer.push_back(token);
            let mut expired = Vec::new();
            while buffer.len() > self.release_buffer_size {
                if let Some(oldest) = buffer.pop_front() {
                    expired.push(oldest);
                }
            }
            expired
        };

        let mut dropped = false;
        for token in expired {
            dropped |= self.drop_root(token);
        }
        dropped
    }

    /// Current retain count of a DataID
    pub fn count(&self, id: &DataId) -> usize {
        self.counts.get(id).map(|count| *count).unwrap_or(0)
    }

    /// Number of roots still pinning records (including buffered releases)
    pub fn root_count(&self) -> usize {
        self.roots.lock().len()
    }

    /// DataIDs that must survive a collection of `source`
    ///
    /// Every id with a nonzero count, plus the closure of every retained
    /// root recomputed against `source`.
    pub fn mark(&self, source: &RecordSource) -> HashSet<DataId> {
        let mut keep: HashSet<DataId> = self
            .counts
            .iter()
            .filter(|entry| *entry.value() > 0)
            .map(|entry| entry.key().clone())
            .collect();
        let roots = self.roots.lock();
        for root in roots.values() {
            keep.extend(checker::closure(&root.selector, source));
        }
        keep
    }

    fn drop_root(&self, token: RetainToken) -> bool {
        let Some(root) = self.roots.lock().remove(&token) else {
            return false;
        };
        for id in &root.ids {
            let now_zero = match self.counts.get_mut(id) {
                Some(mut count) => {
                    *count = count.saturating_sub(1);
                    *count == 0
                }
                None => false,
            };
            if now_zero {
                self.counts.remove_if(id, |_, count| *count == 0);
            }
        }
        trace!(target: "strata::gc", token = token.0, "Released selector");
        true
    }
}
