//! Bounded per-selector cache of the last snapshot
//!
//! Keyed by (data id, fragment name, variables). Entries remember the store
//! version they were read at; oldest inserts are evicted first.

use std::collections::{HashMap, VecDeque};

use strata_core::{SelectorKey, Snapshot};

pub(crate) struct LookupCache {
    entries: HashMap<SelectorKey, (u64, Snapshot)>,
    order: VecDeque<SelectorKey>,
    capacity: usize,
}

impl LookupCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub(crate) fn get(&self, key: &SelectorKey) -> Option<&(u64, Snapshot)> {
        self.entries.get(key)
    }

    pub(crate) fn insert(&mut self, key: SelectorKey, version: u64, snapshot: Snapshot) {
        if !self.is_enabled() {
            return;
        }
        if self.entries.insert(key.clone(), (version, snapshot)).is_none() {
            self.order.push_back(key);
            while self.order.len() > self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
