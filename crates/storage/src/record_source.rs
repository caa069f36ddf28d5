//! RecordSource: the normalized graph as a map from DataID to record state
//!
//! A DataID is in one of three states:
//! - **Existent**: a record is stored
//! - **Nonexistent**: known not to exist (deleted, or a server null)
//! - **Unknown**: never seen, or evicted by garbage collection
//!
//! Records are held behind `Arc` so cloning a source for the next committed
//! version copies pointers, not records, and unchanged records keep their
//! identity across versions.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use strata_core::{DataId, Record};

/// Stored state of a known DataID
#[derive(Debug, Clone, PartialEq)]
pub enum RecordState {
    /// A record is stored
    Existent(Arc<Record>),
    /// Known not to exist
    Nonexistent,
}

/// Status of a DataID, including ids the source has never seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// A record is stored
    Existent,
    /// Known not to exist
    Nonexistent,
    /// Never seen (or evicted)
    Unknown,
}

/// Result of a point lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordLookup<'a> {
    /// The stored record
    Existent(&'a Record),
    /// Known not to exist
    Nonexistent,
    /// Never seen (or evicted)
    Unknown,
}

impl<'a> RecordLookup<'a> {
    /// The record, if one is stored
    pub fn record(self) -> Option<&'a Record> {
        match self {
            RecordLookup::Existent(record) => Some(record),
            _ => None,
        }
    }
}

/// Mapping from DataID to record state
#[derive(Debug, Clone, Default)]
pub struct RecordSource {
    records: FxHashMap<DataId, RecordState>,
}

impl RecordSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source holding `records`
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut source = Self::new();
        for record in records {
            source.set(record);
        }
        source
    }

    /// Look up a DataID
    pub fn get(&self, id: &DataId) -> RecordLookup<'_> {
        match self.records.get(id) {
            Some(RecordState::Existent(record)) => RecordLookup::Existent(record),
            Some(RecordState::Nonexistent) => RecordLookup::Nonexistent,
            None => RecordLookup::Unknown,
        }
    }

    /// Shared handle to a stored record
    pub fn get_arc(&self, id: &DataId) -> Option<Arc<Record>> {
        match self.records.get(id) {
            Some(RecordState::Existent(record)) => Some(Arc::clone(record)),
            _ => None,
        }
    }

    /// Stored state of a known DataID
    pub fn state(&self, id: &DataId) -> Option<&RecordState> {
        self.records.get(id)
    }

    /// Status of a DataID
    pub fn status(&self, id: &DataId) -> RecordStatus {
        match self.records.get(id) {
            Some(RecordState::Existent(_)) => RecordStatus::Existent,
            Some(RecordState::Nonexistent) => RecordStatus::Nonexistent,
            None => RecordStatus::Unknown,
        }
    }

    /// Whether the DataID is known (existent or nonexistent)
    pub fn is_known(&self, id: &DataId) -> bool {
        self.records.contains_key(id)
    }

    /// Store a record, replacing any previous state
    pub fn set(&mut self, record: Record) {
        self.records
            .insert(record.id().clone(), RecordState::Existent(Arc::new(record)));
    }

    /// Store a state, replacing any previous state
    pub fn set_state(&mut self, id: DataId, state: RecordState) {
        self.records.insert(id, state);
    }

    /// Mark a DataID as known not to exist
    pub fn mark_nonexistent(&mut self, id: DataId) {
        self.records.insert(id, RecordState::Nonexistent);
    }

    /// Forget a DataID entirely (it becomes unknown)
    pub fn remove(&mut self, id: &DataId) -> Option<RecordState> {
        self.records.remove(id)
    }

    /// Number of known DataIDs
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no DataID is known
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Known DataIDs, in no particular order
    pub fn ids(&self) -> impl Iterator<Item = &DataId> {
        self.records.keys()
    }

    /// Known (id, state) pairs, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&DataId, &RecordState)> {
        self.records.iter()
    }
}
