//! Point-in-time read results
//!
//! A [`Snapshot`] is what `lookup` returns and what a subscription holds on
//! to. It is a value: a later write produces a new snapshot, never a mutation
//! of an old one.

use std::collections::HashSet;
use std::sync::Arc;

use crate::data::Data;
use crate::node::ReaderFragment;
use crate::selector::{ReaderSelector, RequestDescriptor};
use crate::types::{DataId, Variables};

/// Resolved data of a reader selector plus change-detection metadata
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Selector that was read
    pub selector: ReaderSelector,
    /// Resolved data; `Data::Null` when the root record is null or missing
    pub data: Data,
    /// Every record visited while resolving, including absent/unknown ones
    pub seen_records: HashSet<DataId>,
    /// Whether any selected field was not in the store
    pub is_missing_data: bool,
}

impl Snapshot {
    /// Root record of the read
    pub fn data_id(&self) -> &DataId {
        &self.selector.data_id
    }

    /// Reader node
    pub fn node(&self) -> &Arc<ReaderFragment> {
        &self.selector.node
    }

    /// Variables the node was read with
    pub fn variables(&self) -> &Variables {
        &self.selector.variables
    }

    /// Operation the selector was derived from
    pub fn owner(&self) -> Option<&Arc<RequestDescriptor>> {
        self.selector.owner.as_ref()
    }

    /// Whether any record in `changed` was seen by this snapshot
    pub fn is_affected_by(&self, changed: &HashSet<DataId>) -> bool {
        if self.seen_records.len() <= changed.len() {
            self.seen_records.iter().any(|id| changed.contains(id))
        } else {
            changed.iter().any(|id| self.seen_records.contains(id))
        }
    }
}
