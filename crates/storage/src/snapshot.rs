//! StoreView: immutable point-in-time view of the record store
//!
//! # Design Notes
//!
//! - **Copy-on-write**: each commit publishes a new `Arc<RecordSource>`; a view
//!   holds the source that was current when it was taken
//! - **Immutable**: once created, a view never changes
//! - **Thread-safe**: views can be sent to and shared across threads
//! - **Versioned**: a view carries the store version it was taken at

use std::ops::Deref;
use std::sync::Arc;

use crate::record_source::RecordSource;

/// Point-in-time view of committed records
///
/// Writes committed after the view was taken are not visible through it.
///
/// ```ignore
/// let view = store.view();
/// store.apply_batch(batch)?;
/// // `view` still sees the records from before the batch
/// ```
#[derive(Debug, Clone)]
pub struct StoreView {
    version: u64,
    source: Arc<RecordSource>,
}

impl StoreView {
    pub(crate) fn new(version: u64, source: Arc<RecordSource>) -> Self {
        Self { version, source }
    }

    /// Store version at which the view was taken
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Shared handle to the underlying source
    pub fn source(&self) -> &Arc<RecordSource> {
        &self.source
    }

    /// Whether both views share the same committed source
    pub fn same_source(&self, other: &StoreView) -> bool {
        Arc::ptr_eq(&self.source, &other.source)
    }
}

impl Deref for StoreView {
    type Target = RecordSource;

    fn deref(&self) -> &RecordSource {
        &self.source
    }
}
