//! Storage layer for the Strata graph cache
//!
//! This crate implements the normalized record store with:
//! - RecordSource: FxHashMap of DataID to record state
//! - WriteBatch: ordered record mutations committed atomically
//! - RecordStore: copy-on-write source behind RwLock, single writer
//! - Version management with AtomicU64
//! - StoreView: immutable point-in-time views for readers
//! - Mark-driven eviction for garbage collection

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod record_source;
pub mod snapshot;
pub mod store;

pub use batch::{RecordMutation, WriteBatch};
pub use record_source::{RecordLookup, RecordSource, RecordState, RecordStatus};
pub use snapshot::StoreView;
pub use store::{CommitResult, RecordStore};
