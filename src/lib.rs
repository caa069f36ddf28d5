//! StrataGraph - reactive normalized graph cache
//!
//! Query results are normalized into records keyed by DataID. Readers
//! resolve selectors against the store into snapshots, subscriptions are
//! notified when a committed batch changes data they read, and retained
//! selectors keep their records alive across garbage collection.
//!
//! # Quick Start
//!
//! ```ignore
//! use stratagraph::{create_operation_descriptor, Environment, OfflineNetwork, Variables};
//!
//! let env = Environment::new(OfflineNetwork);
//! let operation = create_operation_descriptor(query, &Variables::new());
//! env.commit_payload(&operation, &payload)?;
//!
//! let snapshot = env.lookup(&operation.fragment);
//! let subscription = env.subscribe(&snapshot, |s| println!("{:?}", s.data));
//! let retained = env.retain(&operation.root);
//! ```
//!
//! # Architecture
//!
//! - `strata-core`: ids, records, nodes, selectors, snapshots, errors
//! - `strata-storage`: the versioned record store and write batches
//! - `strata-engine`: reader, normalizer, subscriptions, retention, GC and
//!   the [`Environment`] façade

pub use strata_core::*;
pub use strata_engine::*;
pub use strata_storage::{
    CommitResult, RecordLookup, RecordMutation, RecordSource, RecordState, RecordStatus,
    RecordStore, StoreView, WriteBatch,
};
