//! Reactive graph cache engine
//!
//! This crate composes the lower layers into the environment:
//! - Reader: resolve reader selectors into snapshots
//! - Checker: `check` and retention closures over normalization selectors
//! - Normalizer: turn payloads into write batches
//! - Subscriptions: re-read and notify on committed batches
//! - Retention and GC: retain counts, collection passes, the scheduler
//! - Environment: the façade (`execute`, `lookup`, `subscribe`, `retain`, ...)
//! - Resolver: keep fragment data current for a set of props

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checker;
pub mod config;
pub mod environment;
pub mod gc;
mod lookup_cache;
pub mod network;
pub mod normalizer;
pub mod observable;
pub mod proxy;
pub mod reader;
pub mod recycle;
pub mod resolver;
pub mod retention;
pub mod subscriptions;

pub use checker::{check, closure};
pub use config::{EnvironmentConfig, CONFIG_FILE_NAME, MIN_GC_INTERVAL_MS};
pub use environment::{Environment, ExecuteRequest, GcReport, Updater};
pub use gc::GcScheduler;
pub use network::{GraphQLResponse, Network, OfflineNetwork, PayloadError};
pub use normalizer::{normalize, PayloadData};
pub use observable::{Observable, Observer, Sink};
pub use proxy::RecordSourceProxy;
pub use reader::read;
pub use recycle::recycle_nodes_into;
pub use resolver::{FragmentSpecResolver, ResolverCallback};
pub use retention::{RetainToken, RetentionManager};
pub use subscriptions::{SubscriptionCallback, SubscriptionRegistry};
