//! Core types for the Strata graph cache
//!
//! This crate defines the foundational types used throughout the system:
//! - DataId / Variables: record identifiers and bound variables
//! - Value / FieldValue / Record: the normalized record model
//! - Node descriptors: compiled reader and normalization nodes
//! - Data: structurally shared result trees with fragment references
//! - Selectors, OperationDescriptor, Snapshot and selector derivation
//! - Disposable, CacheConfig
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache_config;
pub mod data;
pub mod disposable;
pub mod error;
pub mod node;
pub mod record;
pub mod selector;
pub mod snapshot;
pub mod types;
pub mod value;

pub use cache_config::CacheConfig;
pub use data::{Data, DataObject, FragmentRef};
pub use disposable::Disposable;
pub use error::{StrataError, StrataResult};
pub use node::{
    get_fragment_variables, get_operation_variables, resolve_arguments, storage_key, Argument,
    ArgumentDefinition, ArgumentValue, ConcreteRequest, Condition, FragmentSpread, InlineFragment,
    LinkedField, NormalizationNode, OperationKind, ReaderFragment, RequestParameters, ScalarField,
    Selection,
};
pub use record::Record;
pub use selector::{
    create_operation_descriptor, create_operation_descriptor_at, get_data_ids_from_object,
    get_prop_selector, get_selector, get_selector_list, get_selectors_from_object,
    get_variables_from_object, FragmentMap, NormalizationSelector, OperationDescriptor,
    PropDataIds, PropSelector, Props, ReaderSelector, RequestDescriptor, SelectorKey,
};
pub use snapshot::Snapshot;
pub use types::{DataId, Variables, CLIENT_ID_PREFIX, ROOT_ID, ROOT_TYPE};
pub use value::{FieldShape, FieldValue, Value};
