//! Error types for the graph cache
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Missing data is NOT an error: readers surface it through
//! `Snapshot::is_missing_data` and `check()` returning `false`. Everything in
//! here is either a contract violation (bad selector derivation, bad payload,
//! bad configuration) or a store inconsistency that aborts a write batch.

use crate::types::DataId;
use crate::value::FieldShape;
use thiserror::Error;

/// Result type alias for cache operations
pub type StrataResult<T> = std::result::Result<T, StrataError>;

/// Error types for the graph cache
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrataError {
    /// A write tried to change the shape of an existing field
    ///
    /// Fatal to the whole batch: nothing from the batch is committed.
    #[error("Shape mismatch on {id}.{field}: stored {existing}, incoming {incoming}")]
    ShapeMismatch {
        /// Record being written
        id: DataId,
        /// Storage key of the field
        field: String,
        /// Shape currently stored
        existing: FieldShape,
        /// Shape the batch tried to write
        incoming: FieldShape,
    },

    /// A batch left a reference pointing at a record the store has never seen
    #[error("Dangling reference {id}.{field} -> {target}")]
    DanglingReference {
        /// Record holding the reference
        id: DataId,
        /// Storage key of the field
        field: String,
        /// Referenced record that is neither present nor marked absent
        target: DataId,
    },

    /// A prop value does not match what the fragment expects
    #[error("Invalid fragment reference for {fragment}: {reason}")]
    InvalidFragmentReference {
        /// Fragment name
        fragment: String,
        /// What was wrong with the prop
        reason: String,
    },

    /// A network payload does not match the normalization node
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Failure reported by the network collaborator
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid input (configuration, selector arguments, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An updater tried to create a record that already exists
    #[error("Record already exists: {0}")]
    RecordExists(DataId),

    /// Internal invariant broken
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StrataError {
    /// Create an InvalidInput error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        StrataError::InvalidInput(msg.into())
    }

    /// Create an InvalidPayload error
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        StrataError::InvalidPayload(msg.into())
    }

    /// Create a Network error
    pub fn network(msg: impl Into<String>) -> Self {
        StrataError::Network(msg.into())
    }

    /// Create an Internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        StrataError::Internal(msg.into())
    }

    /// Create an InvalidFragmentReference error
    pub fn invalid_fragment_reference(fragment: impl Into<String>, reason: impl Into<String>) -> Self {
        StrataError::InvalidFragmentReference {
            fragment: fragment.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means the store rejected a batch
    pub fn is_store_inconsistency(&self) -> bool {
        matches!(
            self,
            StrataError::ShapeMismatch { .. } | StrataError::DanglingReference { .. }
        )
    }
}
