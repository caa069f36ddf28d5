//! Normalized records
//!
//! A record is the field-keyed data of one DataID. Field keys are storage
//! keys (`name` or `name(arg:value,...)`), values are [`FieldValue`]s.
//! Records received at different times merge field by field; a merge that
//! would change a field's shape is rejected.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{StrataError, StrataResult};
use crate::types::DataId;
use crate::value::FieldValue;

/// Field-keyed data for one DataID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: DataId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typename: Option<String>,
    #[serde(default)]
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create an empty record
    pub fn new(id: impl Into<DataId>, typename: Option<&str>) -> Self {
        Self {
            id: id.into(),
            typename: typename.map(str::to_string),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter
    pub fn with_field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Builder-style scalar setter
    pub fn with_scalar(self, key: impl Into<String>, value: impl Into<crate::Value>) -> Self {
        self.with_field(key, FieldValue::scalar(value))
    }

    /// The record's id
    pub fn id(&self) -> &DataId {
        &self.id
    }

    /// The record's concrete type, if known
    pub fn typename(&self) -> Option<&str> {
        self.typename.as_deref()
    }

    /// Set the record's concrete type
    pub fn set_typename(&mut self, typename: impl Into<String>) {
        self.typename = Some(typename.into());
    }

    /// Value stored under a storage key; `None` means never fetched
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Whether a storage key has been fetched (null counts as fetched)
    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Store a value without shape validation
    ///
    /// Used when building records; writes against stored records go through
    /// [`Record::merged_with`].
    pub fn set(&mut self, key: impl Into<String>, value: FieldValue) {
        self.fields.insert(key.into(), value);
    }

    /// Iterate over (storage key, value) pairs
    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    /// Number of fetched fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field has been fetched
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Ids referenced from any field of this record
    pub fn referenced_ids(&self) -> impl Iterator<Item = (&String, &DataId)> {
        self.fields
            .iter()
            .flat_map(|(key, value)| value.referenced_ids().into_iter().map(move |id| (key, id)))
    }

    /// Merge a partial record into this one, field by field
    ///
    /// Later values win per field. A field whose stored and incoming values
    /// both have a shape must keep that shape.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::ShapeMismatch` on the first incompatible field;
    /// `self` is left untouched.
    pub fn merged_with(
        &self,
        typename: Option<&str>,
        fields: &BTreeMap<String, FieldValue>,
    ) -> StrataResult<Record> {
        for (key, incoming) in fields {
            if let Some(existing) = self.fields.get(key) {
                if !incoming.is_shape_compatible(existing) {
                    return Err(StrataError::ShapeMismatch {
                        id: self.id.clone(),
                        field: key.clone(),
                        // Both shapes are Some when incompatible
                        existing: existing.shape().unwrap_or(crate::FieldShape::Scalar),
                        incoming: incoming.shape().unwrap_or(crate::FieldShape::Scalar),
                    });
                }
            }
        }

        let mut merged = self.clone();
        if let Some(typename) = typename {
            merged.typename = Some(typename.to_string());
        }
        for (key, value) in fields {
            merged.fields.insert(key.clone(), value.clone());
        }
        Ok(merged)
    }
}
