//! Value types for the graph cache
//!
//! This module defines:
//! - Value: scalar payload carried by record fields and variables
//! - FieldValue: what a record stores under one field key
//! - FieldShape: the shape class of a FieldValue, used for consistency checks
//!
//! ## Type Rules
//!
//! - No implicit type coercions: `Int(1) != Float(1.0)`
//! - Float uses IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`
//! - A field keeps one shape for its lifetime; `Null` is shape-neutral

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::DataId;

/// Scalar value type
///
/// Serializes as plain JSON (untagged), which is also the canonical form used
/// when rendering argument values into storage keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point (IEEE-754)
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Array of values (custom list scalars, list arguments)
    Array(Vec<Value>),
    /// Object with string keys (custom JSON scalars, input objects)
    Object(BTreeMap<String, Value>),
}

// Custom PartialEq implementation for IEEE-754 float semantics
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            // Different types are never equal
            _ => false,
        }
    }
}

impl Value {
    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as bool if this is a Bool value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Int value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float value
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as &str if this is a String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as &[Value] if this is an Array value
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Canonical JSON text of this value
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "null".to_string())
    }
}

// ============================================================================
// From implementations for ergonomic API usage
// ============================================================================

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Value::Array(a)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

// ============================================================================
// serde_json interop (network payloads arrive as JSON)
// ============================================================================

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    // u64 beyond i64 range degrades to float
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Value::Object(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Object(obj) => serde_json::Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

// ============================================================================
// Record field values
// ============================================================================

/// Shape class of a stored field value
///
/// Readers assume a stable shape per (field, arguments) combination, so the
/// store rejects writes that would change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldShape {
    /// Single scalar
    Scalar,
    /// Ordered list of scalars
    ScalarList,
    /// Single reference to another record
    Reference,
    /// Ordered list of references
    ReferenceList,
}

impl fmt::Display for FieldShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldShape::Scalar => "scalar",
            FieldShape::ScalarList => "scalar list",
            FieldShape::Reference => "reference",
            FieldShape::ReferenceList => "reference list",
        };
        f.write_str(name)
    }
}

/// Value stored under one field key of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Known null (distinct from a field that was never fetched)
    Null,
    /// Scalar value
    Scalar(Value),
    /// Ordered list of scalars
    ScalarList(Vec<Value>),
    /// Reference to another record
    Reference(DataId),
    /// Ordered list of references; `None` entries are null list items
    ReferenceList(Vec<Option<DataId>>),
}

impl FieldValue {
    /// Wrap a scalar, mapping `Value::Null` to `FieldValue::Null`
    pub fn scalar(value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Null => FieldValue::Null,
            value => FieldValue::Scalar(value),
        }
    }

    /// Reference to another record
    pub fn reference(id: impl Into<DataId>) -> Self {
        FieldValue::Reference(id.into())
    }

    /// List of non-null references
    pub fn references<I, D>(ids: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<DataId>,
    {
        FieldValue::ReferenceList(ids.into_iter().map(|id| Some(id.into())).collect())
    }

    /// Shape of this value, `None` for null
    pub fn shape(&self) -> Option<FieldShape> {
        match self {
            FieldValue::Null | FieldValue::Scalar(Value::Null) => None,
            FieldValue::Scalar(_) => Some(FieldShape::Scalar),
            FieldValue::ScalarList(_) => Some(FieldShape::ScalarList),
            FieldValue::Reference(_) => Some(FieldShape::Reference),
            FieldValue::ReferenceList(_) => Some(FieldShape::ReferenceList),
        }
    }

    /// Whether this value may replace `existing` without changing shape
    pub fn is_shape_compatible(&self, existing: &FieldValue) -> bool {
        match (existing.shape(), self.shape()) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        self.shape().is_none()
    }

    /// Ids referenced by this value
    pub fn referenced_ids(&self) -> Vec<&DataId> {
        match self {
            FieldValue::Reference(id) => vec![id],
            FieldValue::ReferenceList(ids) => ids.iter().flatten().collect(),
            _ => Vec::new(),
        }
    }

    /// Convert a JSON payload value for a scalar selection
    ///
    /// Arrays become scalar lists; everything else is a single scalar.
    pub fn from_json_scalar(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Array(items) => {
                FieldValue::ScalarList(items.iter().cloned().map(Value::from).collect())
            }
            other => FieldValue::Scalar(Value::from(other.clone())),
        }
    }
}
