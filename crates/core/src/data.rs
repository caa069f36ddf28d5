//! Resolved data trees
//!
//! Readers produce a [`Data`] tree per snapshot. Objects and lists sit behind
//! `Arc`, so an unchanged sub-tree can be handed out again by identity and
//! consumers can skip work with a pointer comparison
//! ([`Data::same_identity`]) before falling back to deep equality.

use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::selector::RequestDescriptor;
use crate::types::{DataId, Variables};
use crate::value::Value;

/// Resolved value of a selection
#[derive(Debug, Clone)]
pub enum Data {
    /// Null, or a field whose data is missing
    Null,
    /// Scalar leaf
    Scalar(Value),
    /// Ordered list (scalar list or reference list items)
    List(Arc<Vec<Data>>),
    /// Object resolved from one record
    Object(Arc<DataObject>),
}

impl Data {
    /// Wrap fields into an object node
    pub fn object(fields: BTreeMap<String, Data>) -> Self {
        Data::Object(Arc::new(DataObject::new(fields, None)))
    }

    /// Wrap items into a list node
    pub fn list(items: Vec<Data>) -> Self {
        Data::List(Arc::new(items))
    }

    /// Scalar leaf, mapping `Value::Null` to `Data::Null`
    pub fn scalar(value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Null => Data::Null,
            value => Data::Scalar(value),
        }
    }

    /// Check if this is null
    pub fn is_null(&self) -> bool {
        matches!(self, Data::Null | Data::Scalar(Value::Null))
    }

    /// Get as object
    pub fn as_object(&self) -> Option<&DataObject> {
        match self {
            Data::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Get as list
    pub fn as_list(&self) -> Option<&[Data]> {
        match self {
            Data::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get as scalar
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Data::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Field of an object node
    pub fn get(&self, key: &str) -> Option<&Data> {
        self.as_object().and_then(|obj| obj.get(key))
    }

    /// String scalar of an object field
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Data::as_scalar).and_then(Value::as_str)
    }

    /// Whether both values are the same allocation (or equal leaves)
    ///
    /// Leaves have no identity of their own, so they compare by value.
    pub fn same_identity(&self, other: &Data) -> bool {
        match (self, other) {
            (Data::Object(a), Data::Object(b)) => Arc::ptr_eq(a, b),
            (Data::List(a), Data::List(b)) => Arc::ptr_eq(a, b),
            (Data::Null, Data::Null) => true,
            (Data::Scalar(a), Data::Scalar(b)) => a == b,
            _ => false,
        }
    }

    /// JSON rendering, fragment references as `__id`/`__fragments`
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Data::Null => serde_json::Value::Null,
            Data::Scalar(value) => serde_json::Value::from(value.clone()),
            Data::List(items) => serde_json::Value::Array(items.iter().map(Data::to_json).collect()),
            Data::Object(obj) => {
                let mut map = serde_json::Map::new();
                for (key, value) in obj.fields() {
                    map.insert(key.clone(), value.to_json());
                }
                if let Some(fragment_ref) = obj.fragment_ref() {
                    map.insert("__id".to_string(), json!(fragment_ref.id.as_str()));
                    let fragments: serde_json::Map<String, serde_json::Value> = fragment_ref
                        .fragments
                        .iter()
                        .map(|(name, args)| {
                            (name.clone(), serde_json::to_value(args).unwrap_or_default())
                        })
                        .collect();
                    map.insert("__fragments".to_string(), serde_json::Value::Object(fragments));
                }
                serde_json::Value::Object(map)
            }
        }
    }
}

impl PartialEq for Data {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Data::Null, Data::Null) => true,
            (Data::Scalar(a), Data::Scalar(b)) => a == b,
            (Data::List(a), Data::List(b)) => Arc::ptr_eq(a, b) || a == b,
            (Data::Object(a), Data::Object(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

/// Object node: fields plus an optional fragment reference
#[derive(Debug, Clone, PartialEq)]
pub struct DataObject {
    fields: BTreeMap<String, Data>,
    fragment_ref: Option<FragmentRef>,
}

impl DataObject {
    /// Create an object node
    pub fn new(fields: BTreeMap<String, Data>, fragment_ref: Option<FragmentRef>) -> Self {
        Self {
            fields,
            fragment_ref,
        }
    }

    /// Field by response key
    pub fn get(&self, key: &str) -> Option<&Data> {
        self.fields.get(key)
    }

    /// Iterate over (response key, value) pairs
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Data)> {
        self.fields.iter()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the object has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fragments spread on this object, if any
    pub fn fragment_ref(&self) -> Option<&FragmentRef> {
        self.fragment_ref.as_ref()
    }
}

/// Pointer to fragments spread on a record
///
/// Carried inside a parent's data so a child can build its own selector
/// without the parent reading the child's fields.
#[derive(Debug, Clone)]
pub struct FragmentRef {
    /// Record the fragments are spread on
    pub id: DataId,
    /// Fragment name -> arguments passed at the spread
    pub fragments: BTreeMap<String, Variables>,
    /// Request whose read produced this reference
    pub owner: Option<Arc<RequestDescriptor>>,
}

impl FragmentRef {
    /// Arguments for a spread fragment, if spread here
    pub fn arguments(&self, fragment: &str) -> Option<&Variables> {
        self.fragments.get(fragment)
    }
}

impl PartialEq for FragmentRef {
    fn eq(&self, other: &Self) -> bool {
        let owners_equal = match (&self.owner, &other.owner) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        };
        self.id == other.id && self.fragments == other.fragments && owners_equal
    }
}
