//! Core identifier types
//!
//! This module defines the foundational types:
//! - DataId: Opaque identifier of one normalized record
//! - Variables: Bound operation/fragment variables
//! - Well-known ids for the root record and client-generated records

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// DataID of the root record that query operations hang off
pub const ROOT_ID: &str = "client:root";

/// Typename of the root record
pub const ROOT_TYPE: &str = "__Root";

/// Prefix of ids generated on the client for records without a server id
pub const CLIENT_ID_PREFIX: &str = "client:";

/// Opaque identifier naming one record in the store
///
/// Stable across writes that refer to the same logical entity. Cheap to clone
/// (`Arc<str>` internally) since ids are copied into seen-record sets and
/// retain counts constantly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataId(Arc<str>);

impl DataId {
    /// Create a DataId from any string-like value
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// The root record id
    pub fn root() -> Self {
        Self::new(ROOT_ID)
    }

    /// Generate the id of a linked record that came without a server id
    ///
    /// Format: `client:<parent>:<storage_key>` plus `:<index>` for list items.
    pub fn client_id(parent: &DataId, storage_key: &str, index: Option<usize>) -> Self {
        let mut id = String::with_capacity(parent.0.len() + storage_key.len() + 12);
        if !parent.is_client_id() {
            id.push_str(CLIENT_ID_PREFIX);
        }
        id.push_str(&parent.0);
        id.push(':');
        id.push_str(storage_key);
        if let Some(index) = index {
            id.push(':');
            id.push_str(&index.to_string());
        }
        Self(Arc::from(id))
    }

    /// Whether this id was generated on the client
    pub fn is_client_id(&self) -> bool {
        self.0.starts_with(CLIENT_ID_PREFIX)
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DataId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DataId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl Borrow<str> for DataId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DataId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for DataId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DataId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(DataId::from)
    }
}

/// Variables bound to an operation or fragment
///
/// Ordered so that two equal variable sets always render the same cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables(BTreeMap<String, Value>);

impl Variables {
    /// Create an empty variable set
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Insert or replace a variable
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Whether a variable is bound
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of bound variables
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no variables are bound
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over (name, value) pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Overlay `other` on top of `self` (other wins on conflicts)
    pub fn merge(&mut self, other: &Variables) {
        for (name, value) in other.iter() {
            self.0.insert(name.clone(), value.clone());
        }
    }

    /// Canonical string form, used for selector cache keys
    pub fn cache_key(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

impl FromIterator<(String, Value)> for Variables {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, Value>> for Variables {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}
