//! Write batches
//!
//! A [`WriteBatch`] is an ordered list of record mutations applied by
//! `RecordStore::apply_batch` as one atomic commit. Within a batch, later
//! mutations of the same field win.

use std::collections::BTreeMap;

use strata_core::{DataId, FieldValue, Record};

/// One mutation of a record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordMutation {
    /// Merge fields into a record, creating it if needed
    Merge {
        /// Record to write
        id: DataId,
        /// Concrete type, if known
        typename: Option<String>,
        /// Fields to merge (later value wins per field)
        fields: BTreeMap<String, FieldValue>,
    },
    /// Mark a record as known not to exist
    Delete(DataId),
}

impl RecordMutation {
    /// Record this mutation targets
    pub fn id(&self) -> &DataId {
        match self {
            RecordMutation::Merge { id, .. } | RecordMutation::Delete(id) => id,
        }
    }
}

/// Ordered set of record mutations committed together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    mutations: Vec<RecordMutation>,
}

impl WriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a partial record
    pub fn merge(
        &mut self,
        id: impl Into<DataId>,
        typename: Option<&str>,
        fields: BTreeMap<String, FieldValue>,
    ) -> &mut Self {
        self.mutations.push(RecordMutation::Merge {
            id: id.into(),
            typename: typename.map(str::to_string),
            fields,
        });
        self
    }

    /// Merge every field of `record`
    pub fn put_record(&mut self, record: &Record) -> &mut Self {
        let fields = record
            .fields()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        self.merge(record.id().clone(), record.typename(), fields)
    }

    /// Set a single field
    pub fn set_field(&mut self, id: impl Into<DataId>, key: impl Into<String>, value: FieldValue) -> &mut Self {
        let mut fields = BTreeMap::new();
        fields.insert(key.into(), value);
        self.merge(id, None, fields)
    }

    /// Mark a record as known not to exist
    pub fn delete(&mut self, id: impl Into<DataId>) -> &mut Self {
        self.mutations.push(RecordMutation::Delete(id.into()));
        self
    }

    /// Append a mutation
    pub fn push(&mut self, mutation: RecordMutation) {
        self.mutations.push(mutation);
    }

    /// Append every mutation of `other`
    pub fn extend(&mut self, other: WriteBatch) {
        self.mutations.extend(other.mutations);
    }

    /// Number of mutations
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Whether the batch has no mutations
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Mutations in order
    pub fn iter(&self) -> impl Iterator<Item = &RecordMutation> {
        self.mutations.iter()
    }
}

impl IntoIterator for WriteBatch {
    type Item = RecordMutation;
    type IntoIter = std::vec::IntoIter<RecordMutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.into_iter()
    }
}

impl FromIterator<RecordMutation> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = RecordMutation>>(iter: I) -> Self {
        Self {
            mutations: iter.into_iter().collect(),
        }
    }
}
