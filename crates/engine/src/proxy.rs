//! Mutable, read-your-writes view of the record source for updaters
//!
//! A [`RecordSourceProxy`] sits on top of a committed source. Reads see
//! staged changes first; writes are staged per record and field. The proxy
//! turns into one [`WriteBatch`] that carries only the touched fields, so
//! the commit goes through the store's normal validation.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use strata_core::{DataId, FieldValue, Record, StrataError, StrataResult, Value, ROOT_TYPE};
use strata_storage::{RecordMutation, RecordSource, RecordStatus, WriteBatch};

#[derive(Debug, Clone, Default)]
struct StagedRecord {
    /// Current contents; `None` when deleted
    record: Option<Record>,
    /// Whether a delete precedes the staged fields
    deleted: bool,
    /// Typename to write
    typename: Option<String>,
    /// Fields to write
    dirty: BTreeMap<String, FieldValue>,
}

/// Staged mutations over a committed record source
pub struct RecordSourceProxy<'a> {
    base: &'a RecordSource,
    staged: FxHashMap<DataId, StagedRecord>,
    order: Vec<DataId>,
}

impl<'a> RecordSourceProxy<'a> {
    /// Proxy over `base` with nothing staged
    pub fn new(base: &'a RecordSource) -> Self {
        Self {
            base,
            staged: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    /// The root record id
    pub fn root_id(&self) -> DataId {
        DataId::root()
    }

    /// Status of a DataID including staged changes
    pub fn status(&self, id: &DataId) -> RecordStatus {
        match self.staged.get(id) {
            Some(staged) if staged.record.is_some() => RecordStatus::Existent,
            Some(_) => RecordStatus::Nonexistent,
            None => self.base.status(id),
        }
    }

    /// A record including staged changes
    pub fn get(&self, id: &DataId) -> Option<&Record> {
        match self.staged.get(id) {
            Some(staged) => staged.record.as_ref(),
            None => self.base.get(id).record(),
        }
    }

    /// Scalar value of a field
    pub fn get_value(&self, id: &DataId, key: &str) -> Option<&Value> {
        match self.get(id)?.get(key)? {
            FieldValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Target of a reference field
    pub fn get_linked_record(&self, id: &DataId, key: &str) -> Option<&DataId> {
        match self.get(id)?.get(key)? {
            FieldValue::Reference(target) => Some(target),
            _ => None,
        }
    }

    /// Targets of a reference-list field
    pub fn get_linked_records(&self, id: &DataId, key: &str) -> Option<&[Option<DataId>]> {
        match self.get(id)?.get(key)? {
            FieldValue::ReferenceList(targets) => Some(targets),
            _ => None,
        }
    }

    /// Create a new empty record
    ///
    /// # Errors
    ///
    /// `RecordExists` if the record already exists.
    pub fn create(&mut self, id: impl Into<DataId>, typename: &str) -> StrataResult<()> {
        let id = id.into();
        if self.status(&id) == RecordStatus::Existent {
            return Err(StrataError::RecordExists(id));
        }
        self.stage_new(&id, typename);
        Ok(())
    }

    /// Return the root record, creating it if needed
    pub fn get_or_create_root(&mut self) -> DataId {
        let root = DataId::root();
        if self.status(&root) != RecordStatus::Existent {
            self.stage_new(&root, ROOT_TYPE);
        }
        root
    }

    /// Mark a record as known not to exist
    pub fn delete(&mut self, id: impl Into<DataId>) {
        let id = id.into();
        let staged = self.stage(&id);
        staged.record = None;
        staged.deleted = true;
        staged.typename = None;
        staged.dirty.clear();
    }

    /// Set a scalar field
    pub fn set_value(&mut self, id: &DataId, key: &str, value: impl Into<Value>) -> StrataResult<()> {
        self.set_field(id, key, FieldValue::scalar(value))
    }

    /// Point a field at another record
    ///
    /// # Errors
    ///
    /// `DanglingReference` if `target` is unknown.
    pub fn set_linked_record(&mut self, id: &DataId, key: &str, target: &DataId) -> StrataResult<()> {
        self.ensure_known(id, key, target)?;
        self.set_field(id, key, FieldValue::Reference(target.clone()))
    }

    /// Point a field at an ordered list of records
    pub fn set_linked_records(
        &mut self,
        id: &DataId,
        key: &str,
        targets: Vec<Option<DataId>>,
    ) -> StrataResult<()> {
        for target in targets.iter().flatten() {
            self.ensure_known(id, key, target)?;
        }
        self.set_field(id, key, FieldValue::ReferenceList(targets))
    }

    /// Set any field value
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the record does not exist
    /// - `ShapeMismatch` if the value changes the field's shape
    pub fn set_field(&mut self, id: &DataId, key: &str, value: FieldValue) -> StrataResult<()> {
        let current = self.get(id).cloned().ok_or_else(|| {
            StrataError::invalid_input(format!("cannot set '{}' on missing record {}", key, id))
        })?;
        let mut patch = BTreeMap::new();
        patch.insert(key.to_string(), value.clone());
        let merged = current.merged_with(None, &patch)?;

        let staged = self.stage(id);
        staged.record = Some(merged);
        staged.dirty.insert(key.to_string(), value);
        Ok(())
    }

    /// Stage every mutation of `batch`, in order
    pub fn stage_batch(&mut self, batch: &WriteBatch) -> StrataResult<()> {
        for mutation in batch.iter() {
            match mutation {
                RecordMutation::Merge {
                    id,
                    typename,
                    fields,
                } => {
                    let current = self
                        .get(id)
                        .cloned()
                        .unwrap_or_else(|| Record::new(id.clone(), None));
                    let merged = current.merged_with(typename.as_deref(), fields)?;
                    let staged = self.stage(id);
                    staged.record = Some(merged);
                    if typename.is_some() {
                        staged.typename = typename.clone();
                    }
                    for (key, value) in fields {
                        staged.dirty.insert(key.clone(), value.clone());
                    }
                }
                RecordMutation::Delete(id) => self.delete(id.clone()),
            }
        }
        Ok(())
    }

    /// Whether nothing has been staged
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Staged mutations as one batch
    pub fn into_batch(mut self) -> WriteBatch {
        let mut batch = WriteBatch::new();
        for id in self.order {
            let Some(staged) = self.staged.remove(&id) else {
                continue;
            };
            if staged.deleted {
                batch.push(RecordMutation::Delete(id.clone()));
            }
            if staged.record.is_some() {
                batch.push(RecordMutation::Merge {
                    id,
                    typename: staged.typename,
                    fields: staged.dirty,
                });
            }
        }
        batch
    }

    fn ensure_known(&self, id: &DataId, key: &str, target: &DataId) -> StrataResult<()> {
        if self.status(target) == RecordStatus::Unknown {
            return Err(StrataError::DanglingReference {
                id: id.clone(),
                field: key.to_string(),
                target: target.clone(),
            });
        }
        Ok(())
    }

    fn stage_new(&mut self, id: &DataId, typename: &str) {
        let staged = self.stage(id);
        staged.record = Some(Record::new(id.clone(), Some(typename)));
        staged.typename = Some(typename.to_string());
    }

    fn stage(&mut self, id: &DataId) -> &mut StagedRecord {
        let base = self.base;
        let order = &mut self.order;
        self.staged.entry(id.clone()).or_insert_with(|| {
            order.push(id.clone());
            StagedRecord {
                record: base.get(id).record().cloned(),
                ..StagedRecord::default()
            }
        })
    }
}
