//! Selector reader: resolves a reader selector against a record source
//!
//! # Design Notes
//!
//! - **Missing is not fatal**: an unfetched field, an unknown record or a
//!   record known not to exist sets `is_missing_data` and resolves to null;
//!   siblings keep resolving
//! - **Stable list length**: reference-list items that cannot be resolved
//!   stay in place as null gaps
//! - **Fragment references**: a spread is not read through; it becomes a
//!   `FragmentRef` on the parent object, carrying the spread arguments
//! - **Seen records**: every DataID visited, including absent ones, so a
//!   later write of that id is recognized as relevant

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use strata_core::{
    resolve_arguments, Data, DataId, DataObject, FieldValue, FragmentRef, ReaderSelector, Record,
    RequestDescriptor, Selection, Snapshot, Variables,
};
use strata_storage::{RecordLookup, RecordSource};

/// Resolve `selector` against `source`
pub fn read(selector: &ReaderSelector, source: &RecordSource) -> Snapshot {
    let mut reader = Reader {
        source,
        variables: &selector.variables,
        owner: selector.owner.as_ref(),
        seen_records: HashSet::new(),
        is_missing_data: false,
        path: Vec::new(),
    };
    let data = reader.read_record(&selector.data_id, &selector.node.selections);
    Snapshot {
        selector: selector.clone(),
        data,
        seen_records: reader.seen_records,
        is_missing_data: reader.is_missing_data,
    }
}

struct Reader<'a> {
    source: &'a RecordSource,
    variables: &'a Variables,
    owner: Option<&'a Arc<RequestDescriptor>>,
    seen_records: HashSet<DataId>,
    is_missing_data: bool,
    /// (record, selection set) pairs on the current path
    path: Vec<(DataId, *const Selection)>,
}

impl<'a> Reader<'a> {
    fn read_record(&mut self, id: &DataId, selections: &'a [Selection]) -> Data {
        self.seen_records.insert(id.clone());
        let source = self.source;
        let record = match source.get(id) {
            RecordLookup::Existent(record) => record,
            RecordLookup::Nonexistent | RecordLookup::Unknown => {
                self.is_missing_data = true;
                return Data::Null;
            }
        };

        let marker = (id.clone(), selections.as_ptr());
        if self.path.contains(&marker) {
            return Data::Null;
        }
        self.path.push(marker);

        let mut fields = BTreeMap::new();
        let mut fragments = BTreeMap::new();
        self.traverse_selections(selections, record, &mut fields, &mut fragments);

        self.path.pop();

        let fragment_ref = if fragments.is_empty() {
            None
        } else {
            Some(FragmentRef {
                id: id.clone(),
                fragments,
                owner: self.owner.cloned(),
            })
        };
        Data::Object(Arc::new(DataObject::new(fields, fragment_ref)))
    }

    fn traverse_selections(
        &mut self,
        selections: &'a [Selection],
        record: &'a Record,
        fields: &mut BTreeMap<String, Data>,
        fragments: &mut BTreeMap<String, Variables>,
    ) {
        for selection in selections {
            match selection {
                Selection::ScalarField(field) => {
                    let key = field.storage_key(self.variables);
                    let value = match record.get(&key) {
                        Some(value) => scalar_data(value),
                        None => {
                            self.is_missing_data = true;
                            Data::Null
                        }
                    };
                    fields.insert(field.response_key().to_string(), value);
                }
                Selection::LinkedField(field) => {
                    let key = field.storage_key(self.variables);
                    let value = match record.get(&key) {
                        Some(FieldValue::Reference(target)) => {
                            self.read_record(target, &field.selections)
                        }
                        Some(_) => Data::Null,
                        None => {
                            self.is_missing_data = true;
                            Data::Null
                        }
                    };
                    fields.insert(field.response_key().to_string(), value);
                }
                Selection::PluralLinkedField(field) => {
                    let key = field.storage_key(self.variables);
                    let value = match record.get(&key) {
                        Some(FieldValue::ReferenceList(targets)) => {
                            let items = targets
                                .iter()
                                .map(|target| match target {
                                    Some(target) => self.read_record(target, &field.selections),
                                    None => Data::Null,
                                })
                                .collect();
                            Data::list(items)
                        }
                        Some(_) => Data::Null,
                        None => {
                            self.is_missing_data = true;
                            Data::Null
                        }
                    };
                    fields.insert(field.response_key().to_string(), value);
                }
                Selection::FragmentSpread(spread) => {
                    fragments.insert(
                        spread.fragment.name.clone(),
                        resolve_arguments(&spread.args, self.variables),
                    );
                }
                Selection::InlineFragment(inline) => {
                    if record.typename() == Some(inline.type_condition.as_str()) {
                        self.traverse_selections(&inline.selections, record, fields, fragments);
                    }
                }
                Selection::Condition(condition) => {
                    if condition.passes(self.variables) {
                        self.traverse_selections(&condition.selections, record, fields, fragments);
                    }
                }
            }
        }
    }
}

/// Resolved value of a scalar selection
fn scalar_data(value: &FieldValue) -> Data {
    match value {
        FieldValue::Scalar(value) => Data::scalar(value.clone()),
        FieldValue::ScalarList(items) => {
            Data::list(items.iter().cloned().map(Data::scalar).collect())
        }
        // A reference read as a scalar has no scalar value
        FieldValue::Null | FieldValue::Reference(_) | FieldValue::ReferenceList(_) => Data::Null,
    }
}
