//! Normalization traversal: `check` and retention closure
//!
//! Both walk a normalization selector's full required-field set, inlining
//! fragment spreads with their fragment variables. `check` stops at the
//! first missing field; `closure` visits everything and collects the
//! DataIDs reached.

use std::collections::HashSet;

use strata_core::{
    get_fragment_variables, resolve_arguments, DataId, FieldValue, NormalizationSelector, Record,
    Selection, Variables,
};
use strata_storage::{RecordLookup, RecordSource};

/// Whether every required field of `selector` is present in `source`
pub fn check(selector: &NormalizationSelector, source: &RecordSource) -> bool {
    let mut traversal = Traversal::new(source, &selector.variables, Mode::Check);
    traversal.visit_record(&selector.data_id, &selector.node.selections, &selector.variables);
    !traversal.is_missing_data
}

/// DataIDs reachable from `selector` through its required fields
///
/// Includes the root and ids that are referenced but unknown or
/// nonexistent.
pub fn closure(selector: &NormalizationSelector, source: &RecordSource) -> HashSet<DataId> {
    let mut traversal = Traversal::new(source, &selector.variables, Mode::Collect);
    traversal.visit_record(&selector.data_id, &selector.node.selections, &selector.variables);
    traversal.reached
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Check,
    Collect,
}

struct Traversal<'a> {
    source: &'a RecordSource,
    root_variables: &'a Variables,
    mode: Mode,
    is_missing_data: bool,
    reached: HashSet<DataId>,
    path: Vec<(DataId, *const Selection)>,
}

impl<'a> Traversal<'a> {
    fn new(source: &'a RecordSource, root_variables: &'a Variables, mode: Mode) -> Self {
        Self {
            source,
            root_variables,
            mode,
            is_missing_data: false,
            reached: HashSet::new(),
            path: Vec::new(),
        }
    }

    fn done(&self) -> bool {
        self.mode == Mode::Check && self.is_missing_data
    }

    fn visit_record(&mut self, id: &DataId, selections: &[Selection], variables: &Variables) {
        if self.mode == Mode::Collect {
            self.reached.insert(id.clone());
        }
        let source = self.source;
        let record = match source.get(id) {
            RecordLookup::Existent(record) => record,
            RecordLookup::Nonexistent | RecordLookup::Unknown => {
                self.is_missing_data = true;
                return;
            }
        };

        let marker = (id.clone(), selections.as_ptr());
        if self.path.contains(&marker) {
            return;
        }
        self.path.push(marker);
        self.traverse_selections(selections, record, variables);
        self.path.pop();
    }

    fn traverse_selections(&mut self, selections: &[Selection], record: &Record, variables: &Variables) {
        for selection in selections {
            if self.done() {
                return;
            }
            match selection {
                Selection::ScalarField(field) => {
                    if !record.has(&field.storage_key(variables)) {
                        self.is_missing_data = true;
                    }
                }
                Selection::LinkedField(field) | Selection::PluralLinkedField(field) => {
                    match record.get(&field.storage_key(variables)) {
                        None => self.is_missing_data = true,
                        Some(FieldValue::Reference(target)) => {
                            self.visit_record(target, &field.selections, variables);
                        }
                        Some(FieldValue::ReferenceList(targets)) => {
                            for target in targets.iter().flatten() {
                                if self.done() {
                                    return;
                                }
                                self.visit_record(target, &field.selections, variables);
                            }
                        }
                        Some(_) => {}
                    }
                }
                Selection::FragmentSpread(spread) => {
                    let arguments = resolve_arguments(&spread.args, variables);
                    let fragment_variables =
                        get_fragment_variables(&spread.fragment, self.root_variables, &arguments);
                    self.traverse_selections(&spread.fragment.selections, record, &fragment_variables);
                }
                Selection::InlineFragment(inline) => {
                    if record.typename() == Some(inline.type_condition.as_str()) {
                        self.traverse_selections(&inline.selections, record, variables);
                    }
                }
                Selection::Condition(condition) => {
                    if condition.passes(variables) {
                        self.traverse_selections(&condition.selections, record, variables);
                    }
                }
            }
        }
    }
}
