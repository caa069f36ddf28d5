//! Response normalizer: JSON payload to write batch
//!
//! Walks a normalization selector over a response payload and emits one
//! `Merge` per record reached. Linked objects are identified by their `id`
//! field, or by a client id derived from the parent and storage key.
//! Typenames come from `__typename`, falling back to the field's concrete
//! type; the root record is always `__Root`.

use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use tracing::trace;

use strata_core::{
    get_fragment_variables, resolve_arguments, DataId, FieldValue, LinkedField,
    NormalizationSelector, Selection, StrataError, StrataResult, Variables, ROOT_ID, ROOT_TYPE,
};
use strata_storage::WriteBatch;

/// JSON object as received from the network
pub type PayloadData = Map<String, Json>;

/// Normalize `payload` for `selector` into `batch`
///
/// Fields absent from the payload are left untouched in the store.
///
/// # Errors
///
/// `StrataError::InvalidPayload` when a value does not match its selection
/// (an object where a list is selected, a scalar where an object is, ...).
pub fn normalize(
    selector: &NormalizationSelector,
    payload: &PayloadData,
    batch: &mut WriteBatch,
) -> StrataResult<()> {
    let typename = if selector.data_id.as_str() == ROOT_ID {
        Some(ROOT_TYPE.to_string())
    } else {
        payload_typename(payload)
    };
    let normalizer = Normalizer {
        root_variables: &selector.variables,
    };
    normalizer.normalize_record(
        &selector.data_id,
        typename,
        payload,
        &selector.node.selections,
        &selector.variables,
        batch,
    )
}

struct Normalizer<'a> {
    root_variables: &'a Variables,
}

impl Normalizer<'_> {
    fn normalize_record(
        &self,
        id: &DataId,
        typename: Option<String>,
        payload: &PayloadData,
        selections: &[Selection],
        variables: &Variables,
        batch: &mut WriteBatch,
    ) -> StrataResult<()> {
        let mut fields = BTreeMap::new();
        self.traverse_selections(
            id,
            typename.as_deref(),
            payload,
            selections,
            variables,
            &mut fields,
            batch,
        )?;
        batch.merge(id.clone(), typename.as_deref(), fields);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn traverse_selections(
        &self,
        id: &DataId,
        typename: Option<&str>,
        payload: &PayloadData,
        selections: &[Selection],
        variables: &Variables,
        fields: &mut BTreeMap<String, FieldValue>,
        batch: &mut WriteBatch,
    ) -> StrataResult<()> {
        for selection in selections {
            match selection {
                Selection::ScalarField(field) => {
                    let Some(value) = payload.get(field.response_key()) else {
                        trace!(target: "strata::store", id = %id, field = %field.name, "Payload omits field");
                        continue;
                    };
                    fields.insert(field.storage_key(variables), FieldValue::from_json_scalar(value));
                }
                Selection::LinkedField(field) => {
                    let Some(value) = payload.get(field.response_key()) else {
                        continue;
                    };
                    let key = field.storage_key(variables);
                    let stored = match value {
                        Json::Null => FieldValue::Null,
                        Json::Object(object) => {
                            let child = self.normalize_linked(id, &key, None, field, object, variables, batch)?;
                            FieldValue::Reference(child)
                        }
                        other => {
                            return Err(StrataError::invalid_payload(format!(
                                "expected an object or null for '{}' on {}, got {}",
                                field.response_key(),
                                id,
                                json_kind(other)
                            )))
                        }
                    };
                    fields.insert(key, stored);
                }
                Selection::PluralLinkedField(field) => {
                    let Some(value) = payload.get(field.response_key()) else {
                        continue;
                    };
                    let key = field.storage_key(variables);
                    let stored = match value {
                        Json::Null => FieldValue::Null,
                        Json::Array(items) => {
                            let mut ids = Vec::with_capacity(items.len());
                            for (index, item) in items.iter().enumerate() {
                                match item {
                                    Json::Null => ids.push(None),
                                    Json::Object(object) => ids.push(Some(self.normalize_linked(
                                        id,
                                        &key,
                                        Some(index),
                                        field,
                                        object,
                                        variables,
                                        batch,
                                    )?)),
                                    other => {
                                        return Err(StrataError::invalid_payload(format!(
                                            "expected objects in list '{}' on {}, got {}",
                                            field.response_key(),
                                            id,
                                            json_kind(other)
                                        )))
                                    }
                                }
                            }
                            FieldValue::ReferenceList(ids)
                        }
                        other => {
                            return Err(StrataError::invalid_payload(format!(
                                "expected a list or null for '{}' on {}, got {}",
                                field.response_key(),
                                id,
                                json_kind(other)
                            )))
                        }
                    };
                    fields.insert(key, stored);
                }
                Selection::FragmentSpread(spread) => {
                    let arguments = resolve_arguments(&spread.args, variables);
                    let fragment_variables =
                        get_fragment_variables(&spread.fragment, self.root_variables, &arguments);
                    self.traverse_selections(
                        id,
                        typename,
                        payload,
                        &spread.fragment.selections,
                        &fragment_variables,
                        fields,
                        batch,
                    )?;
                }
                Selection::InlineFragment(inline) => {
                    if typename == Some(inline.type_condition.as_str()) {
                        self.traverse_selections(
                            id,
                            typename,
                            payload,
                            &inline.selections,
                            variables,
                            fields,
                            batch,
                        )?;
                    }
                }
                Selection::Condition(condition) => {
                    if condition.passes(variables) {
                        self.traverse_selections(
                            id,
                            typename,
                            payload,
                            &condition.selections,
                            variables,
                            fields,
                            batch,
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn normalize_linked(
        &self,
        parent: &DataId,
        storage_key: &str,
        index: Option<usize>,
        field: &LinkedField,
        object: &PayloadData,
        variables: &Variables,
        batch: &mut WriteBatch,
    ) -> StrataResult<DataId> {
        let id = match object.get("id") {
            Some(Json::String(id)) => DataId::from(id.as_str()),
            Some(Json::Number(id)) => DataId::new(id.to_string()),
            _ => DataId::client_id(parent, storage_key, index),
        };
        let typename = payload_typename(object).or_else(|| field.concrete_type.clone());
        self.normalize_record(&id, typename, object, &field.selections, variables, batch)?;
        Ok(id)
    }
}

fn payload_typename(payload: &PayloadData) -> Option<String> {
    payload
        .get("__typename")
        .and_then(Json::as_str)
        .map(str::to_string)
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "list",
        Json::Object(_) => "object",
    }
}
