//! Selectors, operation descriptors and selector derivation
//!
//! - `NormalizationSelector`: (data id, normalization node, variables), used
//!   to write payloads, `check` and `retain`
//! - `ReaderSelector`: (data id, reader node, variables, owner), used for
//!   `lookup` and `subscribe`
//! - `OperationDescriptor`: both selectors for one variable-bound operation
//!
//! The derivation family (`get_selector`, `get_selectors_from_object`,
//! `get_data_ids_from_object`, `get_variables_from_object`) turns prop values
//! carrying fragment references into reader selectors. A prop that does not
//! match the fragment's expected shape is a caller contract violation and is
//! reported synchronously.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::data::Data;
use crate::error::{StrataError, StrataResult};
use crate::node::{
    get_fragment_variables, get_operation_variables, ConcreteRequest, NormalizationNode,
    ReaderFragment,
};
use crate::types::{DataId, Variables};

/// Fragment map keyed by prop name
pub type FragmentMap = BTreeMap<String, Arc<ReaderFragment>>;

/// External props keyed by prop name
pub type Props = BTreeMap<String, Data>;

// ============================================================================
// Request / operation descriptors
// ============================================================================

/// A compiled request bound to its variables
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Compiled request
    pub request: Arc<ConcreteRequest>,
    /// Operation variables
    pub variables: Variables,
}

impl RequestDescriptor {
    /// Stable identifier: operation name plus canonical variables
    pub fn identifier(&self) -> String {
        format!("{}{}", self.request.name(), self.variables.cache_key())
    }
}

impl PartialEq for RequestDescriptor {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.request, &other.request) || self.request.name() == other.request.name())
            && self.variables == other.variables
    }
}

/// One fully variable-bound instance of an operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    /// Reader selector for the operation's root
    pub fragment: ReaderSelector,
    /// Normalization selector for the operation's root
    pub root: NormalizationSelector,
    /// The request and its variables
    pub request: Arc<RequestDescriptor>,
}

impl OperationDescriptor {
    /// The compiled request
    pub fn node(&self) -> &Arc<ConcreteRequest> {
        &self.request.request
    }

    /// Operation variables
    pub fn variables(&self) -> &Variables {
        &self.request.variables
    }
}

/// Build the descriptor of `request` rooted at the root record
pub fn create_operation_descriptor(
    request: Arc<ConcreteRequest>,
    variables: &Variables,
) -> OperationDescriptor {
    create_operation_descriptor_at(request, variables, DataId::root())
}

/// Build the descriptor of `request` rooted at `data_id`
///
/// Variables are narrowed to the operation's declared variables with defaults
/// filled in; both selectors share `data_id` and those variables.
pub fn create_operation_descriptor_at(
    request: Arc<ConcreteRequest>,
    variables: &Variables,
    data_id: DataId,
) -> OperationDescriptor {
    let operation_variables = get_operation_variables(&request.operation, variables);
    let descriptor = Arc::new(RequestDescriptor {
        request: Arc::clone(&request),
        variables: operation_variables.clone(),
    });
    OperationDescriptor {
        fragment: ReaderSelector {
            data_id: data_id.clone(),
            node: Arc::clone(&request.fragment),
            variables: operation_variables.clone(),
            owner: Some(Arc::clone(&descriptor)),
        },
        root: NormalizationSelector {
            data_id,
            node: Arc::clone(&request.operation),
            variables: operation_variables,
        },
        request: descriptor,
    }
}

// ============================================================================
// Selectors
// ============================================================================

/// Subgraph to read or subscribe to
#[derive(Debug, Clone)]
pub struct ReaderSelector {
    /// Root record of the read
    pub data_id: DataId,
    /// Reader node
    pub node: Arc<ReaderFragment>,
    /// Variables the node is read with
    pub variables: Variables,
    /// Request the selector was derived from
    pub owner: Option<Arc<RequestDescriptor>>,
}

impl ReaderSelector {
    /// Selector without an owner
    pub fn new(data_id: impl Into<DataId>, node: Arc<ReaderFragment>, variables: Variables) -> Self {
        Self {
            data_id: data_id.into(),
            node,
            variables,
            owner: None,
        }
    }

    /// Set the owner
    pub fn with_owner(mut self, owner: Arc<RequestDescriptor>) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Cache key: (data id, fragment name, variables)
    pub fn cache_key(&self) -> SelectorKey {
        SelectorKey(format!(
            "{}\u{1f}{}\u{1f}{}",
            self.data_id,
            self.node.name,
            self.variables.cache_key()
        ))
    }
}

impl PartialEq for ReaderSelector {
    fn eq(&self, other: &Self) -> bool {
        let owners_equal = match (&self.owner, &other.owner) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        };
        self.data_id == other.data_id
            && (Arc::ptr_eq(&self.node, &other.node) || self.node.name == other.node.name)
            && self.variables == other.variables
            && owners_equal
    }
}

/// Hashable identity of a reader selector
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectorKey(String);

/// Subgraph to write, check or retain
#[derive(Debug, Clone)]
pub struct NormalizationSelector {
    /// Root record
    pub data_id: DataId,
    /// Normalization node
    pub node: Arc<NormalizationNode>,
    /// Variables
    pub variables: Variables,
}

impl NormalizationSelector {
    /// Create a selector
    pub fn new(data_id: impl Into<DataId>, node: Arc<NormalizationNode>, variables: Variables) -> Self {
        Self {
            data_id: data_id.into(),
            node,
            variables,
        }
    }
}

impl PartialEq for NormalizationSelector {
    fn eq(&self, other: &Self) -> bool {
        self.data_id == other.data_id
            && (Arc::ptr_eq(&self.node, &other.node) || self.node.name == other.node.name)
            && self.variables == other.variables
    }
}

// ============================================================================
// Selector derivation
// ============================================================================

/// Selector(s) derived for one prop
#[derive(Debug, Clone, PartialEq)]
pub enum PropSelector {
    /// Singular fragment
    Singular(ReaderSelector),
    /// Plural fragment, one selector per non-null item
    Plural(Vec<ReaderSelector>),
}

impl PropSelector {
    /// Selectors in item order
    pub fn selectors(&self) -> Vec<&ReaderSelector> {
        match self {
            PropSelector::Singular(selector) => vec![selector],
            PropSelector::Plural(selectors) => selectors.iter().collect(),
        }
    }
}

/// Record id(s) a prop points at
#[derive(Debug, Clone, PartialEq)]
pub enum PropDataIds {
    /// Singular fragment
    Singular(DataId),
    /// Plural fragment
    Plural(Vec<DataId>),
}

/// Reader selector for one fragment reference
///
/// Returns `Ok(None)` for a null prop.
///
/// # Errors
///
/// `InvalidFragmentReference` when the prop is a list, a scalar, or an object
/// that does not carry a reference to `fragment`.
pub fn get_selector(fragment: &Arc<ReaderFragment>, item: &Data) -> StrataResult<Option<ReaderSelector>> {
    let object = match item {
        Data::Null | Data::Scalar(crate::Value::Null) => return Ok(None),
        Data::Object(object) => object,
        Data::List(_) => {
            return Err(StrataError::invalid_fragment_reference(
                &fragment.name,
                "expected a single object but got a list; is the fragment missing @relay(plural: true)?",
            ))
        }
        Data::Scalar(value) => {
            return Err(StrataError::invalid_fragment_reference(
                &fragment.name,
                format!("expected an object but got a {}", value.type_name()),
            ))
        }
    };

    let fragment_ref = object.fragment_ref().ok_or_else(|| {
        StrataError::invalid_fragment_reference(&fragment.name, "object carries no fragment reference")
    })?;
    let arguments = fragment_ref.arguments(&fragment.name).ok_or_else(|| {
        StrataError::invalid_fragment_reference(
            &fragment.name,
            format!("fragment is not spread on record {}", fragment_ref.id),
        )
    })?;

    let root_variables = fragment_ref
        .owner
        .as_ref()
        .map(|owner| owner.variables.clone())
        .unwrap_or_default();
    let variables = get_fragment_variables(fragment, &root_variables, arguments);

    Ok(Some(ReaderSelector {
        data_id: fragment_ref.id.clone(),
        node: Arc::clone(fragment),
        variables,
        owner: fragment_ref.owner.clone(),
    }))
}

/// Reader selectors for a list of fragment references
///
/// Null items are skipped. Returns `Ok(None)` for a null prop.
///
/// # Errors
///
/// `InvalidFragmentReference` when the prop is not a list or an item does not
/// carry a reference to `fragment`.
pub fn get_selector_list(
    fragment: &Arc<ReaderFragment>,
    items: &Data,
) -> StrataResult<Option<Vec<ReaderSelector>>> {
    let items = match items {
        Data::Null | Data::Scalar(crate::Value::Null) => return Ok(None),
        Data::List(items) => items,
        _ => {
            return Err(StrataError::invalid_fragment_reference(
                &fragment.name,
                "expected a list of objects for a plural fragment",
            ))
        }
    };
    let mut selectors = Vec::with_capacity(items.len());
    for item in items.iter() {
        if let Some(selector) = get_selector(fragment, item)? {
            selectors.push(selector);
        }
    }
    Ok(Some(selectors))
}

/// Selector(s) for one prop according to the fragment's plurality
pub fn get_prop_selector(
    fragment: &Arc<ReaderFragment>,
    value: &Data,
) -> StrataResult<Option<PropSelector>> {
    if fragment.plural {
        Ok(get_selector_list(fragment, value)?.map(PropSelector::Plural))
    } else {
        Ok(get_selector(fragment, value)?.map(PropSelector::Singular))
    }
}

/// Selectors for every fragment key of `props`
///
/// Keys absent from `props` are treated as null.
pub fn get_selectors_from_object(
    fragments: &FragmentMap,
    props: &Props,
) -> StrataResult<BTreeMap<String, Option<PropSelector>>> {
    let mut selectors = BTreeMap::new();
    for (key, fragment) in fragments {
        let value = props.get(key).unwrap_or(&Data::Null);
        selectors.insert(key.clone(), get_prop_selector(fragment, value)?);
    }
    Ok(selectors)
}

/// Record ids referenced by every fragment key of `props`
pub fn get_data_ids_from_object(
    fragments: &FragmentMap,
    props: &Props,
) -> StrataResult<BTreeMap<String, Option<PropDataIds>>> {
    let selectors = get_selectors_from_object(fragments, props)?;
    Ok(selectors
        .into_iter()
        .map(|(key, selector)| {
            let ids = selector.map(|selector| match selector {
                PropSelector::Singular(s) => PropDataIds::Singular(s.data_id),
                PropSelector::Plural(list) => {
                    PropDataIds::Plural(list.into_iter().map(|s| s.data_id).collect())
                }
            });
            (key, ids)
        })
        .collect())
}

/// Union of the variables of every selector derived from `props`
pub fn get_variables_from_object(fragments: &FragmentMap, props: &Props) -> StrataResult<Variables> {
    let mut variables = Variables::new();
    for selector in get_selectors_from_object(fragments, props)?.values().flatten() {
        for item in selector.selectors() {
            variables.merge(&item.variables);
        }
    }
    Ok(variables)
}
