//! Compiled node descriptors
//!
//! Reader and normalization nodes are produced by an external compiler; the
//! cache only traverses them. Both share one closed selection type:
//!
//! ```text
//! Selection
//!   ├── ScalarField          name(args) -> scalar / scalar list
//!   ├── LinkedField          name(args) -> reference       { selections }
//!   ├── PluralLinkedField    name(args) -> reference list  { selections }
//!   ├── FragmentSpread       ...Fragment(args)
//!   ├── InlineFragment       ... on Type { selections }
//!   └── Condition            @include/@skip(if: $var) { selections }
//! ```
//!
//! Readers turn a `FragmentSpread` into a fragment reference; the checker,
//! retention closure and normalizer inline the spread fragment's selections.

use std::sync::Arc;

use crate::types::Variables;
use crate::value::Value;

// ============================================================================
// Arguments
// ============================================================================

/// Source of an argument's value
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    /// Constant written in the document
    Literal(Value),
    /// Reference to a variable bound at read/write time
    Variable(String),
}

/// A field or fragment-spread argument
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    /// Argument name
    pub name: String,
    /// Argument value
    pub value: ArgumentValue,
}

impl Argument {
    /// Literal argument
    pub fn literal(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: ArgumentValue::Literal(value.into()),
        }
    }

    /// Variable argument
    pub fn variable(name: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ArgumentValue::Variable(variable.into()),
        }
    }

    /// Resolve against bound variables; `None` when the variable is unbound
    pub fn resolve(&self, variables: &Variables) -> Option<Value> {
        match &self.value {
            ArgumentValue::Literal(value) => Some(value.clone()),
            ArgumentValue::Variable(name) => variables.get(name).cloned(),
        }
    }
}

/// Resolve a list of arguments into variables, skipping unbound ones
pub fn resolve_arguments(args: &[Argument], variables: &Variables) -> Variables {
    args.iter()
        .filter_map(|arg| arg.resolve(variables).map(|value| (arg.name.clone(), value)))
        .collect()
}

/// Record key of a field: `name` or `name(a:<json>,b:<json>)`
///
/// Arguments are sorted by name and rendered as canonical JSON. Unbound
/// variables are left out so they never split one field into many keys.
pub fn storage_key(name: &str, args: &[Argument], variables: &Variables) -> String {
    if args.is_empty() {
        return name.to_string();
    }
    let mut resolved: Vec<(&str, Value)> = args
        .iter()
        .filter_map(|arg| arg.resolve(variables).map(|value| (arg.name.as_str(), value)))
        .collect();
    if resolved.is_empty() {
        return name.to_string();
    }
    resolved.sort_by(|a, b| a.0.cmp(b.0));

    let rendered: Vec<String> = resolved
        .iter()
        .map(|(arg, value)| format!("{}:{}", arg, value.to_json_string()))
        .collect();
    format!("{}({})", name, rendered.join(","))
}

/// Declared argument of a fragment or operation
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentDefinition {
    /// Argument local to the fragment/operation, with optional default
    Local {
        /// Argument name
        name: String,
        /// Value used when the caller does not pass one
        default_value: Option<Value>,
    },
    /// Fragment argument read from the enclosing operation's variables
    Root {
        /// Variable name in the operation
        name: String,
    },
}

impl ArgumentDefinition {
    /// Local argument with a default
    pub fn local(name: impl Into<String>, default_value: Option<Value>) -> Self {
        ArgumentDefinition::Local {
            name: name.into(),
            default_value,
        }
    }

    /// Root argument
    pub fn root(name: impl Into<String>) -> Self {
        ArgumentDefinition::Root { name: name.into() }
    }

    /// Declared name
    pub fn name(&self) -> &str {
        match self {
            ArgumentDefinition::Local { name, .. } | ArgumentDefinition::Root { name } => name,
        }
    }
}

// ============================================================================
// Selections
// ============================================================================

/// Scalar field selection
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    /// Schema field name
    pub name: String,
    /// Response alias
    pub alias: Option<String>,
    /// Field arguments
    pub args: Vec<Argument>,
}

impl ScalarField {
    /// Field without alias or arguments
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            args: Vec::new(),
        }
    }

    /// Set the alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the arguments
    pub fn with_args(mut self, args: Vec<Argument>) -> Self {
        self.args = args;
        self
    }

    /// Key of this field in resolved data and payloads
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Key of this field in the record
    pub fn storage_key(&self, variables: &Variables) -> String {
        storage_key(&self.name, &self.args, variables)
    }
}

/// Linked (reference or reference list) field selection
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedField {
    /// Schema field name
    pub name: String,
    /// Response alias
    pub alias: Option<String>,
    /// Field arguments
    pub args: Vec<Argument>,
    /// Statically known type of the linked records
    pub concrete_type: Option<String>,
    /// Sub-selections on the linked records
    pub selections: Vec<Selection>,
}

impl LinkedField {
    /// Linked field without alias or arguments
    pub fn new(name: impl Into<String>, selections: Vec<Selection>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            args: Vec::new(),
            concrete_type: None,
            selections,
        }
    }

    /// Set the alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the arguments
    pub fn with_args(mut self, args: Vec<Argument>) -> Self {
        self.args = args;
        self
    }

    /// Set the concrete type
    pub fn with_concrete_type(mut self, typename: impl Into<String>) -> Self {
        self.concrete_type = Some(typename.into());
        self
    }

    /// Key of this field in resolved data and payloads
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Key of this field in the record
    pub fn storage_key(&self, variables: &Variables) -> String {
        storage_key(&self.name, &self.args, variables)
    }
}

/// Spread of a named fragment
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSpread {
    /// The spread fragment
    pub fragment: Arc<ReaderFragment>,
    /// Arguments passed to the fragment
    pub args: Vec<Argument>,
}

/// Type-conditioned selections on the same record
#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragment {
    /// Concrete type the record must have
    pub type_condition: String,
    /// Selections applied when the type matches
    pub selections: Vec<Selection>,
}

/// Selections gated on a boolean variable
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Variable holding the condition
    pub condition: String,
    /// Value the variable must have for the selections to apply
    pub passing_value: bool,
    /// Gated selections
    pub selections: Vec<Selection>,
}

impl Condition {
    /// Whether the gated selections apply under `variables`
    ///
    /// An unbound or non-boolean variable counts as `false`.
    pub fn passes(&self, variables: &Variables) -> bool {
        let value = variables
            .get(&self.condition)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        value == self.passing_value
    }
}

/// One entry of a node's selection set
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Scalar or scalar-list field
    ScalarField(ScalarField),
    /// Single reference field
    LinkedField(LinkedField),
    /// Reference-list field
    PluralLinkedField(LinkedField),
    /// Named fragment spread
    FragmentSpread(FragmentSpread),
    /// Inline fragment with type condition
    InlineFragment(InlineFragment),
    /// Variable-gated selections
    Condition(Condition),
}

impl Selection {
    /// Plain scalar field
    pub fn scalar(name: impl Into<String>) -> Self {
        Selection::ScalarField(ScalarField::new(name))
    }

    /// Plain single-reference field
    pub fn linked(name: impl Into<String>, selections: Vec<Selection>) -> Self {
        Selection::LinkedField(LinkedField::new(name, selections))
    }

    /// Plain reference-list field
    pub fn plural_linked(name: impl Into<String>, selections: Vec<Selection>) -> Self {
        Selection::PluralLinkedField(LinkedField::new(name, selections))
    }

    /// Fragment spread without arguments
    pub fn spread(fragment: Arc<ReaderFragment>) -> Self {
        Selection::FragmentSpread(FragmentSpread {
            fragment,
            args: Vec::new(),
        })
    }

    /// Fragment spread with arguments
    pub fn spread_with_args(fragment: Arc<ReaderFragment>, args: Vec<Argument>) -> Self {
        Selection::FragmentSpread(FragmentSpread { fragment, args })
    }

    /// Inline fragment
    pub fn inline(type_condition: impl Into<String>, selections: Vec<Selection>) -> Self {
        Selection::InlineFragment(InlineFragment {
            type_condition: type_condition.into(),
            selections,
        })
    }

    /// `@include(if: $condition)`
    pub fn include_if(condition: impl Into<String>, selections: Vec<Selection>) -> Self {
        Selection::Condition(Condition {
            condition: condition.into(),
            passing_value: true,
            selections,
        })
    }

    /// `@skip(if: $condition)`
    pub fn skip_if(condition: impl Into<String>, selections: Vec<Selection>) -> Self {
        Selection::Condition(Condition {
            condition: condition.into(),
            passing_value: false,
            selections,
        })
    }
}

impl From<ScalarField> for Selection {
    fn from(field: ScalarField) -> Self {
        Selection::ScalarField(field)
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// Reader node: the selections a fragment (or a query's root) reads
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderFragment {
    /// Fragment name, unique within the compiled artifacts
    pub name: String,
    /// Type the fragment is declared on
    pub type_condition: String,
    /// Whether the fragment reads a list of records (`@relay(plural: true)`)
    pub plural: bool,
    /// Declared fragment arguments
    pub argument_definitions: Vec<ArgumentDefinition>,
    /// Selections
    pub selections: Vec<Selection>,
}

impl ReaderFragment {
    /// Singular fragment without arguments
    pub fn new(
        name: impl Into<String>,
        type_condition: impl Into<String>,
        selections: Vec<Selection>,
    ) -> Self {
        Self {
            name: name.into(),
            type_condition: type_condition.into(),
            plural: false,
            argument_definitions: Vec::new(),
            selections,
        }
    }

    /// Mark the fragment plural
    pub fn into_plural(mut self) -> Self {
        self.plural = true;
        self
    }

    /// Set the declared arguments
    pub fn with_argument_definitions(mut self, definitions: Vec<ArgumentDefinition>) -> Self {
        self.argument_definitions = definitions;
        self
    }
}

/// Normalization node: the full required-field set of an operation
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationNode {
    /// Operation name
    pub name: String,
    /// Declared operation variables
    pub argument_definitions: Vec<ArgumentDefinition>,
    /// Selections
    pub selections: Vec<Selection>,
}

impl NormalizationNode {
    /// Node without declared variables
    pub fn new(name: impl Into<String>, selections: Vec<Selection>) -> Self {
        Self {
            name: name.into(),
            argument_definitions: Vec::new(),
            selections,
        }
    }

    /// Set the declared variables
    pub fn with_argument_definitions(mut self, definitions: Vec<ArgumentDefinition>) -> Self {
        self.argument_definitions = definitions;
        self
    }
}

/// Kind of operation a request performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Read
    Query,
    /// Write
    Mutation,
    /// Long-lived stream
    Subscription,
}

/// What the network collaborator needs to send a request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestParameters {
    /// Operation name
    pub name: String,
    /// Persisted query id
    pub id: Option<String>,
    /// Query text
    pub text: Option<String>,
    /// Operation kind
    pub operation_kind: OperationKind,
}

/// Compiled request: reader fragment + normalization node + parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ConcreteRequest {
    /// Network parameters
    pub params: RequestParameters,
    /// Reader node for the operation's root
    pub fragment: Arc<ReaderFragment>,
    /// Normalization node for the operation's root
    pub operation: Arc<NormalizationNode>,
}

impl ConcreteRequest {
    /// Query request from its two nodes, named after the normalization node
    pub fn query(fragment: ReaderFragment, operation: NormalizationNode) -> Self {
        Self {
            params: RequestParameters {
                name: operation.name.clone(),
                id: None,
                text: None,
                operation_kind: OperationKind::Query,
            },
            fragment: Arc::new(fragment),
            operation: Arc::new(operation),
        }
    }

    /// Operation name
    pub fn name(&self) -> &str {
        &self.params.name
    }
}

// ============================================================================
// Variable derivation
// ============================================================================

/// Variables a fragment reads with
///
/// Starts from the arguments passed at the spread, fills local arguments with
/// their defaults and root arguments from the operation's variables.
pub fn get_fragment_variables(
    fragment: &ReaderFragment,
    root_variables: &Variables,
    argument_variables: &Variables,
) -> Variables {
    let mut variables = argument_variables.clone();
    for definition in &fragment.argument_definitions {
        if variables.contains(definition.name()) {
            continue;
        }
        match definition {
            ArgumentDefinition::Local {
                name,
                default_value,
            } => {
                variables.insert(name.clone(), default_value.clone().unwrap_or(Value::Null));
            }
            ArgumentDefinition::Root { name } => {
                if let Some(value) = root_variables.get(name) {
                    variables.insert(name.clone(), value.clone());
                }
            }
        }
    }
    variables
}

/// Variables an operation runs with: declared variables only, defaults filled
pub fn get_operation_variables(operation: &NormalizationNode, variables: &Variables) -> Variables {
    let mut operation_variables = Variables::new();
    for definition in &operation.argument_definitions {
        let name = definition.name();
        let value = match (variables.get(name), definition) {
            (Some(value), _) => value.clone(),
            (None, ArgumentDefinition::Local { default_value, .. }) => {
                default_value.clone().unwrap_or(Value::Null)
            }
            (None, ArgumentDefinition::Root { .. }) => Value::Null,
        };
        operation_variables.insert(name.to_string(), value);
    }
    operation_variables
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_without_args() {
        assert_eq!(storage_key("name", &[], &Variables::new()), "name");
    }

    #[test]
    fn test_storage_key_sorts_and_renders_json() {
        let args = vec![
            Argument::variable("first", "count"),
            Argument::literal("after", "cursor1"),
        ];
        let variables = Variables::new().with("count", 10i64);
        assert_eq!(
            storage_key("friends", &args, &variables),
            r#"friends(after:"cursor1",first:10)"#
        );
    }

    #[test]
    fn test_storage_key_skips_unbound_variables() {
        let args = vec![Argument::variable("first", "count")];
        assert_eq!(storage_key("friends", &args, &Variables::new()), "friends");
    }

    #[test]
    fn test_response_key_prefers_alias() {
        let field = ScalarField::new("name").with_alias("fullName");
        assert_eq!(field.response_key(), "fullName");
        assert_eq!(field.storage_key(&Variables::new()), "name");
    }

    #[test]
    fn test_condition_passes() {
        let include = match Selection::include_if("withName", vec![]) {
            Selection::Condition(c) => c,
            _ => unreachable!(),
        };
        assert!(include.passes(&Variables::new().with("withName", true)));
        assert!(!include.passes(&Variables::new().with("withName", false)));
        assert!(!include.passes(&Variables::new()));

        let skip = match Selection::skip_if("hide", vec![]) {
            Selection::Condition(c) => c,
            _ => unreachable!(),
        };
        assert!(skip.passes(&Variables::new()));
        assert!(!skip.passes(&Variables::new().with("hide", true)));
    }

    #[test]
    fn test_fragment_variables() {
        let fragment = ReaderFragment::new("UserProfile", "User", vec![]).with_argument_definitions(vec![
            ArgumentDefinition::local("size", Some(Value::Int(32))),
            ArgumentDefinition::local("scale", None),
            ArgumentDefinition::root("locale"),
        ]);
        let root = Variables::new().with("locale", "en").with("unrelated", 1i64);
        let args = Variables::new().with("size", 64i64);

        let variables = get_fragment_variables(&fragment, &root, &args);
        assert_eq!(variables.get("size"), Some(&Value::Int(64)));
        assert_eq!(variables.get("scale"), Some(&Value::Null));
        assert_eq!(variables.get("locale"), Some(&Value::from("en")));
        assert!(!variables.contains("unrelated"));
    }

    #[test]
    fn test_operation_variables_fill_defaults() {
        let node = NormalizationNode::new("UserQuery", vec![]).with_argument_definitions(vec![
            ArgumentDefinition::local("id", None),
            ArgumentDefinition::local("count", Some(Value::Int(5))),
        ]);
        let variables = get_operation_variables(&node, &Variables::new().with("id", "4").with("extra", 1i64));
        assert_eq!(variables.get("id"), Some(&Value::from("4")));
        assert_eq!(variables.get("count"), Some(&Value::Int(5)));
        assert!(!variables.contains("extra"));
    }
}
