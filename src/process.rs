//! Process specifications, contracts and executable implementations.
//!
//! A process is a typed function signature without a body: an id, an
//! ordered parameter list (each with a schema, a required flag and an
//! optional default) and a return schema. The engine validates node
//! arguments against this signature through [`ProcessContract::validate`];
//! the body itself is supplied by the host as a [`ProcessRunner`] and is
//! invoked with a fully resolved [`ProcessInvocation`] snapshot, never with
//! live graph internals.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::errors::ProcessGraphError;
use crate::graph::ProcessGraph;
use crate::node::Argument;
use crate::schema::{element_schema, is_empty_schema, is_schema_compatible, normalize_schema};

/// Declared parameter of a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_schema")]
    pub schema: Value,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub experimental: bool,
    /// Declared default. An explicitly given `null` default is preserved
    /// and distinct from an absent one.
    #[serde(default, deserialize_with = "present_value", skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

fn empty_schema() -> Value {
    json!({})
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl ParameterSpec {
    /// A required parameter accepting anything; the shape auto-declared
    /// parameters take.
    #[must_use]
    pub fn any(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: json!({}),
            optional: false,
            deprecated: false,
            experimental: false,
            default: None,
        }
    }
}

/// Declared return value of a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_schema")]
    pub schema: Value,
}

/// A process signature as exchanged on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<ReturnSpec>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub experimental: bool,
}

impl ProcessSpec {
    /// The declared return schema, or the empty (accept-anything) schema.
    #[must_use]
    pub fn returns_schema(&self) -> Value {
        self.returns
            .as_ref()
            .map_or_else(|| json!({}), |r| r.schema.clone())
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Derives the callback parameters declared for a process parameter slot.
///
/// `path` addresses the slot: the first segment is the parameter name, the
/// remaining segments descend into array/object element schemas. When the
/// slot's schema offers several alternative callback shapes, the parameter
/// lists of all alternatives are unioned. That over-accepts arguments whose
/// shape is pinned by the actual call site, which is the documented
/// conservative behavior.
#[must_use]
pub fn callback_parameters_for(spec: &ProcessSpec, path: &[String]) -> Vec<ParameterSpec> {
    let Some((first, rest)) = path.split_first() else {
        return Vec::new();
    };
    let Some(param) = spec.parameter(first) else {
        return Vec::new();
    };
    let mut alternatives = normalize_schema(&param.schema);
    for segment in rest {
        alternatives = alternatives
            .iter()
            .map(|alt| element_schema(alt, segment))
            .filter(|s| !is_empty_schema(s))
            .collect();
    }

    let mut union: Vec<ParameterSpec> = Vec::new();
    for alternative in &alternatives {
        let Some(declared) = alternative.get("parameters").and_then(Value::as_array) else {
            continue;
        };
        for entry in declared {
            if let Ok(param) = serde_json::from_value::<ParameterSpec>(entry.clone())
                && !union.iter().any(|p| p.name == param.name)
            {
                union.push(param);
            }
        }
    }
    union
}

/// Executable body of a process, supplied by the host.
///
/// Implementations receive a resolved invocation: node results and
/// parameter references have been replaced by concrete values, callbacks
/// by owned graph clones ready to execute.
#[async_trait]
pub trait ProcessRunner: Send + Sync + std::fmt::Debug {
    async fn run(&self, invocation: ProcessInvocation) -> Result<Value, ProcessGraphError>;
}

/// A fully evaluated argument value handed to a [`ProcessRunner`].
///
/// Pure data collapses into [`ResolvedArgument::Value`]; the container
/// variants only appear when a callback is nested somewhere inside.
#[derive(Debug, Clone)]
pub enum ResolvedArgument {
    Value(Value),
    Array(Vec<ResolvedArgument>),
    Object(Vec<(String, ResolvedArgument)>),
    /// An owned callback graph, independent of the graph it was declared
    /// in; executing it repeatedly yields independent runs.
    Callback(ProcessGraph),
}

impl ResolvedArgument {
    /// Builds an array argument, collapsing to plain JSON when no callback
    /// is involved.
    #[must_use]
    pub fn array(items: Vec<ResolvedArgument>) -> Self {
        if items.iter().all(|i| matches!(i, ResolvedArgument::Value(_))) {
            ResolvedArgument::Value(Value::Array(
                items
                    .into_iter()
                    .map(|i| match i {
                        ResolvedArgument::Value(v) => v,
                        _ => unreachable!(),
                    })
                    .collect(),
            ))
        } else {
            ResolvedArgument::Array(items)
        }
    }

    /// Builds an object argument, collapsing to plain JSON when no
    /// callback is involved.
    #[must_use]
    pub fn object(fields: Vec<(String, ResolvedArgument)>) -> Self {
        if fields
            .iter()
            .all(|(_, v)| matches!(v, ResolvedArgument::Value(_)))
        {
            ResolvedArgument::Value(Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| match v {
                        ResolvedArgument::Value(v) => (k, v),
                        _ => unreachable!(),
                    })
                    .collect(),
            ))
        } else {
            ResolvedArgument::Object(fields)
        }
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ResolvedArgument::Value(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_callback(&self) -> Option<&ProcessGraph> {
        match self {
            ResolvedArgument::Callback(g) => Some(g),
            _ => None,
        }
    }

    /// Converts into plain JSON, serializing embedded callbacks back to
    /// their wire shape.
    #[must_use]
    pub fn into_json(self) -> Value {
        match self {
            ResolvedArgument::Value(v) => v,
            ResolvedArgument::Array(items) => {
                Value::Array(items.into_iter().map(ResolvedArgument::into_json).collect())
            }
            ResolvedArgument::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect(),
            ),
            ResolvedArgument::Callback(graph) => graph.to_json(),
        }
    }
}

/// Resolved snapshot of one node invocation, handed to the runner.
#[derive(Debug, Clone)]
pub struct ProcessInvocation {
    node_id: String,
    process_id: String,
    namespace: Option<String>,
    arguments: FxHashMap<String, ResolvedArgument>,
}

impl ProcessInvocation {
    pub(crate) fn new(
        node_id: &str,
        process_id: &str,
        namespace: Option<&str>,
        arguments: FxHashMap<String, ResolvedArgument>,
    ) -> Self {
        Self {
            node_id: node_id.to_string(),
            process_id: process_id.to_string(),
            namespace: namespace.map(str::to_string),
            arguments,
        }
    }

    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    #[must_use]
    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Supplied argument names, sorted for reproducible output.
    #[must_use]
    pub fn argument_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.arguments.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&ResolvedArgument> {
        self.arguments.get(name)
    }

    /// The plain JSON value of an argument, if it is one.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name).and_then(ResolvedArgument::as_value)
    }

    /// The plain JSON value of an argument, or `fallback` when absent.
    #[must_use]
    pub fn value_or(&self, name: &str, fallback: Value) -> Value {
        self.value(name).cloned().unwrap_or(fallback)
    }

    /// The plain JSON value of a required argument.
    pub fn require_value(&self, name: &str) -> Result<&Value, ProcessGraphError> {
        self.value(name).ok_or_else(|| {
            ProcessGraphError::internal(format!(
                "Process '{}' invoked without a value for argument '{}'",
                self.process_id, name
            ))
        })
    }

    /// Removes and returns a callback argument for execution.
    #[must_use]
    pub fn take_callback(&mut self, name: &str) -> Option<ProcessGraph> {
        match self.arguments.remove(name) {
            Some(ResolvedArgument::Callback(graph)) => Some(graph),
            Some(other) => {
                self.arguments.insert(name.to_string(), other);
                None
            }
            None => None,
        }
    }
}

/// A process specification paired with its optional executable body.
///
/// The contract owns the whole validation path for one node; execution is
/// delegated to the runner and fails if none was registered, which is a
/// configuration error rather than a runtime condition.
#[derive(Debug, Clone)]
pub struct ProcessContract {
    spec: ProcessSpec,
    runner: Option<Arc<dyn ProcessRunner>>,
}

impl ProcessContract {
    /// A declaration-only contract; `execute` on it always fails.
    #[must_use]
    pub fn new(spec: ProcessSpec) -> Self {
        Self { spec, runner: None }
    }

    #[must_use]
    pub fn with_runner(spec: ProcessSpec, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            spec,
            runner: Some(runner),
        }
    }

    #[must_use]
    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.spec.id
    }

    #[must_use]
    pub fn returns_schema(&self) -> Value {
        self.spec.returns_schema()
    }

    /// Validates a node's arguments against this contract.
    ///
    /// Checks undeclared arguments first, then walks the declared
    /// parameters in order: missing required arguments fail, optional ones
    /// are skipped, present ones are validated per reference kind.
    pub async fn validate(
        &self,
        graph: &mut ProcessGraph,
        node_id: &str,
    ) -> Result<(), ProcessGraphError> {
        let node = graph.node(node_id).ok_or_else(|| {
            ProcessGraphError::internal(format!("Unknown node '{node_id}' during validation"))
        })?;

        let mut unsupported: Vec<String> = node
            .argument_names()
            .into_iter()
            .filter(|name| self.spec.parameter(name).is_none())
            .map(str::to_string)
            .collect();
        if !unsupported.is_empty() {
            unsupported.sort_unstable();
            return Err(ProcessGraphError::ProcessArgumentUnsupported {
                process: self.spec.id.clone(),
                arguments: unsupported,
            });
        }

        for param in self.spec.parameters.clone() {
            let Some(argument) = graph
                .node(node_id)
                .and_then(|n| n.parsed_argument(&param.name))
                .cloned()
            else {
                if param.optional {
                    continue;
                }
                return Err(ProcessGraphError::ProcessArgumentRequired {
                    process: self.spec.id.clone(),
                    argument: param.name.clone(),
                });
            };
            self.validate_argument(
                graph,
                node_id,
                argument,
                param.schema.clone(),
                param.name.clone(),
            )
            .await?;
        }
        Ok(())
    }

    /// Validates one argument value against a schema, dispatching on its
    /// reference kind. `path` names the argument in error messages and
    /// grows dotted segments while descending into containers.
    fn validate_argument<'a>(
        &'a self,
        graph: &'a mut ProcessGraph,
        node_id: &'a str,
        argument: Argument,
        schema: Value,
        path: String,
    ) -> BoxFuture<'a, Result<(), ProcessGraphError>> {
        Box::pin(async move {
            let invalid = |reason: String| ProcessGraphError::ProcessArgumentInvalid {
                process: self.spec.id.clone(),
                argument: path.clone(),
                reason,
            };

            match argument {
                Argument::Parameter { from_parameter } => {
                    if let Some(cb_param) = graph.callback_parameter(&from_parameter).cloned() {
                        // Only a schema is available for callback
                        // parameters; a static compatibility check is the
                        // strongest statement possible.
                        if is_schema_compatible(&schema, &cb_param.schema, false, false) {
                            Ok(())
                        } else {
                            Err(invalid(format!(
                                "Schema for parameter '{from_parameter}' not compatible"
                            )))
                        }
                    } else {
                        let resolved = graph.resolve_parameter(node_id, &from_parameter)?;
                        if let Some(value) = resolved
                            && let Some(declared) =
                                graph.process_parameter(&from_parameter).cloned()
                        {
                            let errors = graph
                                .validator()
                                .validate_value(&value, &declared.schema)
                                .await;
                            if !errors.is_empty() {
                                return Err(invalid(errors.join("; ")));
                            }
                            if !is_schema_compatible(&schema, &declared.schema, false, false) {
                                return Err(invalid(format!(
                                    "Schema for parameter '{from_parameter}' not compatible"
                                )));
                            }
                        }
                        Ok(())
                    }
                }
                Argument::Result { from_node } => {
                    match graph.process_for_node(&from_node)? {
                        Some(producer) => {
                            if is_schema_compatible(
                                &schema,
                                &producer.returns_schema(),
                                false,
                                false,
                            ) {
                                Ok(())
                            } else {
                                Err(invalid(format!(
                                    "Schema for result '{from_node}' not compatible"
                                )))
                            }
                        }
                        // Without a registry there is nothing to compare against.
                        None => Ok(()),
                    }
                }
                Argument::Callback(handle) => {
                    let accepts_callback = normalize_schema(&schema).iter().any(|alt| {
                        matches!(crate::schema::type_of(alt), None | Some("object"))
                    });
                    if !accepts_callback {
                        return Err(invalid("A process graph is not allowed here".to_string()));
                    }
                    graph
                        .validate_child(handle)
                        .await
                        .map_err(|error| invalid(error.to_string()))
                }
                argument @ (Argument::Array(_) | Argument::Object(_))
                    if argument.contains_ref() =>
                {
                    // Element-wise best effort: an element passes when at
                    // least one alternative element schema accepts it; the
                    // last error is surfaced only when none does.
                    let alternatives = normalize_schema(&schema);
                    let elements: Vec<(String, Argument)> = match argument {
                        Argument::Array(items) => items
                            .into_iter()
                            .enumerate()
                            .map(|(i, v)| (i.to_string(), v))
                            .collect(),
                        Argument::Object(fields) => fields,
                        _ => unreachable!(),
                    };
                    for (key, element) in elements {
                        let element_schemas: Vec<Value> = alternatives
                            .iter()
                            .map(|alt| element_schema(alt, &key))
                            .filter(|s| !is_empty_schema(s))
                            .collect();
                        if element_schemas.is_empty() {
                            continue;
                        }
                        let mut last_error = None;
                        let mut accepted = false;
                        for element_schema in element_schemas {
                            match self
                                .validate_argument(
                                    graph,
                                    node_id,
                                    element.clone(),
                                    element_schema,
                                    format!("{path}.{key}"),
                                )
                                .await
                            {
                                Ok(()) => {
                                    accepted = true;
                                    break;
                                }
                                Err(error) => last_error = Some(error),
                            }
                        }
                        if !accepted && let Some(error) = last_error {
                            return Err(error);
                        }
                    }
                    Ok(())
                }
                argument => {
                    let value = argument.to_literal().unwrap_or(Value::Null);
                    let errors = graph.validator().validate_value(&value, &schema).await;
                    if errors.is_empty() {
                        Ok(())
                    } else {
                        Err(invalid(errors.join("; ")))
                    }
                }
            }
        })
    }

    /// Runs the registered implementation.
    ///
    /// Fails with an internal error when no runner was registered; that is
    /// a wiring mistake in the host, not a graph problem.
    pub async fn execute(
        &self,
        invocation: ProcessInvocation,
    ) -> Result<Value, ProcessGraphError> {
        match &self.runner {
            Some(runner) => runner.run(invocation).await,
            None => Err(ProcessGraphError::internal(format!(
                "execute is not implemented for process '{}'",
                self.spec.id
            ))),
        }
    }
}
