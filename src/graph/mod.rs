//! Process graph parsing, validation and execution.
//!
//! A [`ProcessGraph`] owns the nodes parsed from a wire-format description,
//! the callback graphs embedded in node arguments, and the error state of
//! the last validation run. The life cycle is `parse` (structure and
//! edges), `validate` (contracts and schemas) and `execute` (concurrent
//! traversal caching one result per node); each later stage runs the
//! earlier ones on demand, and `parse`/`validate` are idempotent.
//!
//! Callback graphs are children of the graph that declared them. They see
//! the parameters of every enclosing scope through flattened scope frames
//! and report errors attributed to the node and process that own them.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use procgraph::graph::ProcessGraph;
//! use procgraph::registry::ProcessRegistry;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), procgraph::errors::ProcessGraphError> {
//! let registry = Arc::new(ProcessRegistry::new());
//! let mut graph = ProcessGraph::new(json!({
//!     "process_graph": {
//!         "abs1": {
//!             "process_id": "absolute",
//!             "arguments": {"x": -1},
//!             "result": true
//!         }
//!     }
//! }), Some(registry));
//! graph.parse()?;
//! assert_eq!(graph.start_node_ids(), vec!["abs1"]);
//! graph.validate().await?;
//! let _result = graph.execute(None).await?;
//! # Ok(())
//! # }
//! ```

mod parameters;
mod parsing;
mod traversal;

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;

pub use parameters::ScopeFrame;

use crate::errors::{ErrorList, ProcessGraphError};
use crate::node::{CallbackHandle, ProcessNode};
use crate::process::{ParameterSpec, ProcessContract};
use crate::registry::ProcessRegistry;
use crate::schema::{JsonSchemaValidator, SchemaValidator};

/// Identity of the node owning a callback graph, used for error
/// attribution and callback parameter resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentLink {
    pub node_id: String,
    pub process_id: String,
    pub namespace: Option<String>,
}

/// A parsed, validatable and executable process graph.
#[derive(Clone)]
pub struct ProcessGraph {
    /// The raw wire-format specification. Never mutated; `to_json` starts
    /// from this value.
    pub(crate) process: Value,
    pub(crate) nodes: FxHashMap<String, ProcessNode>,
    /// Start node ids, sorted for deterministic traversal order.
    pub(crate) start_nodes: Vec<String>,
    pub(crate) result_node: Option<String>,
    /// Callback graphs created during parsing, addressed by
    /// [`CallbackHandle`]s stored in node arguments.
    pub(crate) children: Vec<ProcessGraph>,
    pub(crate) parent: Option<ParentLink>,
    pub(crate) parsed: bool,
    pub(crate) validated: bool,
    pub(crate) errors: ErrorList,
    /// Parameters declared by the process specification itself.
    pub(crate) declared_parameters: Vec<ParameterSpec>,
    /// True once auto-declaration added parameters beyond the
    /// specification; `to_json` then patches the parameter list in.
    pub(crate) filled_parameters: bool,
    /// Parameters declared by the parent process for this callback slot.
    pub(crate) callback_parameters: Vec<ParameterSpec>,
    pub(crate) registry: Option<Arc<ProcessRegistry>>,
    pub(crate) validator: Arc<dyn SchemaValidator>,
    /// Externally supplied execution arguments.
    pub(crate) arguments: FxHashMap<String, Value>,
    /// Flattened ancestor scopes, innermost parent first.
    pub(crate) inherited: Vec<ScopeFrame>,
    pub(crate) allow_empty_graph: bool,
    pub(crate) fill_parameters: bool,
    pub(crate) allow_undefined_parameter_refs: bool,
}

impl ProcessGraph {
    /// Creates a graph over a raw specification. A default
    /// [`JsonSchemaValidator`] wired to the registry is used for value
    /// validation.
    #[must_use]
    pub fn new(process: Value, registry: Option<Arc<ProcessRegistry>>) -> Self {
        let validator: Arc<dyn SchemaValidator> = match &registry {
            Some(registry) => Arc::new(JsonSchemaValidator::with_registry(registry.clone())),
            None => Arc::new(JsonSchemaValidator::new()),
        };
        Self::with_validator(process, registry, validator)
    }

    /// Creates a graph with a custom value validator.
    #[must_use]
    pub fn with_validator(
        process: Value,
        registry: Option<Arc<ProcessRegistry>>,
        validator: Arc<dyn SchemaValidator>,
    ) -> Self {
        let declared_parameters = parameters::declared_parameters(&process);
        Self {
            process,
            nodes: FxHashMap::default(),
            start_nodes: Vec::new(),
            result_node: None,
            children: Vec::new(),
            parent: None,
            parsed: false,
            validated: false,
            errors: ErrorList::new(),
            declared_parameters,
            filled_parameters: false,
            callback_parameters: Vec::new(),
            registry,
            validator,
            arguments: FxHashMap::default(),
            inherited: Vec::new(),
            allow_empty_graph: false,
            fill_parameters: false,
            allow_undefined_parameter_refs: true,
        }
    }

    /// Permits specifications without any nodes.
    pub fn allow_empty(&mut self, allow: bool) {
        self.allow_empty_graph = allow;
    }

    /// Controls whether unresolved `from_parameter` references are
    /// tolerated during validation. Disabling this also disables
    /// auto-declaration. Execution always runs with this disabled.
    pub fn allow_undefined_parameters(&mut self, allow: bool) {
        if !allow {
            self.fill_parameters = false;
        }
        self.allow_undefined_parameter_refs = allow;
    }

    /// Controls whether referenced but undeclared parameters are
    /// auto-declared with an empty schema during parsing. Enabling this
    /// implies tolerating undefined references.
    pub fn fill_undefined_parameters(&mut self, fill: bool) {
        if fill {
            self.allow_undefined_parameter_refs = true;
        }
        self.fill_parameters = fill;
    }

    /// The node with the given id, if parsed.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&ProcessNode> {
        self.nodes.get(id)
    }

    /// All nodes, sorted by id.
    #[must_use]
    pub fn nodes(&self) -> Vec<&ProcessNode> {
        let mut nodes: Vec<&ProcessNode> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.id().cmp(b.id()));
        nodes
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Ids of nodes without predecessors, sorted.
    #[must_use]
    pub fn start_node_ids(&self) -> Vec<String> {
        self.start_nodes.clone()
    }

    /// The unique node flagged `result: true`, once parsed.
    #[must_use]
    pub fn result_node(&self) -> Option<&ProcessNode> {
        self.result_node.as_ref().and_then(|id| self.nodes.get(id))
    }

    /// Callback graphs created for this graph's node arguments.
    #[must_use]
    pub fn children(&self) -> &[ProcessGraph] {
        &self.children
    }

    #[must_use]
    pub fn child(&self, handle: CallbackHandle) -> Option<&ProcessGraph> {
        self.children.get(handle)
    }

    /// Identity of the owning node when this graph is a callback.
    #[must_use]
    pub fn parent(&self) -> Option<&ParentLink> {
        self.parent.as_ref()
    }

    /// Errors collected by the last validation run.
    #[must_use]
    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }

    /// True once validation has run without collecting any error.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validated && self.errors.is_empty()
    }

    /// The value validator used for literal arguments.
    #[must_use]
    pub fn validator(&self) -> Arc<dyn SchemaValidator> {
        self.validator.clone()
    }

    /// The process registry, if any.
    #[must_use]
    pub fn registry(&self) -> Option<&Arc<ProcessRegistry>> {
        self.registry.as_ref()
    }

    /// Resolves a process id against the registry.
    ///
    /// Returns `Ok(None)` when no registry is configured; an unknown id is
    /// always an error, never a silent no-op.
    pub fn process(
        &self,
        process_id: &str,
        namespace: Option<&str>,
    ) -> Result<Option<Arc<ProcessContract>>, ProcessGraphError> {
        let Some(registry) = &self.registry else {
            return Ok(None);
        };
        registry.get(process_id, namespace).map(Some).ok_or_else(|| {
            ProcessGraphError::ProcessUnsupported {
                process: process_id.to_string(),
                namespace: namespace.unwrap_or("n/a").to_string(),
            }
        })
    }

    /// Resolves the process of a parsed node.
    pub fn process_for_node(
        &self,
        node_id: &str,
    ) -> Result<Option<Arc<ProcessContract>>, ProcessGraphError> {
        let Some(node) = self.nodes.get(node_id) else {
            return Err(ProcessGraphError::internal(format!(
                "Unknown node '{node_id}'"
            )));
        };
        self.process(node.process_id(), node.namespace())
    }

    /// Merges externally supplied execution arguments into the graph scope.
    pub fn set_arguments(&mut self, arguments: FxHashMap<String, Value>) {
        self.arguments.extend(arguments);
    }

    #[must_use]
    pub fn has_argument(&self, name: &str) -> bool {
        self.arguments.contains_key(name)
    }

    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }

    /// Clears per-run node state (computed results and join bookkeeping)
    /// across this graph and all callback graphs, making another execution
    /// pass safe. Mandatory between runs; the dependency join counts each
    /// predecessor once per pass.
    pub fn reset(&mut self) {
        for node in self.nodes.values_mut() {
            node.reset();
        }
        for child in &mut self.children {
            child.reset();
        }
    }

    /// Serializes the graph back to its wire shape.
    ///
    /// Reference-shaped arguments and embedded callbacks reappear exactly
    /// as supplied. Auto-declared parameters are patched into the
    /// parameter list when filling was enabled.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut out = self.process.clone();
        if self.filled_parameters
            && let Some(map) = out.as_object_mut()
            && let Ok(parameters) = serde_json::to_value(&self.declared_parameters)
        {
            map.insert("parameters".to_string(), parameters);
        }
        out
    }
}

impl std::fmt::Debug for ProcessGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessGraph")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("start_nodes", &self.start_nodes)
            .field("result_node", &self.result_node)
            .field("children", &self.children.len())
            .field("parent", &self.parent)
            .field("parsed", &self.parsed)
            .field("validated", &self.validated)
            .field("errors", &self.errors.count())
            .finish_non_exhaustive()
    }
}
