//! Error types and error collection for process graph handling.
//!
//! Every failure the engine can produce is a variant of [`ProcessGraphError`],
//! identified by a stable code (see [`ProcessGraphError::code`]) so that
//! clients can match on failures without parsing messages. Validation runs
//! collect their findings into an [`ErrorList`]; parsing and execution are
//! fail-fast and surface a single error.
//!
//! Structural errors raised while parsing a callback (a graph embedded as a
//! node argument) use the dedicated `…Callback` variants so users can tell
//! a nested failure apart from a top-level one.

use miette::Diagnostic;
use serde_json::{Value, json};
use thiserror::Error;

/// All errors raised by graph parsing, validation and execution.
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
#[non_exhaustive]
pub enum ProcessGraphError {
    /// The supplied specification is not an object.
    #[error("No process specified")]
    #[diagnostic(code(procgraph::process_missing))]
    ProcessMissing,

    /// The specification carries no (or an empty) `process_graph` mapping.
    #[error("No process graph specified")]
    #[diagnostic(
        code(procgraph::process_graph_missing),
        help("Add a non-empty `process_graph` object, or enable `allow_empty`.")
    )]
    ProcessGraphMissing,

    /// No node without predecessors exists, so traversal cannot begin.
    /// A graph in which every node depends on another one (a cycle) also
    /// surfaces as this error.
    #[error("No start nodes found for process graph.")]
    #[diagnostic(code(procgraph::start_node_missing))]
    StartNodeMissing,

    /// No node is flagged with `result: true`.
    #[error("No result node found for process graph.")]
    #[diagnostic(code(procgraph::result_node_missing))]
    ResultNodeMissing,

    /// More than one node is flagged with `result: true`.
    #[error("Multiple result nodes specified for process graph.")]
    #[diagnostic(code(procgraph::multiple_result_nodes))]
    MultipleResultNodes,

    /// [`ProcessGraphError::ProcessMissing`] inside a callback.
    #[error("No process specified for the callback in the process '{process_id}' (node: '{node_id}').")]
    #[diagnostic(code(procgraph::process_missing_callback))]
    ProcessMissingCallback { process_id: String, node_id: String },

    /// [`ProcessGraphError::ProcessGraphMissing`] inside a callback.
    #[error("No process graph specified for the callback in the process '{process_id}' (node: '{node_id}').")]
    #[diagnostic(code(procgraph::process_graph_missing_callback))]
    ProcessGraphMissingCallback { process_id: String, node_id: String },

    /// [`ProcessGraphError::StartNodeMissing`] inside a callback.
    #[error("No start nodes found for the callback in the process '{process_id}' (node: '{node_id}').")]
    #[diagnostic(code(procgraph::start_node_missing_callback))]
    StartNodeMissingCallback { process_id: String, node_id: String },

    /// [`ProcessGraphError::ResultNodeMissing`] inside a callback.
    #[error("No result node found for the callback in the process '{process_id}' (node: '{node_id}').")]
    #[diagnostic(code(procgraph::result_node_missing_callback))]
    ResultNodeMissingCallback { process_id: String, node_id: String },

    /// [`ProcessGraphError::MultipleResultNodes`] inside a callback.
    #[error("Multiple result nodes specified for the callback in the process '{process_id}' (node: '{node_id}').")]
    #[diagnostic(code(procgraph::multiple_result_nodes_callback))]
    MultipleResultNodesCallback { process_id: String, node_id: String },

    /// A `from_node` reference points at a node id that is not part of the
    /// same graph. References never cross callback boundaries.
    #[error("Referenced node '{node_id}' doesn't exist.")]
    #[diagnostic(code(procgraph::referenced_node_missing))]
    ReferencedNodeMissing { node_id: String },

    /// A node id is not a non-empty string.
    #[error("Invalid node id specified in process graph.")]
    #[diagnostic(code(procgraph::node_id_invalid))]
    NodeIdInvalid,

    /// A node specification is not an object.
    #[error("Process graph node '{node_id}' is not a valid object.")]
    #[diagnostic(code(procgraph::node_invalid))]
    NodeInvalid { node_id: String },

    /// A node specification has no `process_id` string.
    #[error("Process graph node '{node_id}' doesn't contain a process id.")]
    #[diagnostic(code(procgraph::process_id_missing))]
    ProcessIdMissing { node_id: String },

    /// A `from_parameter` reference could not be resolved anywhere in the
    /// parameter scope chain and undefined references are not tolerated.
    #[error("Invalid parameter '{argument}' requested in the process '{process_id}' (node: '{node_id}').")]
    #[diagnostic(code(procgraph::process_graph_parameter_missing))]
    ProcessGraphParameterMissing {
        argument: String,
        node_id: String,
        process_id: String,
        namespace: String,
    },

    /// The process registry has no entry for the requested process id.
    #[error("Process '{process}' is not supported.")]
    #[diagnostic(code(procgraph::process_unsupported))]
    ProcessUnsupported { process: String, namespace: String },

    /// A node passes arguments its process does not declare.
    #[error("Process '{process}' does not support the following arguments: {}", .arguments.join(", "))]
    #[diagnostic(code(procgraph::process_argument_unsupported))]
    ProcessArgumentUnsupported {
        process: String,
        arguments: Vec<String>,
    },

    /// A required process parameter has no argument on the node.
    #[error("Process '{process}' requires argument '{argument}'.")]
    #[diagnostic(code(procgraph::process_argument_required))]
    ProcessArgumentRequired { process: String, argument: String },

    /// An argument value was rejected, either by schema compatibility
    /// checks or by the structural value validator. `reason` may carry a
    /// list of nested validator messages joined into one string.
    #[error("The argument '{argument}' in process '{process}' is invalid: {reason}")]
    #[diagnostic(code(procgraph::process_argument_invalid))]
    ProcessArgumentInvalid {
        process: String,
        argument: String,
        reason: String,
    },

    /// A failure that has no dedicated code, e.g. invoking `execute` on a
    /// process without an executable implementation. These are programming
    /// or configuration errors, not conditions to recover from.
    #[error("{message}")]
    #[diagnostic(code(procgraph::internal))]
    Internal { message: String },
}

impl ProcessGraphError {
    /// Shorthand for an [`ProcessGraphError::Internal`] error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable error code, matching the wire-level taxonomy.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProcessMissing => "ProcessMissing",
            Self::ProcessGraphMissing => "ProcessGraphMissing",
            Self::StartNodeMissing => "StartNodeMissing",
            Self::ResultNodeMissing => "ResultNodeMissing",
            Self::MultipleResultNodes => "MultipleResultNodes",
            Self::ProcessMissingCallback { .. } => "ProcessMissingCallback",
            Self::ProcessGraphMissingCallback { .. } => "ProcessGraphMissingCallback",
            Self::StartNodeMissingCallback { .. } => "StartNodeMissingCallback",
            Self::ResultNodeMissingCallback { .. } => "ResultNodeMissingCallback",
            Self::MultipleResultNodesCallback { .. } => "MultipleResultNodesCallback",
            Self::ReferencedNodeMissing { .. } => "ReferencedNodeMissing",
            Self::NodeIdInvalid => "NodeIdInvalid",
            Self::NodeInvalid { .. } => "NodeInvalid",
            Self::ProcessIdMissing { .. } => "ProcessIdMissing",
            Self::ProcessGraphParameterMissing { .. } => "ProcessGraphParameterMissing",
            Self::ProcessUnsupported { .. } => "ProcessUnsupported",
            Self::ProcessArgumentUnsupported { .. } => "ProcessArgumentUnsupported",
            Self::ProcessArgumentRequired { .. } => "ProcessArgumentRequired",
            Self::ProcessArgumentInvalid { .. } => "ProcessArgumentInvalid",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// Serializable `{code, message}` projection.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "code": self.code(),
            "message": self.to_string(),
        })
    }
}

/// An ordered collection of [`ProcessGraphError`]s gathered during a
/// best-effort validation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorList {
    errors: Vec<ProcessGraphError>,
}

impl ErrorList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a single error.
    pub fn add(&mut self, error: ProcessGraphError) {
        self.errors.push(error);
    }

    /// Appends all errors of another list, preserving order.
    pub fn merge(&mut self, other: ErrorList) {
        self.errors.extend(other.errors);
    }

    #[must_use]
    pub fn first(&self) -> Option<&ProcessGraphError> {
        self.errors.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&ProcessGraphError> {
        self.errors.last()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn all(&self) -> &[ProcessGraphError] {
        &self.errors
    }

    /// Serializes every contained error as `{code, message}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Array(self.errors.iter().map(ProcessGraphError::to_json).collect())
    }

    /// Renders a numbered, human-readable summary, one error per line.
    #[must_use]
    pub fn message(&self) -> String {
        self.errors
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{}. {}", i + 1, e))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Display for ErrorList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl IntoIterator for ErrorList {
    type Item = ProcessGraphError;
    type IntoIter = std::vec::IntoIter<ProcessGraphError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl From<ProcessGraphError> for ErrorList {
    fn from(error: ProcessGraphError) -> Self {
        let mut list = Self::new();
        list.add(error);
        list
    }
}
