//! Process graph nodes.
//!
//! A [`ProcessNode`] is one process invocation site inside a graph. It keeps
//! two views of its arguments: the raw JSON exactly as supplied (used for
//! serialization round-trips) and a parsed [`Argument`] tree in which
//! reference shapes are first-class variants and embedded callbacks have
//! been replaced by handles into the owning graph's child list. The raw
//! view is never mutated, so `to_json` reproduces the input byte for byte.
//!
//! Nodes also carry the traversal bookkeeping the drivers rely on: the
//! predecessor/successor edge sets discovered during parsing, the set of
//! predecessors that have reported completion in the current pass, and the
//! one-shot computed result.

use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use crate::errors::ProcessGraphError;
use crate::refs::{self, ValueKind};

/// Handle to a callback graph owned by the node's graph.
///
/// The index points into the owning graph's child list; nodes do not own
/// their callback graphs so that a graph remains a single ownership tree.
pub type CallbackHandle = usize;

/// A node argument after parsing.
///
/// Containers are decomposed so that references can occur at any depth;
/// a container whose recursive expansion is reference-free collapses back
/// into a plain [`Value`] on demand (see [`Argument::to_literal`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// A scalar literal, including `null`.
    Value(Value),
    Array(Vec<Argument>),
    Object(Vec<(String, Argument)>),
    /// Reference to the result of another node in the same graph.
    Result { from_node: String },
    /// Reference into the parameter scope chain.
    Parameter { from_parameter: String },
    /// An embedded callback graph, stored on the owning graph.
    Callback(CallbackHandle),
}

impl Argument {
    /// True if a reference occurs anywhere in this argument. Callbacks are
    /// counted as containing references, matching the conservative behavior
    /// of the raw-value check in [`refs::contains_ref`].
    #[must_use]
    pub fn contains_ref(&self) -> bool {
        match self {
            Argument::Value(_) => false,
            Argument::Result { .. } | Argument::Parameter { .. } | Argument::Callback(_) => true,
            Argument::Array(items) => items.iter().any(Argument::contains_ref),
            Argument::Object(fields) => fields.iter().any(|(_, v)| v.contains_ref()),
        }
    }

    /// Collapses a reference-free argument back into plain JSON.
    /// Returns `None` as soon as any reference or callback is involved.
    #[must_use]
    pub fn to_literal(&self) -> Option<Value> {
        match self {
            Argument::Value(v) => Some(v.clone()),
            Argument::Array(items) => items
                .iter()
                .map(Argument::to_literal)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Argument::Object(fields) => fields
                .iter()
                .map(|(k, v)| v.to_literal().map(|v| (k.clone(), v)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(Value::Object),
            _ => None,
        }
    }
}

/// One process invocation inside a [`ProcessGraph`](crate::graph::ProcessGraph).
#[derive(Debug, Clone)]
pub struct ProcessNode {
    id: String,
    process_id: String,
    namespace: Option<String>,
    description: Option<String>,
    result_node: bool,
    /// Raw node specification as supplied, deep-copied. Never mutated.
    source: Value,
    /// Parsed argument view, populated by the graph during parsing.
    arguments: FxHashMap<String, Argument>,
    /// Ids of nodes whose results this node consumes.
    expects_from: BTreeSet<String>,
    /// Ids of nodes consuming this node's result.
    passes_to: BTreeSet<String>,
    /// Predecessors that have reported completion in the current pass.
    received_from: FxHashSet<String>,
    computed_result: Option<Value>,
}

impl ProcessNode {
    /// Builds a node from its raw specification.
    ///
    /// Fails with [`ProcessGraphError::NodeIdInvalid`] for an empty id, with
    /// [`ProcessGraphError::NodeInvalid`] if the specification is not an
    /// object and with [`ProcessGraphError::ProcessIdMissing`] if it carries
    /// no `process_id` string.
    pub fn new(raw: &Value, id: &str) -> Result<Self, ProcessGraphError> {
        if id.is_empty() {
            return Err(ProcessGraphError::NodeIdInvalid);
        }
        let Some(map) = raw.as_object() else {
            return Err(ProcessGraphError::NodeInvalid {
                node_id: id.to_string(),
            });
        };
        let Some(process_id) = map.get("process_id").and_then(Value::as_str) else {
            return Err(ProcessGraphError::ProcessIdMissing {
                node_id: id.to_string(),
            });
        };

        Ok(Self {
            id: id.to_string(),
            process_id: process_id.to_string(),
            namespace: map
                .get("namespace")
                .and_then(Value::as_str)
                .map(str::to_string),
            description: map
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            result_node: map.get("result").and_then(Value::as_bool).unwrap_or(false),
            source: raw.clone(),
            arguments: FxHashMap::default(),
            expects_from: BTreeSet::new(),
            passes_to: BTreeSet::new(),
            received_from: FxHashSet::default(),
            computed_result: None,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// True if this node is flagged as the graph's result node.
    #[must_use]
    pub fn is_result_node(&self) -> bool {
        self.result_node
    }

    /// True if this node has no predecessors.
    #[must_use]
    pub fn is_start_node(&self) -> bool {
        self.expects_from.is_empty()
    }

    /// Declared argument names, sorted for reproducible output.
    #[must_use]
    pub fn argument_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.arguments.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn has_argument(&self, name: &str) -> bool {
        self.arguments.contains_key(name)
    }

    /// The raw JSON of an argument, exactly as supplied.
    #[must_use]
    pub fn raw_argument(&self, name: &str) -> Option<&Value> {
        self.source.get("arguments").and_then(|args| args.get(name))
    }

    /// The parsed view of an argument.
    #[must_use]
    pub fn parsed_argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.get(name)
    }

    /// The raw argument mapping, exactly as supplied.
    pub(crate) fn raw_arguments(&self) -> Option<&serde_json::Map<String, Value>> {
        self.source.get("arguments").and_then(Value::as_object)
    }

    /// The classifier kind of an argument's raw value.
    #[must_use]
    pub fn argument_type(&self, name: &str) -> Option<ValueKind> {
        self.raw_argument(name).map(refs::classify)
    }

    /// Distinct references occurring in an argument's raw value.
    #[must_use]
    pub fn argument_refs(&self, name: &str) -> Vec<Value> {
        self.raw_argument(name)
            .map(|v| refs::collect_refs(v, false))
            .unwrap_or_default()
    }

    /// Distinct references occurring anywhere in this node's arguments.
    #[must_use]
    pub fn refs(&self) -> Vec<Value> {
        self.source
            .get("arguments")
            .map(|v| refs::collect_refs(v, false))
            .unwrap_or_default()
    }

    /// Predecessor ids in lexicographic order.
    #[must_use]
    pub fn predecessor_ids(&self) -> Vec<String> {
        self.expects_from.iter().cloned().collect()
    }

    /// Successor ids in lexicographic order.
    #[must_use]
    pub fn successor_ids(&self) -> Vec<String> {
        self.passes_to.iter().cloned().collect()
    }

    /// The result cached by the last execution pass, if any.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.computed_result.as_ref()
    }

    /// Serializes the node back to its wire shape. Reference-shaped
    /// arguments are preserved, not resolved.
    #[must_use]
    pub fn to_json(&self) -> Value {
        self.source.clone()
    }

    pub(crate) fn set_arguments(&mut self, arguments: FxHashMap<String, Argument>) {
        self.arguments = arguments;
    }

    pub(crate) fn parsed_arguments(&self) -> &FxHashMap<String, Argument> {
        &self.arguments
    }

    /// Records an edge from `id` into this node. Idempotent; the graph
    /// mirrors every call with [`ProcessNode::add_successor`] on the other
    /// side so the edge sets stay symmetric.
    pub(crate) fn add_predecessor(&mut self, id: &str) {
        self.expects_from.insert(id.to_string());
    }

    /// Records an edge from this node into `id`. Idempotent, mirrored by
    /// [`ProcessNode::add_predecessor`].
    pub(crate) fn add_successor(&mut self, id: &str) {
        self.passes_to.insert(id.to_string());
    }

    pub(crate) fn set_result(&mut self, result: Value) {
        self.computed_result = Some(result);
    }

    /// Records that a predecessor has completed and reports whether all
    /// predecessors have now reported.
    ///
    /// Passing `None` is the bootstrap call used for start nodes: it leaves
    /// the received set untouched and the check is vacuously true when the
    /// node has no predecessors. Each predecessor must report exactly once
    /// per pass; [`ProcessNode::reset`] clears the bookkeeping between runs.
    pub(crate) fn solve_dependency(&mut self, from: Option<&str>) -> bool {
        if let Some(from) = from
            && self.expects_from.contains(from)
        {
            self.received_from.insert(from.to_string());
        }
        self.expects_from.len() == self.received_from.len()
    }

    /// Clears the per-run state (received set and computed result) so the
    /// node can participate in another traversal.
    pub(crate) fn reset(&mut self) {
        self.computed_result = None;
        self.received_from.clear();
    }
}
