//! Structural parsing: node construction, edge discovery and callback
//! instantiation.

use serde_json::{Map, Value, json};
use tracing::debug;

use super::{ParentLink, ProcessGraph};
use crate::errors::ProcessGraphError;
use crate::node::{Argument, ProcessNode};
use crate::process::callback_parameters_for;
use crate::refs::{ValueKind, classify};

/// Keys a process specification may carry besides `process_graph`. An
/// otherwise empty specification that only uses these keys is accepted as
/// an intentionally empty graph when `allow_empty` is set.
const PROCESS_KEYS: &[&str] = &[
    "id",
    "summary",
    "description",
    "categories",
    "parameters",
    "returns",
    "deprecated",
    "experimental",
    "exceptions",
    "examples",
    "links",
    "process_graph",
];

/// Structural failure kinds that get a `…Callback` variant when raised
/// inside a callback graph.
enum Structural {
    ProcessMissing,
    ProcessGraphMissing,
    StartNodeMissing,
    ResultNodeMissing,
    MultipleResultNodes,
}

impl ProcessGraph {
    /// Parses the raw specification into nodes, edges and callback graphs.
    ///
    /// Idempotent: a second call on a successfully parsed graph is a
    /// no-op. Structural failures are fatal and leave no partially parsed
    /// state behind.
    #[tracing::instrument(level = "debug", skip(self), fields(callback = self.parent.is_some()))]
    pub fn parse(&mut self) -> Result<(), ProcessGraphError> {
        if self.parsed {
            return Ok(());
        }
        self.nodes.clear();
        self.start_nodes.clear();
        self.result_node = None;
        self.children.clear();

        let Some(spec) = self.process.as_object().cloned() else {
            return Err(self.structural_error(&Structural::ProcessMissing));
        };

        let graph_spec = spec.get("process_graph").and_then(Value::as_object);
        if graph_spec.is_none_or(Map::is_empty) {
            if self.allow_empty_graph {
                let has_process_key = spec.keys().any(|k| PROCESS_KEYS.contains(&k.as_str()));
                if spec.is_empty() || has_process_key {
                    self.parsed = true;
                    return Ok(());
                }
            }
            return Err(self.structural_error(&Structural::ProcessGraphMissing));
        }
        let graph_spec = graph_spec.unwrap();

        for (id, raw) in graph_spec {
            let node = ProcessNode::new(raw, id)?;
            self.nodes.insert(id.clone(), node);
        }

        let mut ids: Vec<String> = self.nodes.keys().cloned().collect();
        ids.sort_unstable();
        for id in &ids {
            if self.nodes[id].is_result_node() {
                if self.result_node.is_some() {
                    return Err(self.structural_error(&Structural::MultipleResultNodes));
                }
                self.result_node = Some(id.clone());
            }
            self.parse_node_arguments(id)?;
        }
        if self.result_node.is_none() {
            return Err(self.structural_error(&Structural::ResultNodeMissing));
        }

        // Start nodes are only known once every node's arguments have been
        // walked; sorting keeps traversal order reproducible.
        let mut start_nodes: Vec<String> = self
            .nodes
            .values()
            .filter(|n| n.is_start_node())
            .map(|n| n.id().to_string())
            .collect();
        start_nodes.sort_unstable();
        if start_nodes.is_empty() {
            return Err(self.structural_error(&Structural::StartNodeMissing));
        }
        self.start_nodes = start_nodes;

        debug!(
            nodes = self.nodes.len(),
            children = self.children.len(),
            start_nodes = ?self.start_nodes,
            "process graph parsed"
        );
        self.parsed = true;
        Ok(())
    }

    /// Walks one node's raw arguments: wires edges for node references,
    /// instantiates callback graphs, auto-declares parameters when
    /// filling is enabled, and stores the parsed argument view.
    fn parse_node_arguments(&mut self, node_id: &str) -> Result<(), ProcessGraphError> {
        let raw = self
            .nodes
            .get(node_id)
            .and_then(|n| n.raw_arguments().cloned())
            .unwrap_or_default();

        let mut edges: Vec<(String, String)> = Vec::new();
        let mut parsed = rustc_hash::FxHashMap::default();
        for (name, value) in &raw {
            let path = vec![name.clone()];
            let argument = self.build_argument(node_id, value, &path, &mut edges)?;
            parsed.insert(name.clone(), argument);
        }

        if let Some(node) = self.nodes.get_mut(node_id) {
            node.set_arguments(parsed);
        }
        for (from, to) in edges {
            self.connect(&from, &to);
        }
        Ok(())
    }

    fn build_argument(
        &mut self,
        node_id: &str,
        value: &Value,
        path: &[String],
        edges: &mut Vec<(String, String)>,
    ) -> Result<Argument, ProcessGraphError> {
        match classify(value) {
            ValueKind::Result => {
                let from_node = value
                    .get("from_node")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if !self.nodes.contains_key(&from_node) {
                    return Err(ProcessGraphError::ReferencedNodeMissing { node_id: from_node });
                }
                edges.push((from_node.clone(), node_id.to_string()));
                Ok(Argument::Result { from_node })
            }
            ValueKind::Parameter => {
                let from_parameter = value
                    .get("from_parameter")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if self.fill_parameters && !self.has_parameter(&from_parameter) {
                    self.add_process_parameter(&from_parameter, "", json!({}));
                }
                Ok(Argument::Parameter { from_parameter })
            }
            ValueKind::Callback => {
                let handle = self.create_child(value.clone(), node_id, path)?;
                Ok(Argument::Callback(handle))
            }
            ValueKind::Array => {
                let Some(items) = value.as_array() else {
                    return Ok(Argument::Value(value.clone()));
                };
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let mut element_path = path.to_vec();
                    element_path.push(index.to_string());
                    out.push(self.build_argument(node_id, item, &element_path, edges)?);
                }
                Ok(Argument::Array(out))
            }
            ValueKind::Object => {
                let Some(fields) = value.as_object() else {
                    return Ok(Argument::Value(value.clone()));
                };
                let mut out = Vec::with_capacity(fields.len());
                for (key, item) in fields {
                    let mut element_path = path.to_vec();
                    element_path.push(key.clone());
                    out.push((key.clone(), self.build_argument(node_id, item, &element_path, edges)?));
                }
                Ok(Argument::Object(out))
            }
            _ => Ok(Argument::Value(value.clone())),
        }
    }

    /// Creates and parses a callback graph for an embedded specification.
    ///
    /// The child copies the configuration flags and validator, records the
    /// owning node for error attribution, derives its callback parameters
    /// from the parent process's parameter slot and receives the current
    /// scope chain. Parsing is eager so structural errors surface with the
    /// parent still known.
    fn create_child(
        &mut self,
        spec: Value,
        owner_id: &str,
        path: &[String],
    ) -> Result<usize, ProcessGraphError> {
        let owner = &self.nodes[owner_id];
        let parent = ParentLink {
            node_id: owner_id.to_string(),
            process_id: owner.process_id().to_string(),
            namespace: owner.namespace().map(str::to_string),
        };

        let mut child = ProcessGraph::with_validator(spec, self.registry.clone(), self.validator.clone());
        child.allow_empty_graph = self.allow_empty_graph;
        child.fill_parameters = self.fill_parameters;
        child.allow_undefined_parameter_refs = self.allow_undefined_parameter_refs;

        if !path.is_empty()
            && let Some(registry) = &self.registry
            && let Some(contract) = registry.get(&parent.process_id, parent.namespace.as_deref())
        {
            child.callback_parameters = callback_parameters_for(contract.spec(), path);
        }
        child.parent = Some(parent);

        let mut frames = Vec::with_capacity(self.inherited.len() + 1);
        frames.push(self.scope_frame());
        frames.extend(self.inherited.iter().cloned());
        child.inherited = frames;

        child.parse()?;
        self.children.push(child);
        Ok(self.children.len() - 1)
    }

    /// Wires one edge in both directions; repeated calls are no-ops.
    fn connect(&mut self, from: &str, to: &str) {
        if let Some(node) = self.nodes.get_mut(to) {
            node.add_predecessor(from);
        }
        if let Some(node) = self.nodes.get_mut(from) {
            node.add_successor(to);
        }
    }

    fn structural_error(&self, kind: &Structural) -> ProcessGraphError {
        match self.parent.clone() {
            Some(parent) => {
                let process_id = parent.process_id;
                let node_id = parent.node_id;
                match kind {
                    Structural::ProcessMissing => ProcessGraphError::ProcessMissingCallback {
                        process_id,
                        node_id,
                    },
                    Structural::ProcessGraphMissing => {
                        ProcessGraphError::ProcessGraphMissingCallback {
                            process_id,
                            node_id,
                        }
                    }
                    Structural::StartNodeMissing => ProcessGraphError::StartNodeMissingCallback {
                        process_id,
                        node_id,
                    },
                    Structural::ResultNodeMissing => {
                        ProcessGraphError::ResultNodeMissingCallback {
                            process_id,
                            node_id,
                        }
                    }
                    Structural::MultipleResultNodes => {
                        ProcessGraphError::MultipleResultNodesCallback {
                            process_id,
                            node_id,
                        }
                    }
                }
            }
            None => match kind {
                Structural::ProcessMissing => ProcessGraphError::ProcessMissing,
                Structural::ProcessGraphMissing => ProcessGraphError::ProcessGraphMissing,
                Structural::StartNodeMissing => ProcessGraphError::StartNodeMissing,
                Structural::ResultNodeMissing => ProcessGraphError::ResultNodeMissing,
                Structural::MultipleResultNodes => ProcessGraphError::MultipleResultNodes,
            },
        }
    }
}
