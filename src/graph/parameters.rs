//! Parameter scope handling for graphs and callbacks.
//!
//! Every graph sees three layers of parameters: the parameters its own
//! specification declares, the callback parameters its parent process
//! declares for the slot it was passed in, and the scopes of all enclosing
//! graphs. The enclosing scopes are flattened into [`ScopeFrame`]s
//! (innermost parent first) when a callback is created and refreshed when
//! an execution pass starts, so resolution never needs a live pointer back
//! into the parent graph.
//!
//! Resolution order for a `from_parameter` reference: the graph's own
//! execution arguments, then its own declared default, then each ancestor
//! frame the same way. The first hit wins.

use rustc_hash::FxHashMap;
use serde_json::Value;

use super::ProcessGraph;
use crate::errors::ProcessGraphError;
use crate::process::ParameterSpec;

/// One ancestor scope: the arguments it was executed with and the defaults
/// its parameter declarations provide.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeFrame {
    pub(crate) arguments: FxHashMap<String, Value>,
    pub(crate) defaults: FxHashMap<String, Value>,
}

/// Parses the `parameters` array of a raw specification, skipping entries
/// that are not valid parameter objects.
pub(crate) fn declared_parameters(process: &Value) -> Vec<ParameterSpec> {
    process
        .get("parameters")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

impl ProcessGraph {
    /// Parameters declared by the process specification, including any
    /// auto-declared ones.
    #[must_use]
    pub fn process_parameters(&self) -> &[ParameterSpec] {
        &self.declared_parameters
    }

    #[must_use]
    pub fn process_parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.declared_parameters.iter().find(|p| p.name == name)
    }

    /// Callback parameters declared by the parent process for this slot.
    #[must_use]
    pub fn callback_parameters(&self) -> &[ParameterSpec] {
        &self.callback_parameters
    }

    #[must_use]
    pub fn callback_parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.callback_parameters.iter().find(|p| p.name == name)
    }

    /// Looks a parameter up across both layers. Callback parameters take
    /// precedence over process parameters of the same name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.callback_parameter(name)
            .or_else(|| self.process_parameter(name))
    }

    #[must_use]
    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameter(name).is_some()
    }

    /// The declared default of a parameter. `Some(Value::Null)` is a real
    /// default; `None` means the parameter has none (or does not exist).
    #[must_use]
    pub fn parameter_default(&self, name: &str) -> Option<Value> {
        self.parameter(name).and_then(|p| p.default.clone())
    }

    #[must_use]
    pub fn has_parameter_default(&self, name: &str) -> bool {
        self.parameter_default(name).is_some()
    }

    /// Declares an additional process parameter, as done for referenced
    /// but undeclared parameters when filling is enabled.
    pub fn add_process_parameter(
        &mut self,
        name: &str,
        description: &str,
        schema: Value,
    ) {
        self.declared_parameters.push(ParameterSpec {
            name: name.to_string(),
            description: description.to_string(),
            schema,
            optional: false,
            deprecated: false,
            experimental: false,
            default: None,
        });
        self.filled_parameters = true;
    }

    /// Resolves a `from_parameter` reference through the scope chain.
    ///
    /// Returns `Ok(None)` ("no value", distinct from null) when the chain
    /// is exhausted and undefined references are tolerated; fails with
    /// [`ProcessGraphError::ProcessGraphParameterMissing`] otherwise.
    pub(crate) fn resolve_parameter(
        &self,
        node_id: &str,
        name: &str,
    ) -> Result<Option<Value>, ProcessGraphError> {
        if let Some(value) = self.arguments.get(name) {
            return Ok(Some(value.clone()));
        }
        if let Some(default) = self.parameter_default(name) {
            return Ok(Some(default));
        }
        for frame in &self.inherited {
            if let Some(value) = frame.arguments.get(name) {
                return Ok(Some(value.clone()));
            }
            if let Some(default) = frame.defaults.get(name) {
                return Ok(Some(default.clone()));
            }
        }

        if self.allow_undefined_parameter_refs {
            return Ok(None);
        }
        let node = self.nodes.get(node_id);
        Err(ProcessGraphError::ProcessGraphParameterMissing {
            argument: name.to_string(),
            node_id: node_id.to_string(),
            process_id: node.map(|n| n.process_id().to_string()).unwrap_or_default(),
            namespace: node
                .and_then(|n| n.namespace())
                .unwrap_or("n/a")
                .to_string(),
        })
    }

    /// The scope this graph contributes to its callbacks.
    pub(crate) fn scope_frame(&self) -> ScopeFrame {
        let mut defaults = FxHashMap::default();
        for param in &self.declared_parameters {
            if let Some(default) = &param.default {
                defaults.insert(param.name.clone(), default.clone());
            }
        }
        // Callback parameters shadow process parameters of the same name.
        for param in &self.callback_parameters {
            match &param.default {
                Some(default) => {
                    defaults.insert(param.name.clone(), default.clone());
                }
                None => {
                    defaults.remove(&param.name);
                }
            }
        }
        ScopeFrame {
            arguments: self.arguments.clone(),
            defaults,
        }
    }

    /// Pushes the current scope chain down into all callback graphs.
    /// Called when an execution pass starts so that callbacks resolve the
    /// arguments this run was invoked with.
    pub(crate) fn propagate_scope(&mut self) {
        let own = self.scope_frame();
        let inherited = self.inherited.clone();
        for child in &mut self.children {
            let mut frames = Vec::with_capacity(inherited.len() + 1);
            frames.push(own.clone());
            frames.extend(inherited.iter().cloned());
            child.inherited = frames;
            child.propagate_scope();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph_with_parameters(parameters: Value) -> ProcessGraph {
        ProcessGraph::new(
            json!({
                "parameters": parameters,
                "process_graph": {
                    "n": {"process_id": "constant", "arguments": {}, "result": true}
                }
            }),
            None,
        )
    }

    #[test]
    fn declared_parameters_are_parsed_leniently() {
        let graph = graph_with_parameters(json!([
            {"name": "x", "schema": {"type": "number"}, "optional": true, "default": 7},
            "garbage"
        ]));
        assert_eq!(graph.process_parameters().len(), 1);
        assert_eq!(graph.parameter_default("x"), Some(json!(7)));
        assert!(graph.has_parameter("x"));
        assert!(!graph.has_parameter("y"));
    }

    #[test]
    fn own_arguments_win_over_defaults() {
        let mut graph = graph_with_parameters(json!([
            {"name": "x", "schema": {}, "optional": true, "default": 7}
        ]));
        graph.parse().unwrap();
        let mut args = FxHashMap::default();
        args.insert("x".to_string(), json!(1));
        graph.set_arguments(args);
        assert_eq!(graph.resolve_parameter("n", "x").unwrap(), Some(json!(1)));
    }

    #[test]
    fn inherited_frames_resolve_in_order() {
        let mut graph = graph_with_parameters(json!([]));
        graph.parse().unwrap();
        let mut near = ScopeFrame::default();
        near.arguments.insert("x".to_string(), json!("near"));
        let mut far = ScopeFrame::default();
        far.arguments.insert("x".to_string(), json!("far"));
        far.defaults.insert("y".to_string(), json!("far-default"));
        graph.inherited = vec![near, far];
        assert_eq!(
            graph.resolve_parameter("n", "x").unwrap(),
            Some(json!("near"))
        );
        assert_eq!(
            graph.resolve_parameter("n", "y").unwrap(),
            Some(json!("far-default"))
        );
    }

    #[test]
    fn unresolved_parameter_tolerated_or_fatal() {
        let mut graph = graph_with_parameters(json!([]));
        graph.parse().unwrap();
        assert_eq!(graph.resolve_parameter("n", "missing").unwrap(), None);

        graph.allow_undefined_parameters(false);
        let error = graph.resolve_parameter("n", "missing").unwrap_err();
        assert_eq!(error.code(), "ProcessGraphParameterMissing");
    }

    #[test]
    fn null_default_is_a_value() {
        let mut graph = graph_with_parameters(json!([
            {"name": "x", "schema": {}, "optional": true, "default": null}
        ]));
        graph.parse().unwrap();
        graph.allow_undefined_parameters(false);
        assert_eq!(
            graph.resolve_parameter("n", "x").unwrap(),
            Some(Value::Null)
        );
    }
}
