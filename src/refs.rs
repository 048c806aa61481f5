//! Reference classification for raw JSON argument values.
//!
//! Node arguments are plain JSON, but three object shapes carry structural
//! meaning: `{"from_node": …}` refers to another node's result,
//! `{"from_parameter": …}` refers to a value from the parameter scope chain,
//! and an object with a `process_graph` key embeds a callback graph. This
//! module is the single place that decides which shape a value has; both
//! the node and graph layers depend on it so that neither needs to know the
//! wire format of the other.
//!
//! All functions here are pure: they never mutate their input and are safe
//! to call on arbitrarily nested values.

use serde_json::Value;

/// The structural kind of a raw JSON argument value.
///
/// Kinds are mutually exclusive and checked in a fixed priority order, see
/// [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// The JSON `null` literal, distinguished from an absent value.
    Null,
    Boolean,
    Number,
    String,
    /// An array; elements must be classified individually.
    Array,
    /// A plain object without reference semantics; fields must be
    /// classified individually.
    Object,
    /// `{"from_node": "<id>"}`, the result of another node in the same graph.
    Result,
    /// `{"from_parameter": "<name>"}`, a value from the parameter scope.
    Parameter,
    /// An object carrying a `process_graph` key, i.e. an embedded callback.
    Callback,
}

/// Classifies a raw JSON value.
///
/// Priority order for objects: callback (`process_graph` key) before node
/// result (`from_node`) before parameter (`from_parameter`) before plain
/// object.
///
/// ```
/// use procgraph::refs::{classify, ValueKind};
/// use serde_json::json;
///
/// assert_eq!(classify(&json!(null)), ValueKind::Null);
/// assert_eq!(classify(&json!({"from_node": "a"})), ValueKind::Result);
/// assert_eq!(classify(&json!({"from_parameter": "x"})), ValueKind::Parameter);
/// assert_eq!(classify(&json!({"process_graph": {}})), ValueKind::Callback);
/// assert_eq!(classify(&json!({"anything": "else"})), ValueKind::Object);
/// ```
#[must_use]
pub fn classify(value: &Value) -> ValueKind {
    match value {
        Value::Null => ValueKind::Null,
        Value::Bool(_) => ValueKind::Boolean,
        Value::Number(_) => ValueKind::Number,
        Value::String(_) => ValueKind::String,
        Value::Array(_) => ValueKind::Array,
        Value::Object(map) => {
            if map.contains_key("process_graph") {
                ValueKind::Callback
            } else if map.contains_key("from_node") {
                ValueKind::Result
            } else if map.contains_key("from_parameter") {
                ValueKind::Parameter
            } else {
                ValueKind::Object
            }
        }
    }
}

/// Checks whether a value contains references (`from_node` / `from_parameter`)
/// anywhere in its recursive expansion.
///
/// A callback encountered at the top level is inspected; callbacks nested
/// below the top level are only inspected when `check_callbacks` is set.
#[must_use]
pub fn contains_ref(value: &Value, check_callbacks: bool) -> bool {
    contains_ref_at(value, check_callbacks, 0)
}

fn contains_ref_at(value: &Value, check_callbacks: bool, depth: usize) -> bool {
    match classify(value) {
        ValueKind::Result | ValueKind::Parameter => true,
        ValueKind::Callback => {
            (depth == 0 || check_callbacks)
                && value
                    .get("process_graph")
                    .is_some_and(|pg| contains_ref_at(pg, check_callbacks, depth + 1))
        }
        ValueKind::Array => value
            .as_array()
            .is_some_and(|items| items.iter().any(|v| contains_ref_at(v, check_callbacks, depth))),
        ValueKind::Object => value
            .as_object()
            .is_some_and(|map| map.values().any(|v| contains_ref_at(v, check_callbacks, depth))),
        _ => false,
    }
}

/// Returns all distinct references contained in a value, in discovery order.
///
/// Each entry is the reference object itself, e.g. `{"from_parameter": "x"}`.
/// Callbacks below the top level are only descended into when
/// `from_callbacks` is set.
#[must_use]
pub fn collect_refs(value: &Value, from_callbacks: bool) -> Vec<Value> {
    let mut store = Vec::new();
    collect_refs_at(value, from_callbacks, 0, &mut store);
    store
}

fn collect_refs_at(value: &Value, from_callbacks: bool, depth: usize, store: &mut Vec<Value>) {
    match classify(value) {
        ValueKind::Result | ValueKind::Parameter => {
            if !store.contains(value) {
                store.push(value.clone());
            }
        }
        ValueKind::Callback => {
            if depth == 0 || from_callbacks {
                if let Some(pg) = value.get("process_graph") {
                    collect_refs_at(pg, from_callbacks, depth + 1, store);
                }
            }
        }
        ValueKind::Array => {
            if let Some(items) = value.as_array() {
                for item in items {
                    collect_refs_at(item, from_callbacks, depth, store);
                }
            }
        }
        ValueKind::Object => {
            if let Some(map) = value.as_object() {
                for item in map.values() {
                    collect_refs_at(item, from_callbacks, depth, store);
                }
            }
        }
        _ => {}
    }
}
