//! Shared process specifications and graph specifications for tests.
#![allow(dead_code)]

use serde_json::{Value, json};

pub fn absolute_spec() -> Value {
    json!({
        "id": "absolute",
        "summary": "Absolute value",
        "parameters": [
            {"name": "x", "schema": {"type": ["number", "null"]}}
        ],
        "returns": {"schema": {"type": ["number", "null"]}}
    })
}

pub fn add_spec() -> Value {
    json!({
        "id": "add",
        "summary": "Addition of two numbers",
        "parameters": [
            {"name": "x", "schema": {"type": ["number", "null"]}},
            {"name": "y", "schema": {"type": ["number", "null"]}}
        ],
        "returns": {"schema": {"type": ["number", "null"]}}
    })
}

pub fn multiply_spec() -> Value {
    json!({
        "id": "multiply",
        "summary": "Multiplication of two numbers",
        "parameters": [
            {"name": "x", "schema": {"type": ["number", "null"]}},
            {"name": "y", "schema": {"type": ["number", "null"]}}
        ],
        "returns": {"schema": {"type": ["number", "null"]}}
    })
}

pub fn text_upper_spec() -> Value {
    json!({
        "id": "text_upper",
        "summary": "Upper-cases a string",
        "parameters": [
            {"name": "data", "schema": {"type": "string"}}
        ],
        "returns": {"schema": {"type": "string"}}
    })
}

pub fn sum_spec() -> Value {
    json!({
        "id": "sum",
        "summary": "Sum of an array of numbers",
        "parameters": [
            {"name": "data", "schema": {
                "type": "array",
                "items": {"type": ["number", "null"]}
            }}
        ],
        "returns": {"schema": {"type": ["number", "null"]}}
    })
}

pub fn apply_spec() -> Value {
    json!({
        "id": "apply",
        "summary": "Applies a unary callback to a value",
        "parameters": [
            {"name": "data", "schema": {"type": ["number", "null"]}},
            {"name": "process", "schema": {
                "type": "object",
                "subtype": "process-graph",
                "parameters": [
                    {"name": "x", "schema": {"type": ["number", "null"]}}
                ]
            }}
        ],
        "returns": {"schema": {"type": ["number", "null"]}}
    })
}

/// A single-node graph invoking `absolute` with the given arguments.
pub fn absolute_graph(arguments: Value) -> Value {
    json!({
        "process_graph": {
            "abs1": {
                "process_id": "absolute",
                "arguments": arguments,
                "result": true
            }
        }
    })
}

/// add1 -> abs1 -> multiply1 (result); computes |1 + (-5)| * 3 = 12.
pub fn chain_graph() -> Value {
    json!({
        "process_graph": {
            "add1": {
                "process_id": "add",
                "arguments": {"x": 1, "y": -5}
            },
            "abs1": {
                "process_id": "absolute",
                "arguments": {"x": {"from_node": "add1"}}
            },
            "multiply1": {
                "process_id": "multiply",
                "arguments": {"x": {"from_node": "abs1"}, "y": 3},
                "result": true
            }
        }
    })
}

/// Two independent start nodes fanning into one result node.
pub fn fan_in_graph() -> Value {
    json!({
        "process_graph": {
            "left": {
                "process_id": "absolute",
                "arguments": {"x": -2}
            },
            "right": {
                "process_id": "absolute",
                "arguments": {"x": -3}
            },
            "join": {
                "process_id": "add",
                "arguments": {
                    "x": {"from_node": "left"},
                    "y": {"from_node": "right"}
                },
                "result": true
            }
        }
    })
}

/// `apply` over a callback that takes the absolute value of its input.
pub fn apply_graph(data: Value) -> Value {
    json!({
        "process_graph": {
            "apply1": {
                "process_id": "apply",
                "arguments": {
                    "data": data,
                    "process": {
                        "process_graph": {
                            "abs1": {
                                "process_id": "absolute",
                                "arguments": {"x": {"from_parameter": "x"}},
                                "result": true
                            }
                        }
                    }
                },
                "result": true
            }
        }
    })
}
