mod common;

use std::sync::{Arc, Mutex};

use common::*;
use procgraph::graph::ProcessGraph;
use rustc_hash::FxHashMap;
use serde_json::json;

fn new_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

#[tokio::test]
async fn linear_chain_executes_in_dependency_order() {
    let log = new_log();
    let mut pg = ProcessGraph::new(chain_graph(), Some(executable_registry(&log)));

    let result = pg.execute(None).await.unwrap().unwrap();
    assert_eq!(result.id(), "multiply1");
    assert_eq!(result.result(), Some(&json!(12.0)));

    // Every node fired exactly once, in dependency order.
    let order = log.lock().unwrap().clone();
    assert_eq!(order, vec!["add1", "abs1", "multiply1"]);

    // Intermediate results are cached on their nodes.
    assert_eq!(pg.node("add1").unwrap().result(), Some(&json!(-4.0)));
    assert_eq!(pg.node("abs1").unwrap().result(), Some(&json!(4.0)));
}

#[tokio::test]
async fn fan_in_waits_for_all_predecessors() {
    let log = new_log();
    let mut pg = ProcessGraph::new(fan_in_graph(), Some(executable_registry(&log)));

    let result = pg.execute(None).await.unwrap().unwrap();
    assert_eq!(result.result(), Some(&json!(5.0)));

    let order = log.lock().unwrap().clone();
    assert_eq!(order.len(), 3);
    assert_eq!(order.last().map(String::as_str), Some("join"));
    assert!(order.contains(&"left".to_string()));
    assert!(order.contains(&"right".to_string()));
}

#[tokio::test]
async fn repeated_execution_resets_node_state() {
    let log = new_log();
    let mut pg = ProcessGraph::new(chain_graph(), Some(executable_registry(&log)));

    pg.execute(None).await.unwrap();
    pg.execute(None).await.unwrap();

    let order = log.lock().unwrap().clone();
    assert_eq!(order.len(), 6);
    assert_eq!(
        pg.result_node().unwrap().result(),
        Some(&json!(12.0))
    );
}

#[tokio::test]
async fn container_arguments_are_evaluated_element_wise() {
    let log = new_log();
    let spec = json!({"process_graph": {
        "abs1": {"process_id": "absolute", "arguments": {"x": -4}},
        "sum1": {
            "process_id": "sum",
            "arguments": {"data": [1, {"from_node": "abs1"}, 2.5]},
            "result": true
        }
    }});
    let mut pg = ProcessGraph::new(spec, Some(executable_registry(&log)));
    let result = pg.execute(None).await.unwrap().unwrap();
    assert_eq!(result.result(), Some(&json!(7.5)));
}

#[tokio::test]
async fn callbacks_execute_through_their_owning_process() {
    let log = new_log();
    let mut pg = ProcessGraph::new(apply_graph(json!(-7)), Some(executable_registry(&log)));

    let result = pg.execute(None).await.unwrap().unwrap();
    assert_eq!(result.result(), Some(&json!(7.0)));
}

#[tokio::test]
async fn graph_arguments_resolve_parameter_references() {
    let log = new_log();
    let spec = json!({
        "parameters": [{"name": "input", "schema": {"type": "number"}, "optional": true, "default": -10}],
        "process_graph": {
            "abs1": {
                "process_id": "absolute",
                "arguments": {"x": {"from_parameter": "input"}},
                "result": true
            }
        }
    });

    // Supplied arguments win over the declared default.
    let mut pg = ProcessGraph::new(spec.clone(), Some(executable_registry(&log)));
    let mut args = FxHashMap::default();
    args.insert("input".to_string(), json!(-3));
    let result = pg.execute(Some(args)).await.unwrap().unwrap();
    assert_eq!(result.result(), Some(&json!(3.0)));

    // Without arguments the default applies.
    let mut pg = ProcessGraph::new(spec, Some(executable_registry(&log)));
    let result = pg.execute(None).await.unwrap().unwrap();
    assert_eq!(result.result(), Some(&json!(10.0)));
}

#[tokio::test]
async fn unresolved_parameter_fails_execution() {
    let log = new_log();
    let mut pg = ProcessGraph::new(
        absolute_graph(json!({"x": {"from_parameter": "input"}})),
        Some(executable_registry(&log)),
    );
    let error = pg.execute(None).await.unwrap_err();
    assert_eq!(error.code(), "ProcessGraphParameterMissing");
    assert!(error.to_string().contains("'input'"));
    assert!(error.to_string().contains("'abs1'"));
}

#[tokio::test]
async fn execution_without_registry_fails() {
    let mut pg = ProcessGraph::new(absolute_graph(json!({"x": -1})), None);
    let error = pg.execute(None).await.unwrap_err();
    assert_eq!(error.code(), "InternalError");
}

#[tokio::test]
async fn execution_without_implementation_fails() {
    let mut pg = ProcessGraph::new(
        absolute_graph(json!({"x": -1})),
        Some(declaration_registry()),
    );
    let error = pg.execute(None).await.unwrap_err();
    assert_eq!(error.code(), "InternalError");
    assert!(error.to_string().contains("absolute"));
}

#[tokio::test]
async fn empty_graph_executes_to_no_result() {
    let log = new_log();
    let mut pg = ProcessGraph::new(json!({}), Some(executable_registry(&log)));
    pg.allow_empty(true);
    let result = pg.execute(None).await.unwrap();
    assert!(result.is_none());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn node_argument_evaluation_is_deterministic() {
    let log = new_log();
    let mut pg = ProcessGraph::new(chain_graph(), Some(executable_registry(&log)));
    pg.execute(None).await.unwrap();

    // Literal arguments evaluate to themselves, references to the cached
    // upstream result; repeating the evaluation yields the same values.
    for _ in 0..2 {
        let x = pg.node_argument("multiply1", "x").unwrap().unwrap();
        assert_eq!(x.as_value(), Some(&json!(4.0)));
        let y = pg.node_argument("multiply1", "y").unwrap().unwrap();
        assert_eq!(y.as_value(), Some(&json!(3)));
    }
    assert!(pg.node_argument("multiply1", "nope").unwrap().is_none());
}

#[tokio::test]
async fn execute_returns_validation_errors_first() {
    let log = new_log();
    let mut pg = ProcessGraph::new(absolute_graph(json!({})), Some(executable_registry(&log)));
    let error = pg.execute(None).await.unwrap_err();
    assert_eq!(error.code(), "ProcessArgumentRequired");
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn results_are_plain_values_not_references() {
    let log = new_log();
    let mut pg = ProcessGraph::new(fan_in_graph(), Some(executable_registry(&log)));
    pg.execute(None).await.unwrap();
    let join = pg.node("join").unwrap();
    // The raw view still holds the reference shape.
    assert_eq!(join.raw_argument("x"), Some(&json!({"from_node": "left"})));
    // The evaluated view holds the upstream value.
    let x = pg.node_argument("join", "x").unwrap().unwrap();
    assert_eq!(x.as_value(), Some(&json!(2.0)));
}
