//! Reusable process implementations for tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use procgraph::errors::ProcessGraphError;
use procgraph::process::{ProcessInvocation, ProcessRunner};
use procgraph::registry::ProcessRegistry;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};

use super::fixtures::*;

/// Records the id of every node it executes, then delegates to an inner
/// computation.
#[derive(Debug, Clone)]
pub struct RecordingRunner {
    pub log: Arc<Mutex<Vec<String>>>,
    pub inner: MathRunner,
}

impl RecordingRunner {
    pub fn new(log: Arc<Mutex<Vec<String>>>, inner: MathRunner) -> Self {
        Self { log, inner }
    }
}

#[async_trait]
impl ProcessRunner for RecordingRunner {
    async fn run(&self, invocation: ProcessInvocation) -> Result<Value, ProcessGraphError> {
        self.log
            .lock()
            .unwrap()
            .push(invocation.node_id().to_string());
        self.inner.run(invocation).await
    }
}

/// Straightforward numeric operations over resolved arguments.
#[derive(Debug, Clone, Copy)]
pub enum MathRunner {
    Absolute,
    Add,
    Multiply,
    /// Sums the `data` array argument.
    Sum,
}

fn number(invocation: &ProcessInvocation, name: &str) -> Result<Option<f64>, ProcessGraphError> {
    let value = invocation.require_value(name)?;
    if value.is_null() {
        return Ok(None);
    }
    value.as_f64().map(Some).ok_or_else(|| {
        ProcessGraphError::internal(format!(
            "Argument '{name}' of process '{}' is not a number",
            invocation.process_id()
        ))
    })
}

#[async_trait]
impl ProcessRunner for MathRunner {
    async fn run(&self, invocation: ProcessInvocation) -> Result<Value, ProcessGraphError> {
        let result = match self {
            MathRunner::Absolute => number(&invocation, "x")?.map(f64::abs),
            MathRunner::Add => match (number(&invocation, "x")?, number(&invocation, "y")?) {
                (Some(x), Some(y)) => Some(x + y),
                _ => None,
            },
            MathRunner::Multiply => {
                match (number(&invocation, "x")?, number(&invocation, "y")?) {
                    (Some(x), Some(y)) => Some(x * y),
                    _ => None,
                }
            }
            MathRunner::Sum => {
                let data = invocation.require_value("data")?;
                let items = data.as_array().ok_or_else(|| {
                    ProcessGraphError::internal("Argument 'data' of process 'sum' is not an array")
                })?;
                let mut sum = 0.0;
                for item in items {
                    match item.as_f64() {
                        Some(n) => sum += n,
                        None => return Ok(Value::Null),
                    }
                }
                Some(sum)
            }
        };
        Ok(result.map_or(Value::Null, |n| json!(n)))
    }
}

/// Executes its `process` callback once with the `data` argument bound to
/// the callback parameter `x`.
#[derive(Debug, Clone, Copy)]
pub struct ApplyRunner;

#[async_trait]
impl ProcessRunner for ApplyRunner {
    async fn run(&self, mut invocation: ProcessInvocation) -> Result<Value, ProcessGraphError> {
        let data = invocation.require_value("data")?.clone();
        let mut callback = invocation.take_callback("process").ok_or_else(|| {
            ProcessGraphError::internal("Process 'apply' requires a callback for 'process'")
        })?;
        let mut arguments = FxHashMap::default();
        arguments.insert("x".to_string(), data);
        let result = callback.execute(Some(arguments)).await?;
        Ok(result
            .and_then(|node| node.result().cloned())
            .unwrap_or(Value::Null))
    }
}

/// A registry with executable implementations for all test processes.
pub fn executable_registry(log: &Arc<Mutex<Vec<String>>>) -> Arc<ProcessRegistry> {
    let mut registry = ProcessRegistry::new();
    let recording = |inner| {
        Arc::new(RecordingRunner::new(log.clone(), inner)) as Arc<dyn ProcessRunner>
    };
    registry
        .add_process(&absolute_spec(), recording(MathRunner::Absolute))
        .unwrap();
    registry
        .add_process(&add_spec(), recording(MathRunner::Add))
        .unwrap();
    registry
        .add_process(&multiply_spec(), recording(MathRunner::Multiply))
        .unwrap();
    registry
        .add_process(&sum_spec(), recording(MathRunner::Sum))
        .unwrap();
    registry
        .add_process(&apply_spec(), Arc::new(ApplyRunner))
        .unwrap();
    Arc::new(registry)
}

/// A registry with declarations only; `execute` on its processes fails.
pub fn declaration_registry() -> Arc<ProcessRegistry> {
    let mut registry = ProcessRegistry::new();
    for spec in [
        absolute_spec(),
        add_spec(),
        multiply_spec(),
        sum_spec(),
        apply_spec(),
        text_upper_spec(),
    ] {
        registry.add_spec(&spec).unwrap();
    }
    Arc::new(registry)
}
