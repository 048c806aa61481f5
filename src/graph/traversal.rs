//! Validation and execution drivers.
//!
//! Both drivers share one traversal shape over the dependency join state
//! kept on the nodes: a node becomes ready exactly when its last
//! predecessor reports completion, runs its per-node action once, and then
//! offers completion to each successor. Validation drives the state
//! machine sequentially in id-sorted order, which keeps collected error
//! order reproducible (independent branches carry no ordering guarantee,
//! so a deterministic order is as good as any). Execution drains ready
//! nodes through a [`FuturesUnordered`] pool so independent branches run
//! concurrently while a node still never starts before every predecessor
//! has stored its result.

use std::collections::VecDeque;

use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tracing::{debug, instrument};

use super::ProcessGraph;
use crate::errors::{ErrorList, ProcessGraphError};
use crate::node::{Argument, CallbackHandle, ProcessNode};
use crate::process::{ProcessInvocation, ResolvedArgument};

/// One in-flight node execution: the node id plus the runner outcome.
type NodeTask = BoxFuture<'static, (String, Result<Value, ProcessGraphError>)>;

impl ProcessGraph {
    /// Validates the graph, stopping at the first error.
    ///
    /// Parses on demand. Idempotent: once validated, the cached outcome is
    /// returned without traversing again. The error is also recorded in
    /// [`ProcessGraph::errors`].
    #[instrument(level = "debug", skip(self))]
    pub async fn validate(&mut self) -> Result<(), ProcessGraphError> {
        if self.validated {
            return match self.errors.first() {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            };
        }
        self.validated = true;

        if let Err(error) = self.parse() {
            self.errors.add(error.clone());
            return Err(error);
        }
        self.traverse_validation(true).await
    }

    /// Validates the graph best-effort, collecting every error instead of
    /// stopping at the first one. Returns the collected list; idempotent
    /// like [`ProcessGraph::validate`].
    #[instrument(level = "debug", skip(self))]
    pub async fn validate_all(&mut self) -> ErrorList {
        if !self.validated {
            self.validated = true;
            if let Err(error) = self.parse() {
                self.errors.add(error);
            } else {
                // Collect mode never aborts, so the result carries nothing
                // beyond what lands in the error list.
                let _ = self.traverse_validation(false).await;
            }
        }
        self.errors.clone()
    }

    /// Executes the graph and returns the result node.
    ///
    /// Re-validates (with undefined parameter references no longer
    /// tolerated, execution needs concrete values), resets all transient
    /// node state recursively, pushes the argument scope down into
    /// callbacks and then drives the concurrent traversal. Fail-fast: the
    /// first error aborts the run. `Ok(None)` only occurs for graphs that
    /// were allowed to be empty.
    #[instrument(level = "debug", skip(self, arguments))]
    pub async fn execute(
        &mut self,
        arguments: Option<rustc_hash::FxHashMap<String, Value>>,
    ) -> Result<Option<&ProcessNode>, ProcessGraphError> {
        self.allow_undefined_parameters(false);
        if let Some(arguments) = arguments {
            self.set_arguments(arguments);
        }
        self.validate().await?;
        self.reset();
        self.propagate_scope();
        self.traverse_execution().await?;
        Ok(self.result_node())
    }

    /// Validates one callback graph, failing with its first error.
    pub(crate) async fn validate_child(
        &mut self,
        handle: CallbackHandle,
    ) -> Result<(), ProcessGraphError> {
        match self.children.get_mut(handle) {
            Some(child) => child.validate().await,
            None => Err(ProcessGraphError::internal(format!(
                "Unknown callback handle {handle}"
            ))),
        }
    }

    async fn traverse_validation(
        &mut self,
        fail_fast: bool,
    ) -> Result<(), ProcessGraphError> {
        let mut ready: VecDeque<String> = VecDeque::new();
        for id in self.start_nodes.clone() {
            if let Some(node) = self.nodes.get_mut(&id)
                && node.solve_dependency(None)
            {
                ready.push_back(id);
            }
        }

        while let Some(id) = ready.pop_front() {
            if let Err(error) = self.validate_node(&id).await {
                self.errors.add(error.clone());
                if fail_fast {
                    return Err(error);
                }
            }
            // Offer completion to every successor, queueing the ones whose
            // dependencies are now all satisfied.
            let successors = self
                .nodes
                .get(&id)
                .map(ProcessNode::successor_ids)
                .unwrap_or_default();
            for successor in successors {
                if let Some(node) = self.nodes.get_mut(&successor)
                    && node.solve_dependency(Some(&id))
                {
                    ready.push_back(successor);
                }
            }
        }
        Ok(())
    }

    async fn validate_node(&mut self, node_id: &str) -> Result<(), ProcessGraphError> {
        // Without a registry only the structure can be checked; an unknown
        // process id is an error, never a silent no-op.
        match self.process_for_node(node_id)? {
            Some(contract) => contract.validate(self, node_id).await,
            None => Ok(()),
        }
    }

    async fn traverse_execution(&mut self) -> Result<(), ProcessGraphError> {
        let mut ready: VecDeque<String> = VecDeque::new();
        for id in self.start_nodes.clone() {
            if let Some(node) = self.nodes.get_mut(&id)
                && node.solve_dependency(None)
            {
                ready.push_back(id);
            }
        }

        let mut running: FuturesUnordered<NodeTask> = FuturesUnordered::new();
        loop {
            while let Some(id) = ready.pop_front() {
                running.push(self.node_task(&id)?);
            }
            let Some((id, outcome)) = running.next().await else {
                break;
            };
            let result = outcome?;
            debug!(node = %id, "node executed");
            if let Some(node) = self.nodes.get_mut(&id) {
                node.set_result(result);
            }
            let successors = self
                .nodes
                .get(&id)
                .map(ProcessNode::successor_ids)
                .unwrap_or_default();
            for successor in successors {
                if let Some(node) = self.nodes.get_mut(&successor)
                    && node.solve_dependency(Some(&id))
                {
                    ready.push_back(successor);
                }
            }
        }
        Ok(())
    }

    /// Prepares an owned execution task for a ready node: the contract is
    /// resolved and all arguments are evaluated up front, so the future
    /// borrows nothing from the graph.
    fn node_task(&self, node_id: &str) -> Result<NodeTask, ProcessGraphError> {
        let node = self.nodes.get(node_id).ok_or_else(|| {
            ProcessGraphError::internal(format!("Unknown node '{node_id}' during execution"))
        })?;
        let contract = self.process_for_node(node_id)?.ok_or_else(|| {
            ProcessGraphError::internal(
                "Cannot execute a process graph without a process registry",
            )
        })?;
        let invocation = self.invocation_for(node)?;
        let id = node_id.to_string();
        Ok(Box::pin(async move {
            let outcome = contract.execute(invocation).await;
            (id, outcome)
        }))
    }

    fn invocation_for(&self, node: &ProcessNode) -> Result<ProcessInvocation, ProcessGraphError> {
        let mut arguments = rustc_hash::FxHashMap::default();
        for (name, argument) in node.parsed_arguments() {
            if let Some(resolved) = self.evaluate_argument(node.id(), argument)? {
                arguments.insert(name.clone(), resolved);
            }
        }
        Ok(ProcessInvocation::new(
            node.id(),
            node.process_id(),
            node.namespace(),
            arguments,
        ))
    }

    /// Evaluates one parsed argument into its runtime value.
    ///
    /// Node references yield the referenced node's cached result (the
    /// traversal order guarantees it exists), parameter references resolve
    /// through the scope chain, callbacks become owned graph clones, and
    /// containers are rebuilt element by element. `Ok(None)` is the
    /// "no value" outcome of a tolerated undefined parameter reference.
    pub(crate) fn evaluate_argument(
        &self,
        node_id: &str,
        argument: &Argument,
    ) -> Result<Option<ResolvedArgument>, ProcessGraphError> {
        match argument {
            Argument::Value(value) => Ok(Some(ResolvedArgument::Value(value.clone()))),
            Argument::Result { from_node } => {
                let result = self
                    .nodes
                    .get(from_node)
                    .and_then(|n| n.result().cloned())
                    .ok_or_else(|| {
                        ProcessGraphError::internal(format!(
                            "Result of node '{from_node}' is not available"
                        ))
                    })?;
                Ok(Some(ResolvedArgument::Value(result)))
            }
            Argument::Parameter { from_parameter } => Ok(self
                .resolve_parameter(node_id, from_parameter)?
                .map(ResolvedArgument::Value)),
            Argument::Callback(handle) => {
                let child = self.children.get(*handle).ok_or_else(|| {
                    ProcessGraphError::internal(format!("Unknown callback handle {handle}"))
                })?;
                Ok(Some(ResolvedArgument::Callback(child.clone())))
            }
            Argument::Array(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.push(
                        self.evaluate_argument(node_id, item)?
                            .unwrap_or(ResolvedArgument::Value(Value::Null)),
                    );
                }
                Ok(Some(ResolvedArgument::array(resolved)))
            }
            Argument::Object(fields) => {
                let mut resolved = Vec::with_capacity(fields.len());
                for (key, item) in fields {
                    resolved.push((
                        key.clone(),
                        self.evaluate_argument(node_id, item)?
                            .unwrap_or(ResolvedArgument::Value(Value::Null)),
                    ));
                }
                Ok(Some(ResolvedArgument::object(resolved)))
            }
        }
    }

    /// Evaluates a named argument of a node, [`ProcessGraph::evaluate_argument`]
    /// applied to its parsed view. `Ok(None)` when the node has no such
    /// argument or it resolves to "no value".
    pub fn node_argument(
        &self,
        node_id: &str,
        name: &str,
    ) -> Result<Option<ResolvedArgument>, ProcessGraphError> {
        let Some(argument) = self.nodes.get(node_id).and_then(|n| n.parsed_argument(name)) else {
            return Ok(None);
        };
        self.evaluate_argument(node_id, argument)
    }

    /// Like [`ProcessGraph::node_argument`], with a fallback for absent or
    /// unresolved arguments.
    pub fn node_argument_or(
        &self,
        node_id: &str,
        name: &str,
        fallback: ResolvedArgument,
    ) -> Result<ResolvedArgument, ProcessGraphError> {
        Ok(self.node_argument(node_id, name)?.unwrap_or(fallback))
    }
}
