//! # Procgraph: JSON process graph engine
//!
//! Procgraph parses, validates and executes **process graphs**: directed
//! acyclic dataflow graphs described in JSON, where every node invokes a
//! named process (a typed function signature) and may reference other
//! nodes' results, externally supplied parameters, or nested sub-graphs
//! passed as callback arguments.
//!
//! ## Core Concepts
//!
//! - **Nodes**: Process invocation sites with literal or reference-valued
//!   arguments
//! - **Graph**: Owns the nodes, discovers dependency edges from argument
//!   references, and drives validation and execution
//! - **Contracts**: Declared parameter lists and return schemas the
//!   arguments are validated against
//! - **Registry**: Resolves process ids to contracts and executable
//!   implementations
//! - **Schema compatibility**: Static checks that a producing schema fits
//!   a consuming parameter schema
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use procgraph::graph::ProcessGraph;
//! use procgraph::registry::ProcessRegistry;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), procgraph::errors::ProcessGraphError> {
//! let mut registry = ProcessRegistry::new();
//! registry.add_spec(&json!({
//!     "id": "absolute",
//!     "parameters": [{"name": "x", "schema": {"type": ["number", "null"]}}],
//!     "returns": {"schema": {"type": ["number", "null"]}}
//! })).unwrap();
//!
//! let mut graph = ProcessGraph::new(json!({
//!     "process_graph": {
//!         "abs1": {
//!             "process_id": "absolute",
//!             "arguments": {"x": -1},
//!             "result": true
//!         }
//!     }
//! }), Some(Arc::new(registry)));
//!
//! graph.validate().await?;
//! assert!(graph.is_valid());
//! # Ok(())
//! # }
//! ```
//!
//! ## Execution Model
//!
//! Execution is cooperative and fail-fast: ready nodes (all predecessors
//! completed) run concurrently, each node fires at most once per pass, and
//! the result of the designated result node is the graph's output.
//! Callback graphs are handed to process implementations as owned clones
//! and executed by them, once per outer invocation if need be.
//!
//! ## Module Guide
//!
//! - [`graph`] - Graph parsing, validation and execution
//! - [`node`] - Nodes and the parsed argument representation
//! - [`process`] - Process specifications, contracts and runners
//! - [`registry`] - Process registry
//! - [`schema`] - Schema compatibility and value validation
//! - [`refs`] - Reference classification for raw JSON values
//! - [`errors`] - Error taxonomy and error lists

pub mod errors;
pub mod graph;
pub mod node;
pub mod process;
pub mod refs;
pub mod registry;
pub mod schema;
