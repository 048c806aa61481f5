//! Default [`SchemaValidator`] implementation.
//!
//! Wraps the draft-07 structural engine from the `jsonschema` crate and
//! layers the domain subtype checks from [`super::subtypes`] on top. A
//! schema given as an array of alternatives behaves like an `anyOf` union:
//! the value is accepted as soon as one alternative accepts it, and the
//! messages of all failing alternatives are reported otherwise.
//!
//! The `process-graph` subtype is special: the value is parsed and
//! validated as a nested graph through the regular engine, and any failure
//! inside it surfaces as a single structural message. This is how callback
//! arguments are validated without the contract layer knowing anything
//! about graph internals.

use std::sync::Arc;

use async_trait::async_trait;
use jsonschema::{Draft, JSONSchema};
use rustc_hash::FxHashSet;
use serde_json::Value;

use super::{SchemaValidator, normalize_schema, subtypes, subtype_of};
use crate::graph::ProcessGraph;
use crate::registry::ProcessRegistry;

/// Structural JSON Schema validation plus domain subtype checks.
///
/// All capability lists are optional; an unconfigured check accepts every
/// value so that validation can run before deployment metadata is known.
#[derive(Debug, Clone, Default)]
pub struct JsonSchemaValidator {
    registry: Option<Arc<ProcessRegistry>>,
    collections: Option<Vec<String>>,
    epsg_codes: Option<Vec<i64>>,
    input_formats: Option<FxHashSet<String>>,
    output_formats: Option<FxHashSet<String>>,
    udf_runtimes: Option<FxHashSet<String>>,
}

impl JsonSchemaValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A validator whose `process-graph` subtype resolves processes from
    /// the given registry.
    #[must_use]
    pub fn with_registry(registry: Arc<ProcessRegistry>) -> Self {
        Self {
            registry: Some(registry),
            ..Self::default()
        }
    }

    /// Restricts `collection-id` values to the given ids.
    pub fn set_collections(&mut self, collections: Vec<String>) {
        self.collections = Some(collections);
    }

    /// Restricts `epsg-code` values to the given codes instead of the
    /// built-in plausibility heuristic.
    pub fn set_epsg_codes(&mut self, codes: Vec<i64>) {
        self.epsg_codes = Some(codes);
    }

    /// Restricts `input-format` / `output-format` values. Format names are
    /// matched case-insensitively.
    pub fn set_file_formats(&mut self, input: Vec<String>, output: Vec<String>) {
        self.input_formats = Some(input.into_iter().map(|f| f.to_uppercase()).collect());
        self.output_formats = Some(output.into_iter().map(|f| f.to_uppercase()).collect());
    }

    /// Restricts `udf-runtime` values to the given runtime names.
    pub fn set_udf_runtimes(&mut self, runtimes: Vec<String>) {
        self.udf_runtimes = Some(runtimes.into_iter().collect());
    }

    async fn check_subtype(&self, subtype: &str, value: &Value) -> Result<(), Vec<String>> {
        let result = match subtype {
            "collection-id" => subtypes::check_collection_id(value, self.collections.as_deref()),
            "udf-runtime" => subtypes::check_udf_runtime(value, self.udf_runtimes.as_ref()),
            "epsg-code" => subtypes::check_epsg_code(value, self.epsg_codes.as_deref()),
            "proj-definition" => subtypes::check_proj_definition(value),
            "wkt2-definition" => subtypes::check_wkt2_definition(value),
            "input-format" => subtypes::check_format(value, self.input_formats.as_ref(), "Input"),
            "output-format" => {
                subtypes::check_format(value, self.output_formats.as_ref(), "Output")
            }
            "geojson" => subtypes::check_geojson(value),
            "temporal-interval" => subtypes::check_temporal_interval(value),
            "temporal-intervals" => subtypes::check_temporal_intervals(value),
            "process-graph" => return self.check_process_graph(value).await,
            // Unknown subtypes carry no additional rules here.
            _ => Ok(()),
        };
        result.map_err(|message| vec![message])
    }

    /// Parses and validates an embedded graph, surfacing the first internal
    /// error as a single structural message.
    async fn check_process_graph(&self, value: &Value) -> Result<(), Vec<String>> {
        let mut graph = ProcessGraph::with_validator(
            value.clone(),
            self.registry.clone(),
            Arc::new(self.clone()),
        );
        match graph.validate().await {
            Ok(()) => Ok(()),
            Err(error) => Err(vec![error.to_string()]),
        }
    }
}

/// Structural errors of a single schema alternative, as messages.
fn structural_errors(schema: &Value, value: &Value) -> Vec<String> {
    let compiled = match JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema)
    {
        Ok(compiled) => compiled,
        Err(error) => return vec![format!("Invalid schema: {error}")],
    };
    match compiled.validate(value) {
        Ok(()) => Vec::new(),
        Err(errors) => errors.map(|e| e.to_string()).collect(),
    }
}

#[async_trait]
impl SchemaValidator for JsonSchemaValidator {
    async fn validate_value(&self, value: &Value, schema: &Value) -> Vec<String> {
        let alternatives = normalize_schema(schema);
        let mut collected = Vec::new();
        for alternative in &alternatives {
            let errors = structural_errors(alternative, value);
            if !errors.is_empty() {
                collected.extend(errors);
                continue;
            }
            match subtype_of(alternative) {
                None => return Vec::new(),
                Some(subtype) => match self.check_subtype(subtype, value).await {
                    Ok(()) => return Vec::new(),
                    Err(messages) => collected.extend(messages),
                },
            }
        }
        collected.dedup();
        collected
    }
}
