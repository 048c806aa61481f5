//! Schema handling: union normalization, element schema extraction, the
//! compatibility predicate and the value-validation boundary.
//!
//! Schemas are JSON Schema draft-07 values, optionally refined by a named
//! `subtype` (e.g. `"epsg-code"` refining `"integer"`). The engine never
//! interprets schemas beyond what [`compat`] and the [`SchemaValidator`]
//! boundary need; everything else is left to the structural engine behind
//! the default validator implementation.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

pub mod compat;
pub mod subtypes;
pub mod validator;

pub use compat::is_schema_compatible;
pub use validator::JsonSchemaValidator;

/// Validates concrete values against schemas.
///
/// This is the pluggable boundary between the engine and the structural
/// JSON Schema machinery. Implementations return a list of human-readable
/// error messages; an empty list means the value is accepted. They are
/// async because domain subtypes may need to recurse into graph validation
/// or consult external metadata.
#[async_trait]
pub trait SchemaValidator: Send + Sync + std::fmt::Debug {
    /// Validates `value` against `schema`, returning all error messages.
    async fn validate_value(&self, value: &Value, schema: &Value) -> Vec<String>;
}

/// Expands a schema into a flat list of single-typed alternatives.
///
/// An array of schemas and `anyOf`/`oneOf` unions are flattened
/// recursively; a `type` given as an array is split into one alternative
/// per type. Every returned alternative declares at most one `type`.
///
/// ```
/// use procgraph::schema::normalize_schema;
/// use serde_json::json;
///
/// let alts = normalize_schema(&json!({"type": ["string", "null"]}));
/// assert_eq!(alts.len(), 2);
/// let alts = normalize_schema(&json!({"anyOf": [{"type": "number"}, {"type": "string"}]}));
/// assert_eq!(alts.len(), 2);
/// ```
#[must_use]
pub fn normalize_schema(schema: &Value) -> Vec<Value> {
    match schema {
        Value::Array(entries) => entries.iter().flat_map(normalize_schema).collect(),
        Value::Object(map) => {
            if let Some(union) = union_entries(map) {
                union.iter().flat_map(normalize_schema).collect()
            } else if let Some(types) = map.get("type").and_then(Value::as_array) {
                types
                    .iter()
                    .map(|t| {
                        let mut single = map.clone();
                        single.insert("type".to_string(), t.clone());
                        Value::Object(single)
                    })
                    .collect()
            } else {
                vec![schema.clone()]
            }
        }
        _ => vec![schema.clone()],
    }
}

fn union_entries(map: &Map<String, Value>) -> Option<&Vec<Value>> {
    map.get("anyOf")
        .or_else(|| map.get("oneOf"))
        .and_then(Value::as_array)
}

/// Extracts the sub-schema describing the element at `key` of an array or
/// object schema. Returns an empty schema when the schema says nothing
/// about that element.
///
/// For arrays, `items` applies to every element; a tuple-style `items`
/// array is indexed positionally with `additionalItems` as the fallback.
/// For objects, `properties` is consulted first, then
/// `additionalProperties`.
#[must_use]
pub fn element_schema(schema: &Value, key: &str) -> Value {
    let empty = json!({});
    let Some(map) = schema.as_object() else {
        return empty;
    };
    if let Some(items) = map.get("items") {
        match items {
            Value::Object(_) => return items.clone(),
            Value::Array(tuple) => {
                if let Some(found) = key
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| tuple.get(i))
                    .filter(|v| v.is_object())
                {
                    return found.clone();
                }
                if let Some(additional) = map.get("additionalItems").filter(|v| v.is_object()) {
                    return additional.clone();
                }
                return empty;
            }
            _ => {}
        }
    }
    if let Some(found) = map
        .get("properties")
        .and_then(|p| p.get(key))
        .filter(|v| v.is_object())
    {
        return found.clone();
    }
    if let Some(additional) = map.get("additionalProperties").filter(|v| v.is_object()) {
        return additional.clone();
    }
    empty
}

/// True if the schema object is empty, i.e. carries no constraints.
#[must_use]
pub fn is_empty_schema(schema: &Value) -> bool {
    schema.as_object().is_none_or(Map::is_empty)
}

pub(crate) fn type_of(schema: &Value) -> Option<&str> {
    schema.get("type").and_then(Value::as_str)
}

pub(crate) fn subtype_of(schema: &Value) -> Option<&str> {
    schema.get("subtype").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_flattens_nested_unions() {
        let schema = json!([
            {"anyOf": [{"type": "number"}, {"type": ["string", "null"]}]},
            {"type": "boolean"}
        ]);
        let alts = normalize_schema(&schema);
        assert_eq!(alts.len(), 4);
        assert_eq!(type_of(&alts[0]), Some("number"));
        assert_eq!(type_of(&alts[1]), Some("string"));
        assert_eq!(type_of(&alts[2]), Some("null"));
        assert_eq!(type_of(&alts[3]), Some("boolean"));
    }

    #[test]
    fn normalize_keeps_plain_schema() {
        let schema = json!({"type": "integer", "subtype": "epsg-code"});
        assert_eq!(normalize_schema(&schema), vec![schema]);
    }

    #[test]
    fn element_schema_for_arrays_and_objects() {
        let array = json!({"type": "array", "items": {"type": "number"}});
        assert_eq!(element_schema(&array, "0"), json!({"type": "number"}));

        let tuple = json!({"type": "array", "items": [{"type": "string"}], "additionalItems": {"type": "null"}});
        assert_eq!(element_schema(&tuple, "0"), json!({"type": "string"}));
        assert_eq!(element_schema(&tuple, "1"), json!({"type": "null"}));

        let object = json!({"type": "object", "properties": {"a": {"type": "boolean"}}});
        assert_eq!(element_schema(&object, "a"), json!({"type": "boolean"}));
        assert!(is_empty_schema(&element_schema(&object, "b")));
    }
}
