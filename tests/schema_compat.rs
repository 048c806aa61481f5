use procgraph::schema::{is_schema_compatible, normalize_schema};
use proptest::prelude::*;
use serde_json::{Value, json};

#[test]
fn any_type_accepts_everything() {
    let any = json!({});
    for schema in [
        json!({"type": "number"}),
        json!({"type": "string"}),
        json!({"type": "object", "subtype": "datacube"}),
        json!({"type": "array", "items": {"type": "number"}}),
    ] {
        assert!(is_schema_compatible(&any, &schema, false, false));
        assert!(is_schema_compatible(&any, &schema, true, false));
        assert!(is_schema_compatible(&schema, &any, false, false));
        assert!(!is_schema_compatible(&schema, &any, true, false));
    }
}

#[test]
fn widening_rules() {
    let number = json!({"type": "number"});
    let integer = json!({"type": "integer"});
    assert!(is_schema_compatible(&number, &integer, false, false));
    assert!(is_schema_compatible(&number, &integer, true, false));
    assert!(is_schema_compatible(&integer, &number, false, false));
    assert!(!is_schema_compatible(&integer, &number, true, false));
}

#[test]
fn union_schemas_match_pairwise() {
    let number_or_null = json!({"anyOf": [{"type": "number"}, {"type": "null"}]});
    let multi_type = json!({"type": ["string", "null"]});
    assert!(is_schema_compatible(&number_or_null, &multi_type, false, false));
    assert!(is_schema_compatible(&multi_type, &number_or_null, false, false));
    let string = json!({"type": "string"});
    assert!(!is_schema_compatible(&number_or_null, &string, false, false));
}

#[test]
fn value_as_elements() {
    let array_of_numbers = json!({"type": "array", "items": {"type": "number"}});
    let number = json!({"type": "number"});
    let string = json!({"type": "string"});
    assert!(is_schema_compatible(&array_of_numbers, &number, false, true));
    assert!(!is_schema_compatible(&array_of_numbers, &number, false, false));
    assert!(!is_schema_compatible(&array_of_numbers, &string, false, true));
}

#[test]
fn array_item_unions() {
    let mixed = json!({
        "type": "array",
        "items": {"anyOf": [{"type": "string"}, {"type": "number"}]}
    });
    let numbers = json!({"type": "array", "items": {"type": "number"}});
    let booleans = json!({"type": "array", "items": {"type": "boolean"}});
    assert!(is_schema_compatible(&mixed, &numbers, false, false));
    assert!(!is_schema_compatible(&mixed, &booleans, false, false));
}

#[test]
fn object_rules() {
    let plain = json!({"type": "object"});
    let cube = json!({"type": "object", "subtype": "datacube"});
    let raster = json!({"type": "object", "subtype": "raster-cube"});
    let structured = json!({"type": "object", "properties": {"a": {"type": "number"}}});
    let other_structured = json!({"type": "object", "properties": {"b": {"type": "string"}}});

    assert!(is_schema_compatible(&plain, &plain, false, false));
    assert!(is_schema_compatible(&cube, &raster, false, false));
    assert!(is_schema_compatible(&raster, &cube, false, false));
    assert!(!is_schema_compatible(&raster, &plain, false, false));
    // Both declaring properties is accepted without deep comparison.
    assert!(is_schema_compatible(&structured, &other_structured, false, false));
}

fn primitive_type() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("string"),
        Just("number"),
        Just("integer"),
        Just("boolean"),
        Just("null"),
        Just("array"),
        Just("object"),
    ]
}

fn subtype() -> impl Strategy<Value = Option<&'static str>> {
    prop_oneof![
        Just(None),
        Just(Some("date-time")),
        Just(Some("epsg-code")),
        Just(Some("datacube")),
        Just(Some("raster-cube")),
    ]
}

proptest! {
    // Every normalized alternative accepts itself, strict or not.
    #[test]
    fn compatibility_is_reflexive(ty in primitive_type(), sub in subtype(), strict in any::<bool>()) {
        let mut schema = serde_json::Map::new();
        schema.insert("type".to_string(), json!(ty));
        if let Some(sub) = sub {
            schema.insert("subtype".to_string(), json!(sub));
        }
        let schema = Value::Object(schema);
        prop_assert!(is_schema_compatible(&schema, &schema, strict, false));
    }

    // Normalization never produces alternatives with a multi-valued type.
    #[test]
    fn normalization_yields_single_types(types in proptest::collection::vec(primitive_type(), 1..4)) {
        let schema = json!({"type": types});
        for alternative in normalize_schema(&schema) {
            prop_assert!(alternative.get("type").map(Value::is_string).unwrap_or(false));
        }
    }
}
