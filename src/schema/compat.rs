//! The static schema compatibility predicate.
//!
//! [`is_schema_compatible`] answers, before anything runs, whether a value
//! described by one schema would be accepted where a parameter described by
//! another schema is expected. It is pure and referentially transparent;
//! both sides are normalized into single-typed alternatives and the check
//! succeeds as soon as any parameter alternative accepts any value
//! alternative.
//!
//! Two deliberate approximations are part of the contract: an alternative
//! without a concrete `type` accepts (and, outside strict mode, is accepted
//! by) anything, and two object schemas that both declare `properties` are
//! considered compatible without a deep structural comparison.

use serde_json::Value;

use super::{normalize_schema, subtype_of, type_of};

/// Generic cube subtype acting as a family wildcard among object schemas.
const DATACUBE_SUBTYPE: &str = "datacube";

/// Checks whether a value described by `value_schema` would be accepted by
/// a parameter described by `param_schema`.
///
/// With `strict` set, the permissive rules for underspecified schemas are
/// disabled: an untyped value alternative no longer matches everything and
/// integer parameters no longer accept plain numbers. With
/// `allow_value_as_elements` set, a value is also accepted by an array or
/// object parameter when it could be one of its elements, e.g. a number
/// against an array-of-numbers parameter.
///
/// ```
/// use procgraph::schema::is_schema_compatible;
/// use serde_json::json;
///
/// let number = json!({"type": "number"});
/// let integer = json!({"type": "integer"});
/// assert!(is_schema_compatible(&number, &integer, false, false));
/// assert!(is_schema_compatible(&integer, &number, false, false));
/// assert!(!is_schema_compatible(&integer, &number, true, false));
/// ```
#[must_use]
pub fn is_schema_compatible(
    param_schema: &Value,
    value_schema: &Value,
    strict: bool,
    allow_value_as_elements: bool,
) -> bool {
    let param_schemas = normalize_schema(param_schema);
    let value_schemas = normalize_schema(value_schema);

    param_schemas.iter().any(|ps| {
        value_schemas
            .iter()
            .any(|vs| pair_compatible(ps, vs, strict, allow_value_as_elements))
    })
}

fn pair_compatible(ps: &Value, vs: &Value, strict: bool, allow_value_as_elements: bool) -> bool {
    let param_type = type_of(ps);
    let value_type = type_of(vs);

    // An alternative without a concrete type accepts anything; outside
    // strict mode the same holds for an untyped value.
    let Some(param_type) = param_type else {
        return true;
    };
    if !strict && value_type.is_none() {
        return true;
    }

    let types_match = value_type == Some(param_type)
        || (allow_value_as_elements && (param_type == "array" || param_type == "object"))
        || (param_type == "number" && value_type == Some("integer"))
        || (!strict && param_type == "integer" && value_type == Some("number"));
    if !types_match {
        return false;
    }

    if param_type == "array"
        && let Some(param_items) = ps.get("items").filter(|v| v.is_object())
    {
        let check_item_schema = |schema: &Value| {
            if allow_value_as_elements && is_schema_compatible(schema, vs, strict, false) {
                return true;
            }
            if let Some(value_items) = vs.get("items").filter(|v| v.is_object()) {
                return is_schema_compatible(schema, value_items, strict, false);
            }
            false
        };
        return match param_items
            .get("anyOf")
            .or_else(|| param_items.get("oneOf"))
            .and_then(Value::as_array)
        {
            Some(alternatives) => alternatives.iter().any(check_item_schema),
            None => check_item_schema(param_items),
        };
    }

    if param_type == "object" {
        let param_subtype = subtype_of(ps);
        let value_subtype = subtype_of(vs);
        if param_subtype == value_subtype {
            return true;
        }
        if param_subtype == Some(DATACUBE_SUBTYPE) || value_subtype == Some(DATACUBE_SUBTYPE) {
            return true;
        }
        // Accepted without a deep structural comparison; a documented
        // approximation.
        if ps.get("properties").is_some_and(Value::is_object)
            && vs.get("properties").is_some_and(Value::is_object)
        {
            return true;
        }
        return false;
    }

    // Scalar subtype rules: a parameter without a subtype accepts any
    // subtype of the same base type, and outside strict mode an
    // unsubtyped value matches a subtyped parameter as well.
    let param_subtype = subtype_of(ps);
    let value_subtype = subtype_of(vs);
    if !strict && (param_subtype.is_none() || value_subtype.is_none()) {
        return true;
    }
    if param_subtype.is_none() {
        return true;
    }
    param_subtype == value_subtype
}
