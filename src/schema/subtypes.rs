//! Domain subtype checks layered on top of structural validation.
//!
//! A subtype refines a base JSON type with domain rules that plain JSON
//! Schema cannot express, e.g. that an integer is a plausible EPSG code or
//! that a two-element array is a well-formed temporal interval. Checks that
//! depend on deployment metadata (collections, file formats, UDF runtimes,
//! EPSG code lists) validate against the configured lists and accept
//! everything while unconfigured, mirroring how backends incrementally
//! tighten validation as capability documents become available.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rustc_hash::FxHashSet;
use serde_json::Value;

/// WKT2 top-level CRS keywords; a WKT2 string must contain at least one.
const WKT2_KEYWORDS: &[&str] = &[
    "BOUNDCRS",
    "COMPOUNDCRS",
    "ENGCRS",
    "ENGINEERINGCRS",
    "GEODCRS",
    "GEODETICCRS",
    "GEOGCRS",
    "GEOGRAPHICCRS",
    "PARAMETRICCRS",
    "PROJCRS",
    "PROJECTEDCRS",
    "TIMECRS",
    "VERTCRS",
    "VERTICALCRS",
];

const GEOJSON_TYPES: &[&str] = &[
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
    "Feature",
    "FeatureCollection",
];

pub(crate) fn check_collection_id(
    value: &Value,
    collections: Option<&[String]>,
) -> Result<(), String> {
    let Some(known) = collections else {
        return Ok(());
    };
    let id = value.as_str().unwrap_or_default();
    if known.iter().any(|c| c == id) {
        Ok(())
    } else {
        Err(format!("Collection with id '{id}' doesn't exist."))
    }
}

pub(crate) fn check_udf_runtime(
    value: &Value,
    runtimes: Option<&FxHashSet<String>>,
) -> Result<(), String> {
    let Some(known) = runtimes else {
        return Ok(());
    };
    let name = value.as_str().unwrap_or_default();
    if known.contains(name) {
        Ok(())
    } else {
        Err(format!("UDF runtime '{name}' is not supported."))
    }
}

/// Without a configured code list only a rough plausibility check is done;
/// maintaining a full EPSG registry is out of scope.
pub(crate) fn check_epsg_code(value: &Value, codes: Option<&[i64]>) -> Result<(), String> {
    let code = value.as_i64().unwrap_or(i64::MIN);
    match codes {
        Some(known) if known.contains(&code) => Ok(()),
        None if code >= 2000 => Ok(()),
        _ => Err(format!("Invalid EPSG code '{code}' specified.")),
    }
}

pub(crate) fn check_proj_definition(value: &Value) -> Result<(), String> {
    let text = value.as_str().unwrap_or_default();
    if text.to_lowercase().contains("+proj") {
        Ok(())
    } else {
        Err("Invalid PROJ string specified (doesn't contain '+proj').".to_string())
    }
}

pub(crate) fn check_wkt2_definition(value: &Value) -> Result<(), String> {
    let text = value.as_str().unwrap_or_default().to_uppercase();
    if WKT2_KEYWORDS.iter().any(|word| text.contains(word)) {
        Ok(())
    } else {
        Err("Invalid WKT2 string specified.".to_string())
    }
}

pub(crate) fn check_format(
    value: &Value,
    formats: Option<&FxHashSet<String>>,
    direction: &str,
) -> Result<(), String> {
    let Some(known) = formats else {
        return Ok(());
    };
    let name = value.as_str().unwrap_or_default();
    if known.contains(&name.to_uppercase()) {
        Ok(())
    } else {
        Err(format!("{direction} format '{name}' not supported."))
    }
}

pub(crate) fn check_geojson(value: &Value) -> Result<(), String> {
    let Some(object) = value.as_object() else {
        return Err("Invalid GeoJSON specified (not an object).".to_string());
    };
    let Some(geo_type) = object.get("type").and_then(Value::as_str) else {
        return Err("Invalid GeoJSON specified (no type).".to_string());
    };
    if !GEOJSON_TYPES.contains(&geo_type) {
        return Err(format!("Invalid GeoJSON type '{geo_type}' specified."));
    }
    let required = match geo_type {
        "Feature" => "geometry",
        "FeatureCollection" => "features",
        "GeometryCollection" => "geometries",
        _ => "coordinates",
    };
    if object.contains_key(required) {
        Ok(())
    } else {
        Err(format!(
            "Invalid GeoJSON specified ('{geo_type}' without '{required}')."
        ))
    }
}

/// A temporal interval is a two-element array of timestamps or dates where
/// `null` opens an end. Both ends open is invalid; a closed interval must
/// not end before it starts.
pub(crate) fn check_temporal_interval(value: &Value) -> Result<(), String> {
    let Some(interval) = value.as_array().filter(|a| a.len() == 2) else {
        return Err("Temporal interval must have exactly two elements.".to_string());
    };
    match (&interval[0], &interval[1]) {
        (Value::Null, Value::Null) => {
            Err("Temporal interval must not be open on both ends.".to_string())
        }
        (start, end) if !start.is_null() && !end.is_null() => {
            let (Some(start), Some(end)) = (parse_instant(start), parse_instant(end)) else {
                return Err("Temporal interval contains an invalid timestamp.".to_string());
            };
            if end < start {
                Err("The second timestamp can't be before the first timestamp.".to_string())
            } else {
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

pub(crate) fn check_temporal_intervals(value: &Value) -> Result<(), String> {
    let Some(intervals) = value.as_array() else {
        return Err("Temporal intervals must be an array.".to_string());
    };
    for interval in intervals {
        check_temporal_interval(interval)?;
    }
    Ok(())
}

fn parse_instant(value: &Value) -> Option<NaiveDateTime> {
    let text = value.as_str()?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.naive_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn epsg_heuristic_and_configured_list() {
        assert!(check_epsg_code(&json!(3857), None).is_ok());
        assert!(check_epsg_code(&json!(12), None).is_err());
        let codes: Vec<i64> = vec![4326];
        assert!(check_epsg_code(&json!(4326), Some(&codes)).is_ok());
        assert!(check_epsg_code(&json!(3857), Some(&codes)).is_err());
    }

    #[test]
    fn proj_and_wkt2_heuristics() {
        assert!(check_proj_definition(&json!("+proj=utm +zone=32")).is_ok());
        assert!(check_proj_definition(&json!("EPSG:32632")).is_err());
        assert!(check_wkt2_definition(&json!("GEOGCRS[\"WGS 84\"]")).is_ok());
        assert!(check_wkt2_definition(&json!("nonsense")).is_err());
    }

    #[test]
    fn temporal_intervals() {
        assert!(check_temporal_interval(&json!(["2020-01-01", null])).is_ok());
        assert!(check_temporal_interval(&json!([null, "2020-01-01"])).is_ok());
        assert!(check_temporal_interval(&json!([null, null])).is_err());
        assert!(check_temporal_interval(&json!(["2020-01-02", "2020-01-01"])).is_err());
        assert!(
            check_temporal_interval(&json!(["2020-01-01T00:00:00Z", "2020-01-01T01:00:00Z"]))
                .is_ok()
        );
        assert!(check_temporal_intervals(&json!([["2020-01-01", "2020-02-01"], [null, null]])).is_err());
    }

    #[test]
    fn geojson_structural_check() {
        assert!(check_geojson(&json!({"type": "Point", "coordinates": [1.0, 2.0]})).is_ok());
        assert!(check_geojson(&json!({"type": "Feature", "geometry": null, "properties": null})).is_ok());
        assert!(check_geojson(&json!({"type": "Circle"})).is_err());
        assert!(check_geojson(&json!({"type": "Point"})).is_err());
        assert!(check_geojson(&json!("Point")).is_err());
    }

    #[test]
    fn membership_checks_accept_everything_while_unconfigured() {
        let collections = vec!["S2".to_string()];
        assert!(check_collection_id(&json!("S2"), None).is_ok());
        assert!(check_collection_id(&json!("S2"), Some(&collections)).is_ok());
        assert!(check_collection_id(&json!("S3"), Some(&collections)).is_err());
        assert!(check_udf_runtime(&json!("r"), None).is_ok());
        assert!(check_format(&json!("GTiff"), None, "Input").is_ok());
    }
}
