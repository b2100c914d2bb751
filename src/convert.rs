//! Typed extraction of tool arguments.
//!
//! Tool arguments arrive as a loosely-typed JSON object. Every helper here
//! fails closed: a value that is present but of the wrong kind is an
//! `InvalidArg`, never a silent fallback to the default. `null` is treated the
//! same as an absent key.

use serde_json::{Map, Value as JsonValue};

use crate::error::{McpError, Result};

fn present<'a>(args: &'a Map<String, JsonValue>, name: &str) -> Option<&'a JsonValue> {
    args.get(name).filter(|v| !v.is_null())
}

fn invalid(name: &str, reason: &str) -> McpError {
    McpError::InvalidArg {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Helper to get a required string argument from JSON arguments.
pub fn get_string_arg(args: &Map<String, JsonValue>, name: &str) -> Result<String> {
    get_optional_string(args, name)?.ok_or_else(|| McpError::MissingArg(name.to_string()))
}

/// Helper to get an optional string argument from JSON arguments.
pub fn get_optional_string(args: &Map<String, JsonValue>, name: &str) -> Result<Option<String>> {
    match present(args, name) {
        None => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(invalid(name, "expected a string")),
    }
}

/// Helper to get an optional non-negative integer argument.
///
/// Whole floats such as `10.0` are accepted, since JSON clients often cannot
/// tell the two apart.
pub fn get_optional_usize(args: &Map<String, JsonValue>, name: &str) -> Result<Option<usize>> {
    let Some(value) = present(args, name) else {
        return Ok(None);
    };
    let JsonValue::Number(n) = value else {
        return Err(invalid(name, "expected a number"));
    };

    if let Some(u) = n.as_u64() {
        return usize::try_from(u)
            .map(Some)
            .map_err(|_| invalid(name, "number out of range"));
    }
    match n.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64 => Ok(Some(f as usize)),
        _ => Err(invalid(name, "expected a non-negative integer")),
    }
}

/// Helper to get an optional object argument.
pub fn get_optional_object<'a>(
    args: &'a Map<String, JsonValue>,
    name: &str,
) -> Result<Option<&'a Map<String, JsonValue>>> {
    match present(args, name) {
        None => Ok(None),
        Some(JsonValue::Object(obj)) => Ok(Some(obj)),
        Some(_) => Err(invalid(name, "expected an object")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(m) => m,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_required_string_missing() {
        let err = get_string_arg(&args(json!({})), "name").unwrap_err();
        assert!(matches!(err, McpError::MissingArg(ref n) if n == "name"));
    }

    #[test]
    fn test_null_counts_as_missing() {
        let err = get_string_arg(&args(json!({"name": null})), "name").unwrap_err();
        assert!(matches!(err, McpError::MissingArg(_)));
    }

    #[test]
    fn test_wrong_kind_fails_closed() {
        let err = get_optional_string(&args(json!({"filter": 42})), "filter").unwrap_err();
        assert!(matches!(err, McpError::InvalidArg { ref name, .. } if name == "filter"));

        let err = get_optional_object(&args(json!({"data": "x"})), "data").unwrap_err();
        assert!(matches!(err, McpError::InvalidArg { .. }));
    }

    #[test]
    fn test_usize_accepts_whole_floats() {
        let a = args(json!({"a": 10, "b": 10.0, "c": 2.5, "d": -1}));
        assert_eq!(get_optional_usize(&a, "a").unwrap(), Some(10));
        assert_eq!(get_optional_usize(&a, "b").unwrap(), Some(10));
        assert!(get_optional_usize(&a, "c").is_err());
        assert!(get_optional_usize(&a, "d").is_err());
        assert_eq!(get_optional_usize(&a, "missing").unwrap(), None);
    }
}
