//! JSON-Schema parameter validation.
//!
//! Validates tool call arguments against the subset of JSON Schema that
//! `Tool::parameters()` is documented to produce: object/array/string/
//! number/integer/boolean types, `enum`, numeric `minimum`/`maximum`,
//! string `minLength`/`maxLength`, `required`, and recursive `properties`/
//! `items`. Unknown keys on an object are always permitted.

use std::collections::HashMap;

use serde_json::Value;

/// Validate `params` (as an object) against `schema`.
///
/// Returns `Ok(())` if valid, or `Err(reason)` with a short human-readable
/// description of the first violation found.
pub fn validate(schema: &Value, params: &HashMap<String, Value>) -> Result<(), String> {
    let value = Value::Object(params.clone().into_iter().collect());
    validate_value(schema, &value)
}

fn validate_value(schema: &Value, value: &Value) -> Result<(), String> {
    let Some(schema) = schema.as_object() else {
        return Ok(());
    };

    if let Some(ty) = schema.get("type").and_then(|t| t.as_str()) {
        check_type(ty, value)?;
    }

    if let Some(allowed) = schema.get("enum").and_then(|e| e.as_array()) {
        if !allowed.contains(value) {
            return Err(format!("value {value} is not one of the allowed enum values"));
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(|m| m.as_f64()) {
            if n < min {
                return Err(format!("value {n} is below minimum {min}"));
            }
        }
        if let Some(max) = schema.get("maximum").and_then(|m| m.as_f64()) {
            if n > max {
                return Err(format!("value {n} is above maximum {max}"));
            }
        }
    }

    if let Some(s) = value.as_str() {
        if let Some(min_len) = schema.get("minLength").and_then(|m| m.as_u64()) {
            if (s.chars().count() as u64) < min_len {
                return Err(format!("string is shorter than minLength {min_len}"));
            }
        }
        if let Some(max_len) = schema.get("maxLength").and_then(|m| m.as_u64()) {
            if (s.chars().count() as u64) > max_len {
                return Err(format!("string is longer than maxLength {max_len}"));
            }
        }
    }

    if let Some(obj) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
            for key in required {
                let Some(key) = key.as_str() else { continue };
                if !obj.contains_key(key) {
                    return Err(format!("missing required {key}"));
                }
            }
        }

        if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
            for (key, prop_schema) in props {
                if let Some(v) = obj.get(key) {
                    validate_value(prop_schema, v).map_err(|e| format!("property '{key}': {e}"))?;
                }
            }
        }
    }

    if let Some(items_schema) = schema.get("items") {
        if let Some(arr) = value.as_array() {
            for (i, item) in arr.iter().enumerate() {
                validate_value(items_schema, item).map_err(|e| format!("item {i}: {e}"))?;
            }
        }
    }

    Ok(())
}

fn check_type(ty: &str, value: &Value) -> Result<(), String> {
    let ok = match ty {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("expected type '{ty}', got {}", describe(value)))
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
