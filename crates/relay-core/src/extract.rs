// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Typed scalar extraction from untyped task maps.
//!
//! Task descriptions arrive as parsed JSON with no schema attached. The
//! helpers here pull typed values out of those maps before anything touches
//! the network, in two deliberate modes:
//!
//! - **Strict** ([`extract_int`]): a missing or unconvertible field is an
//!   error. Used for fields without a sensible default, like the namespace
//!   index or a node identifier.
//! - **Lenient** ([`extract_float_or`]): absence or a bad representation
//!   silently yields the caller-supplied default. Used for timing knobs
//!   where an operational default always exists.
//!
//! Extracted timing values are kept inside operationally safe limits with
//! [`clamp_f64`] regardless of what the task description requests.

use serde_json::{Map, Value};

use crate::error::ExtractError;

/// Extracts an integer field from a JSON map.
///
/// Accepts a native integer, a float that encodes an integer (the common
/// case for JSON-decoded numbers), or a numeric string. Anything else is an
/// [`ExtractError::InvalidType`]; an absent field is
/// [`ExtractError::Missing`].
///
/// # Examples
///
/// ```
/// use relay_core::extract::extract_int;
/// use serde_json::json;
///
/// let map = json!({"a": 5, "b": 5.0, "c": "5"});
/// let map = map.as_object().unwrap();
///
/// assert_eq!(extract_int(map, "a").unwrap(), 5);
/// assert_eq!(extract_int(map, "b").unwrap(), 5);
/// assert_eq!(extract_int(map, "c").unwrap(), 5);
/// assert!(extract_int(map, "d").is_err());
/// ```
pub fn extract_int(map: &Map<String, Value>, field: &str) -> Result<i64, ExtractError> {
    let raw = map.get(field).ok_or_else(|| ExtractError::missing(field))?;

    match raw {
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Ok(v)
            } else if let Some(v) = n.as_f64() {
                // JSON decoders commonly hand back float-encoded integers.
                Ok(v as i64)
            } else {
                Err(ExtractError::invalid_type(field, format!("number {n}")))
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| ExtractError::invalid_type(field, format!("string '{s}': {e}"))),
        other => Err(ExtractError::invalid_type(field, type_name(other).to_string())),
    }
}

/// Extracts a float field from a JSON map, falling back to a default.
///
/// Accepts a number or a numeric string. On absence or parse failure the
/// default is returned and no error is propagated; callers that need hard
/// failures use [`extract_int`] instead.
///
/// # Examples
///
/// ```
/// use relay_core::extract::extract_float_or;
/// use serde_json::json;
///
/// let map = json!({"t": "2.5", "bad": true});
/// let map = map.as_object().unwrap();
///
/// assert_eq!(extract_float_or(map, "t", 5.0), 2.5);
/// assert_eq!(extract_float_or(map, "bad", 5.0), 5.0);
/// assert_eq!(extract_float_or(map, "absent", 5.0), 5.0);
/// ```
pub fn extract_float_or(map: &Map<String, Value>, field: &str, default: f64) -> f64 {
    match map.get(field) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(default),
        _ => default,
    }
}

/// Clamps a value to an inclusive `[min, max]` range.
///
/// Returns the value unchanged when inside the range, otherwise the nearest
/// bound.
#[inline]
pub fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Returns a short name for a JSON value's type, for error messages.
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Tests
// =============================================================================
