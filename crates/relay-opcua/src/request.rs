// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Task description validation and the strongly-typed request.
//!
//! A task arrives as parsed JSON with the shape
//!
//! ```json
//! {
//!   "description": {
//!     "connection": {"endpoint_url": "...", "security_policy": "...", ...},
//!     "config": {"namespace_index": 2, "read": [{"node_id": 5001}], ...}
//!   }
//! }
//! ```
//!
//! Validation runs before any cache or network access and fails fast on the
//! first missing field. Construction then converts the dynamic map into an
//! immutable [`TaskRequest`]; the dynamic representation never crosses this
//! boundary.

use std::time::Duration;

use serde_json::{Map, Value};

use relay_core::extract::{clamp_f64, extract_float_or, extract_int};

use crate::error::{OperationError, TaskError, ValidationError};
use crate::types::{AuthPolicy, SecurityMode, SecurityPolicy};

// =============================================================================
// Limits
// =============================================================================

/// Defaults and clamp limits for the request timing parameters.
///
/// Whatever a task description asks for, timing values are kept inside
/// these operationally safe ranges.
pub mod limits {
    /// Default response timeout in seconds.
    pub const DEFAULT_RESPONSE_TIMEOUT: f64 = 5.0;
    /// Default connection timeout in seconds.
    pub const DEFAULT_CONNECTION_TIMEOUT: f64 = 5.0;
    /// Default retry delay in milliseconds.
    pub const DEFAULT_RETRY_DELAY: f64 = 500.0;

    /// Minimum for both timeouts in seconds.
    pub const MIN_TIMEOUT: f64 = 0.1;
    /// Maximum response timeout in seconds.
    pub const MAX_RESPONSE_TIMEOUT: f64 = 600.0;
    /// Maximum connection timeout in seconds.
    pub const MAX_CONNECTION_TIMEOUT: f64 = 10.0;

    /// Minimum retry delay in milliseconds.
    pub const MIN_RETRY_DELAY: f64 = 100.0;
    /// Maximum retry delay in milliseconds.
    pub const MAX_RETRY_DELAY: f64 = 5000.0;
}

// =============================================================================
// Operation
// =============================================================================

/// Which batch a task executes. Exactly one drives execution per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Read the listed nodes.
    Read,

    /// Write the listed node/value pairs.
    Write,
}

impl Operation {
    /// Returns the lowercase name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Items
// =============================================================================

/// A single read operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadItem {
    /// Numeric node identifier, combined with the request's namespace index
    /// into the full node address.
    pub node_id: u32,
}

/// A single write operation.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteItem {
    /// Numeric node identifier.
    pub node_id: u32,

    /// Dynamic-typed value to write (string, bool or numeric).
    pub value: Value,
}

// =============================================================================
// TaskRequest
// =============================================================================

/// One task's validated execution parameters.
///
/// Constructed once per task invocation and immutable afterwards; the live
/// connection handle is managed separately so it can be replaced during
/// reconnection.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    /// Endpoint address; doubles as the connection cache key.
    pub endpoint_url: String,

    /// Requested security policy.
    pub security_policy: SecurityPolicy,

    /// Requested security mode.
    pub security_mode: SecurityMode,

    /// Authentication policy.
    pub auth_policy: AuthPolicy,

    /// Client certificate path, if any.
    pub cert_file: Option<String>,

    /// Client private key path, if any.
    pub key_file: Option<String>,

    /// Timeout for individual protocol calls.
    pub response_timeout: Duration,

    /// Timeout for connection establishment, and the overall deadline of a
    /// reconnection loop.
    pub connection_timeout: Duration,

    /// Interval between reconnection attempts.
    pub retry_delay: Duration,

    /// Namespace index combined with item node ids into node addresses.
    pub namespace_index: u16,

    /// Read items, in declaration order.
    pub read: Vec<ReadItem>,

    /// Write items, in declaration order.
    pub write: Vec<WriteItem>,
}

impl TaskRequest {
    /// Validates the raw task shape, returning the inner description map.
    ///
    /// Confirms the minimum required structure before any network or cache
    /// activity: a connection object with a non-empty endpoint, a config
    /// object with an extractable namespace index, and at least one
    /// operation list. Fails with the first missing field.
    pub fn validate(task: &Value) -> Result<&Map<String, Value>, ValidationError> {
        let description = task
            .get("description")
            .and_then(Value::as_object)
            .ok_or(ValidationError::MissingDescription)?;

        let connection = description
            .get("connection")
            .and_then(Value::as_object)
            .ok_or(ValidationError::MissingConnection)?;

        match connection.get("endpoint_url").and_then(Value::as_str) {
            Some(url) if !url.is_empty() => {}
            _ => return Err(ValidationError::MissingEndpoint),
        }

        let config = description
            .get("config")
            .and_then(Value::as_object)
            .ok_or(ValidationError::MissingConfig)?;

        extract_int(config, "namespace_index")
            .map_err(|_| ValidationError::InvalidNamespaceIndex)?;

        let has_read = config.get("read").map(Value::is_array).unwrap_or(false);
        let has_write = config.get("write").map(Value::is_array).unwrap_or(false);
        if !has_read && !has_write {
            return Err(ValidationError::NoOperations);
        }

        Ok(description)
    }

    /// Validates the task and builds the typed request.
    pub fn from_task(task: &Value) -> Result<Self, TaskError> {
        let description = Self::validate(task)?;

        // Presence is guaranteed by validation.
        let connection = description
            .get("connection")
            .and_then(Value::as_object)
            .ok_or(ValidationError::MissingConnection)?;
        let config = description
            .get("config")
            .and_then(Value::as_object)
            .ok_or(ValidationError::MissingConfig)?;

        let get_str = |field: &str| {
            connection
                .get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
        };

        let endpoint_url = get_str("endpoint_url").to_string();
        let security_policy = SecurityPolicy::parse_or_default(get_str("security_policy"));
        let security_mode = SecurityMode::parse_or_default(get_str("security_mode"));
        let auth_policy = AuthPolicy::parse_or_default(get_str("auth_policy"));

        let optional_path = |field: &str| {
            connection
                .get(field)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let response_timeout = clamp_f64(
            extract_float_or(connection, "response_timeout", limits::DEFAULT_RESPONSE_TIMEOUT),
            limits::MIN_TIMEOUT,
            limits::MAX_RESPONSE_TIMEOUT,
        );
        let connection_timeout = clamp_f64(
            extract_float_or(
                connection,
                "connection_timeout",
                limits::DEFAULT_CONNECTION_TIMEOUT,
            ),
            limits::MIN_TIMEOUT,
            limits::MAX_CONNECTION_TIMEOUT,
        );
        let retry_delay = clamp_f64(
            extract_float_or(connection, "delay", limits::DEFAULT_RETRY_DELAY),
            limits::MIN_RETRY_DELAY,
            limits::MAX_RETRY_DELAY,
        );

        let namespace_index = extract_int(config, "namespace_index")
            .ok()
            .and_then(|v| u16::try_from(v).ok())
            .ok_or(ValidationError::InvalidNamespaceIndex)?;

        let read = parse_items(config, "read", |map, _| {
            Ok(ReadItem {
                node_id: parse_node_id(map, "read")?,
            })
        })?;
        let write = parse_items(config, "write", |map, _| {
            let node_id = parse_node_id(map, "write")?;
            let value = map.get("value").cloned().ok_or_else(|| {
                OperationError::invalid_item("write", "missing 'value' field for write operation")
            })?;
            Ok(WriteItem { node_id, value })
        })?;

        Ok(Self {
            endpoint_url,
            security_policy,
            security_mode,
            auth_policy,
            cert_file: optional_path("cert_file"),
            key_file: optional_path("key_file"),
            response_timeout: Duration::from_secs_f64(response_timeout),
            connection_timeout: Duration::from_secs_f64(connection_timeout),
            retry_delay: Duration::from_millis(retry_delay as u64),
            namespace_index,
            read,
            write,
        })
    }

    /// Returns the operation driving this task: read takes precedence over
    /// write; `None` when both lists are empty (the task is invalid).
    pub fn operation(&self) -> Option<Operation> {
        if !self.read.is_empty() {
            Some(Operation::Read)
        } else if !self.write.is_empty() {
            Some(Operation::Write)
        } else {
            None
        }
    }
}

/// Parses one operation list from the config, tolerating its absence.
fn parse_items<T>(
    config: &Map<String, Value>,
    field: &'static str,
    mut parse: impl FnMut(&Map<String, Value>, usize) -> Result<T, OperationError>,
) -> Result<Vec<T>, TaskError> {
    let Some(items) = config.get(field).and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let map = item.as_object().ok_or_else(|| {
                OperationError::invalid_item(field, format!("item {idx} is not an object"))
            })?;
            parse(map, idx).map_err(TaskError::from)
        })
        .collect()
}

/// Extracts a non-negative node identifier from an item map.
fn parse_node_id(map: &Map<String, Value>, kind: &'static str) -> Result<u32, OperationError> {
    let raw = extract_int(map, "node_id").map_err(|e| {
        OperationError::invalid_item(kind, format!("invalid or missing 'node_id' field: {e}"))
    })?;
    u32::try_from(raw).map_err(|_| {
        OperationError::invalid_item(kind, format!("'node_id' must be non-negative, got {raw}"))
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_task() -> Value {
        json!({
            "description": {
                "connection": {"endpoint_url": "opc.tcp://127.0.0.1:4840"},
                "config": {"namespace_index": 2, "read": [{"node_id": 5001}]},
            }
        })
    }

    #[test]
    fn test_validate_happy_path() {
        assert!(TaskRequest::validate(&minimal_task()).is_ok());
    }

    #[test]
    fn test_validate_fails_on_first_missing_field() {
        let cases = [
            (json!({}), ValidationError::MissingDescription),
            (json!({"description": {}}), ValidationError::MissingConnection),
            (
                json!({"description": {"connection": {}}}),
                ValidationError::MissingEndpoint,
            ),
            (
                json!({"description": {"connection": {"endpoint_url": ""}}}),
                ValidationError::MissingEndpoint,
            ),
            (
                json!({"description": {"connection": {"endpoint_url": "opc.tcp://x"}}}),
                ValidationError::MissingConfig,
            ),
            (
                json!({"description": {
                    "connection": {"endpoint_url": "opc.tcp://x"},
                    "config": {},
                }}),
                ValidationError::InvalidNamespaceIndex,
            ),
            (
                json!({"description": {
                    "connection": {"endpoint_url": "opc.tcp://x"},
                    "config": {"namespace_index": 2},
                }}),
                ValidationError::NoOperations,
            ),
        ];

        for (task, expected) in cases {
            assert_eq!(TaskRequest::validate(&task).unwrap_err(), expected);
        }
    }

    #[test]
    fn test_from_task_defaults_and_clamping() {
        let request = TaskRequest::from_task(&minimal_task()).unwrap();

        assert_eq!(request.endpoint_url, "opc.tcp://127.0.0.1:4840");
        assert_eq!(request.security_policy, SecurityPolicy::None);
        assert_eq!(request.security_mode, SecurityMode::None);
        assert_eq!(request.auth_policy, AuthPolicy::Anonymous);
        assert_eq!(request.response_timeout, Duration::from_secs_f64(5.0));
        assert_eq!(request.connection_timeout, Duration::from_secs_f64(5.0));
        assert_eq!(request.retry_delay, Duration::from_millis(500));
        assert_eq!(request.namespace_index, 2);
        assert_eq!(request.read, vec![ReadItem { node_id: 5001 }]);
    }

    #[test]
    fn test_from_task_clamps_out_of_range_timings() {
        let task = json!({
            "description": {
                "connection": {
                    "endpoint_url": "opc.tcp://x",
                    "response_timeout": 10000.0,
                    "connection_timeout": 0.001,
                    "delay": 60000,
                },
                "config": {"namespace_index": 2, "read": [{"node_id": 1}]},
            }
        });

        let request = TaskRequest::from_task(&task).unwrap();
        assert_eq!(request.response_timeout, Duration::from_secs_f64(600.0));
        assert_eq!(request.connection_timeout, Duration::from_secs_f64(0.1));
        assert_eq!(request.retry_delay, Duration::from_millis(5000));
    }

    #[test]
    fn test_from_task_accepts_string_encoded_numbers() {
        let task = json!({
            "description": {
                "connection": {
                    "endpoint_url": "opc.tcp://x",
                    "response_timeout": "2.5",
                },
                "config": {"namespace_index": "3", "read": [{"node_id": "7"}]},
            }
        });

        let request = TaskRequest::from_task(&task).unwrap();
        assert_eq!(request.response_timeout, Duration::from_secs_f64(2.5));
        assert_eq!(request.namespace_index, 3);
        assert_eq!(request.read[0].node_id, 7);
    }

    #[test]
    fn test_read_takes_precedence_over_write() {
        let task = json!({
            "description": {
                "connection": {"endpoint_url": "opc.tcp://x"},
                "config": {
                    "namespace_index": 2,
                    "read": [{"node_id": 1}],
                    "write": [{"node_id": 2, "value": "x"}],
                },
            }
        });

        let request = TaskRequest::from_task(&task).unwrap();
        assert_eq!(request.operation(), Some(Operation::Read));
    }

    #[test]
    fn test_empty_lists_yield_no_operation() {
        let task = json!({
            "description": {
                "connection": {"endpoint_url": "opc.tcp://x"},
                "config": {"namespace_index": 2, "read": [], "write": []},
            }
        });

        let request = TaskRequest::from_task(&task).unwrap();
        assert_eq!(request.operation(), None);
    }

    #[test]
    fn test_negative_node_id_rejected() {
        let task = json!({
            "description": {
                "connection": {"endpoint_url": "opc.tcp://x"},
                "config": {"namespace_index": 2, "read": [{"node_id": -5}]},
            }
        });

        let err = TaskRequest::from_task(&task).unwrap_err();
        assert!(matches!(
            err,
            TaskError::Operation(OperationError::InvalidItem { .. })
        ));
    }

    #[test]
    fn test_write_item_requires_value() {
        let task = json!({
            "description": {
                "connection": {"endpoint_url": "opc.tcp://x"},
                "config": {"namespace_index": 2, "write": [{"node_id": 5}]},
            }
        });

        let err = TaskRequest::from_task(&task).unwrap_err();
        assert!(err.to_string().contains("value"));
    }

    #[test]
    fn test_security_settings_parsed() {
        let task = json!({
            "description": {
                "connection": {
                    "endpoint_url": "opc.tcp://x",
                    "security_policy": "Basic256Sha256",
                    "security_mode": "SignAndEncrypt",
                    "auth_policy": "Certificate",
                    "cert_file": "client.pem",
                    "key_file": "client.key",
                },
                "config": {"namespace_index": 2, "read": [{"node_id": 1}]},
            }
        });

        let request = TaskRequest::from_task(&task).unwrap();
        assert_eq!(request.security_policy, SecurityPolicy::Basic256Sha256);
        assert_eq!(request.security_mode, SecurityMode::SignAndEncrypt);
        assert_eq!(request.auth_policy, AuthPolicy::Certificate);
        assert_eq!(request.cert_file.as_deref(), Some("client.pem"));
        assert_eq!(request.key_file.as_deref(), Some("client.key"));
    }
}
