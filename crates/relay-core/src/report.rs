// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Structured task outcome reporting.
//!
//! Every task invocation returns a `(success, report)` pair at the dispatch
//! boundary; no error value ever escapes uncaught. The report serializes to
//! the wire shape consumed by callers:
//!
//! ```json
//! {"status": true, "message": "...", "results": [{"data": {"value": 42}, "status": true}]}
//! {"status": false, "operation": "TASK_FAILURE", "message": "..."}
//! ```

use serde::Serialize;
use serde_json::Value;

// =============================================================================
// TaskDisposition
// =============================================================================

/// Discriminator attached to failed task reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskDisposition {
    /// The task was well-formed but could not be carried out.
    TaskFailure,

    /// The task description itself named no executable operation.
    TaskInvalid,
}

// =============================================================================
// ItemResult
// =============================================================================

/// Payload of a single successful operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemData {
    /// The value read, or the write confirmation.
    pub value: Value,
}

/// Result of one read or write item, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemResult {
    /// The operation payload.
    pub data: ItemData,

    /// Per-item status flag. Always `true`: a failed item aborts the whole
    /// batch instead of producing a result entry.
    pub status: bool,
}

impl ItemResult {
    /// Creates a successful item result carrying `value`.
    pub fn new(value: Value) -> Self {
        Self {
            data: ItemData { value },
            status: true,
        }
    }
}

// =============================================================================
// TaskReport
// =============================================================================

/// The structured outcome of one task invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    /// Overall task status.
    pub status: bool,

    /// Failure discriminator; absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<TaskDisposition>,

    /// Human-readable outcome message.
    pub message: String,

    /// Ordered per-item results, one-to-one with the input items; absent on
    /// failure (no partial-success reporting).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ItemResult>>,
}

impl TaskReport {
    /// Creates a successful report with per-item results.
    pub fn success(message: impl Into<String>, results: Vec<ItemResult>) -> Self {
        Self {
            status: true,
            operation: None,
            message: message.into(),
            results: Some(results),
        }
    }

    /// Creates a failed report.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            operation: Some(TaskDisposition::TaskFailure),
            message: message.into(),
            results: None,
        }
    }

    /// Creates a report for a task that named no executable operation.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: false,
            operation: Some(TaskDisposition::TaskInvalid),
            message: message.into(),
            results: None,
        }
    }

    /// Serializes the report to a JSON value.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let report = TaskReport::success(
            "OPC UA read operation successful",
            vec![ItemResult::new(json!(42))],
        );

        assert_eq!(
            report.to_json(),
            json!({
                "status": true,
                "message": "OPC UA read operation successful",
                "results": [{"data": {"value": 42}, "status": true}],
            })
        );
    }

    #[test]
    fn test_failure_shape() {
        let report = TaskReport::failure("Unable to establish a connection to OPC UA server");

        assert_eq!(
            report.to_json(),
            json!({
                "status": false,
                "operation": "TASK_FAILURE",
                "message": "Unable to establish a connection to OPC UA server",
            })
        );
    }

    #[test]
    fn test_invalid_shape() {
        let report = TaskReport::invalid("No OPC UA read or write operations specified");
        assert_eq!(report.to_json()["operation"], json!("TASK_INVALID"));
        assert_eq!(report.to_json().get("results"), None);
    }
}
