// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for OPC UA task execution.
//!
//! # Error Hierarchy
//!
//! ```text
//! TaskError
//! ├── Validation  - Task description shape problems
//! ├── Extract     - Typed field extraction failures
//! ├── Connection  - Discovery, selection, establishment, timeout, cancel
//! └── Operation   - Read/write failures and bad protocol status
//! ```
//!
//! Validation and extraction errors are terminal for a task. Connection
//! errors during initial acquisition are terminal too; mid-task connection
//! loss is handled by the reconnection loop instead. Cancellation and
//! shutdown are expected control-flow exits, not loud failures.

use std::time::Duration;

use thiserror::Error;

/// Result alias for task execution.
pub type TaskResult<T> = Result<T, TaskError>;

// =============================================================================
// TaskError - Root Error Type
// =============================================================================

/// The root error type for task processing.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task description failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Typed field extraction failed.
    #[error("{0}")]
    Extract(#[from] relay_core::ExtractError),

    /// Connection lifecycle failure.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Read/write operation failure.
    #[error("{0}")]
    Operation(#[from] OperationError),
}

impl TaskError {
    /// Returns `true` if a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::Extract(_) => false,
            Self::Connection(e) => e.is_retryable(),
            Self::Operation(e) => e.is_retryable(),
        }
    }

    /// Returns the error category for logging and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Extract(_) => "extract",
            Self::Connection(_) => "connection",
            Self::Operation(_) => "operation",
        }
    }

    /// Returns `true` when the error is an expected control-flow exit
    /// (cancellation or shutdown) rather than a failure to report loudly.
    pub fn is_expected_exit(&self) -> bool {
        matches!(
            self,
            Self::Connection(ConnectionError::Cancelled { .. })
                | Self::Connection(ConnectionError::Shutdown)
        )
    }
}

// =============================================================================
// ValidationError
// =============================================================================

/// Task description shape errors, raised before any cache or network
/// access. Each variant names the first missing or invalid field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The task has no usable `description` object.
    #[error("missing or invalid 'description' in task")]
    MissingDescription,

    /// The description has no `connection` object.
    #[error("missing or invalid 'connection' in description")]
    MissingConnection,

    /// The connection has no endpoint URL string.
    #[error("missing or invalid 'endpoint_url' in 'connection'")]
    MissingEndpoint,

    /// The description has no `config` object.
    #[error("missing or invalid 'config' in description")]
    MissingConfig,

    /// The config has no extractable namespace index.
    #[error("missing or invalid 'namespace_index' in 'config'")]
    InvalidNamespaceIndex,

    /// Neither a read nor a write list is present.
    #[error("missing or invalid 'read' or 'write' in 'config'")]
    NoOperations,
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Connection lifecycle errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Endpoint discovery failed.
    #[error("failed to get endpoints for '{endpoint}': {message}")]
    Discovery {
        /// Target endpoint URL.
        endpoint: String,
        /// Underlying failure description.
        message: String,
    },

    /// No discovered endpoint matches the requested security settings.
    #[error("no endpoint matches security policy '{policy}' with mode '{mode}'")]
    NoMatchingEndpoint {
        /// Requested security policy.
        policy: String,
        /// Requested security mode.
        mode: String,
    },

    /// The connect operation failed.
    #[error("unable to connect to '{endpoint}': {message}")]
    Connect {
        /// Target endpoint URL.
        endpoint: String,
        /// Underlying failure description.
        message: String,
    },

    /// The connect operation exceeded its deadline.
    #[error("connection to '{endpoint}' timed out after {timeout:?}")]
    Timeout {
        /// Target endpoint URL.
        endpoint: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The owner's cancellation signal fired during establishment.
    #[error("connection to '{endpoint}' cancelled")]
    Cancelled {
        /// Target endpoint URL.
        endpoint: String,
    },

    /// The process-wide shutdown signal fired.
    #[error("connection attempt aborted by shutdown")]
    Shutdown,

    /// An operation was attempted without a live connection.
    #[error("not connected to OPC UA server")]
    NotConnected,
}

impl ConnectionError {
    /// Creates a discovery error.
    pub fn discovery(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Discovery {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a no-matching-endpoint error.
    pub fn no_matching_endpoint(policy: impl Into<String>, mode: impl Into<String>) -> Self {
        Self::NoMatchingEndpoint {
            policy: policy.into(),
            mode: mode.into(),
        }
    }

    /// Creates a connect error.
    pub fn connect(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timed_out(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(endpoint: impl Into<String>) -> Self {
        Self::Cancelled {
            endpoint: endpoint.into(),
        }
    }

    /// Returns `true` if a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Discovery { .. }
            | Self::Connect { .. }
            | Self::Timeout { .. }
            | Self::NotConnected => true,
            Self::NoMatchingEndpoint { .. } | Self::Cancelled { .. } | Self::Shutdown => false,
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Read/write operation errors, always naming the failing node.
#[derive(Debug, Error)]
pub enum OperationError {
    /// A read failed at the transport level.
    #[error("failed to read value for node '{node}': {message}")]
    ReadFailed {
        /// The failing node address.
        node: String,
        /// Underlying failure description.
        message: String,
    },

    /// A write failed at the transport level.
    #[error("failed to write value to node '{node}': {message}")]
    WriteFailed {
        /// The failing node address.
        node: String,
        /// Underlying failure description.
        message: String,
    },

    /// The protocol layer returned a non-OK write status. Treated
    /// identically to a transport error.
    #[error("bad status 0x{code:08X} for node '{node}'")]
    BadStatus {
        /// The failing node address.
        node: String,
        /// The protocol status code.
        code: u32,
    },

    /// The operation exceeded its response timeout.
    #[error("operation on node '{node}' timed out after {timeout:?}")]
    TimedOut {
        /// The failing node address.
        node: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// A read/write item in the task description is malformed.
    #[error("invalid {kind} item: {message}")]
    InvalidItem {
        /// Which list the item came from (`read` or `write`).
        kind: String,
        /// What is wrong with it.
        message: String,
    },
}

impl OperationError {
    /// Creates a read failure.
    pub fn read_failed(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Creates a write failure.
    pub fn write_failed(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Creates a bad-status failure.
    pub fn bad_status(node: impl Into<String>, code: u32) -> Self {
        Self::BadStatus {
            node: node.into(),
            code,
        }
    }

    /// Creates a timeout failure.
    pub fn timed_out(node: impl Into<String>, timeout: Duration) -> Self {
        Self::TimedOut {
            node: node.into(),
            timeout,
        }
    }

    /// Creates an invalid-item failure.
    pub fn invalid_item(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidItem {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ReadFailed { .. } | Self::WriteFailed { .. } | Self::TimedOut { .. } => true,
            Self::BadStatus { .. } | Self::InvalidItem { .. } => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(ConnectionError::connect("opc.tcp://x", "refused").is_retryable());
        assert!(ConnectionError::timed_out("opc.tcp://x", Duration::from_secs(5)).is_retryable());
        assert!(!ConnectionError::cancelled("opc.tcp://x").is_retryable());
        assert!(!ConnectionError::no_matching_endpoint("Basic256Sha256", "Sign").is_retryable());

        assert!(OperationError::read_failed("ns=2;i=1", "reset").is_retryable());
        assert!(!OperationError::bad_status("ns=2;i=1", 0x8000_0000).is_retryable());

        let task_err: TaskError = ValidationError::MissingEndpoint.into();
        assert!(!task_err.is_retryable());
        assert_eq!(task_err.category(), "validation");
    }

    #[test]
    fn test_expected_exits() {
        let cancelled: TaskError = ConnectionError::cancelled("opc.tcp://x").into();
        assert!(cancelled.is_expected_exit());

        let shutdown: TaskError = ConnectionError::Shutdown.into();
        assert!(shutdown.is_expected_exit());

        let refused: TaskError = ConnectionError::connect("opc.tcp://x", "refused").into();
        assert!(!refused.is_expected_exit());
    }

    #[test]
    fn test_validation_messages_name_fields() {
        assert!(ValidationError::MissingEndpoint.to_string().contains("endpoint_url"));
        assert!(ValidationError::InvalidNamespaceIndex
            .to_string()
            .contains("namespace_index"));
    }
}
