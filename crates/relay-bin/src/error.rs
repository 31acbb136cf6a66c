// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the Relay binary.

use thiserror::Error;

/// Result type alias for relay-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that can occur in the Relay binary.
#[derive(Debug, Error)]
pub enum BinError {
    /// I/O error reading a task file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Task file is not valid JSON.
    #[error("invalid task file: {0}")]
    Parse(#[from] serde_json::Error),

    /// Task description failed validation or construction.
    #[error("invalid task: {0}")]
    Task(#[from] relay_opcua::TaskError),

    /// One or more tasks reported failure.
    #[error("task failed: {0}")]
    TaskFailed(String),
}
