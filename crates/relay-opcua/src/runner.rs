// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The task-dispatch boundary.
//!
//! [`TaskRunner`] composes the validator, the connection cache, the
//! establisher, and the executor into the single entry point callers use:
//! hand in a raw task description and a task-owner identity, get back a
//! `(success, report)` pair. No error value ever escapes uncaught, and the
//! runner owns all shared state explicitly — cache, cancellation registry
//! and shutdown signal are injected at construction, built once at the
//! process composition point.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use relay_core::{CancellationRegistry, ShutdownSignal, TaskReport};

use crate::cache::ConnectionCache;
use crate::establish::establish;
use crate::executor;
use crate::request::{Operation, TaskRequest};
use crate::transport::Connector;

/// Message returned when connection acquisition fails.
const MSG_CONNECT_FAILED: &str = "Unable to establish a connection to OPC UA server";

/// Message returned when a task lists no executable operation.
const MSG_NO_OPERATIONS: &str = "No OPC UA read or write operations specified";

/// Executes task descriptions against remote OPC UA devices.
pub struct TaskRunner {
    connector: Arc<dyn Connector>,
    cache: Arc<ConnectionCache>,
    cancellations: Arc<CancellationRegistry>,
    shutdown: ShutdownSignal,
}

impl TaskRunner {
    /// Creates a runner over the given transport and shared state.
    pub fn new(
        connector: Arc<dyn Connector>,
        cache: Arc<ConnectionCache>,
        cancellations: Arc<CancellationRegistry>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            connector,
            cache,
            cancellations,
            shutdown,
        }
    }

    /// Returns the connection cache.
    pub fn cache(&self) -> &ConnectionCache {
        &self.cache
    }

    /// Returns the cancellation registry.
    pub fn cancellations(&self) -> &CancellationRegistry {
        &self.cancellations
    }

    /// Processes one task on behalf of `owner`.
    ///
    /// Control flow: validate and type the description, consult the
    /// connection cache (a miss or stale entry triggers establishment),
    /// execute the read or write batch, and wrap the outcome in a
    /// structured report.
    pub async fn process(&self, task: &Value, owner: &str) -> (bool, TaskReport) {
        info!(owner, "processing OPC UA task");

        let request = match TaskRequest::from_task(task) {
            Ok(request) => request,
            Err(err) => {
                error!(owner, error = %err, "task rejected");
                return (false, TaskReport::failure(err.to_string()));
            }
        };

        let Some(operation) = request.operation() else {
            return (false, TaskReport::invalid(MSG_NO_OPERATIONS));
        };

        info!(
            owner,
            endpoint = %request.endpoint_url,
            delay_ms = request.retry_delay.as_millis() as u64,
            connection_timeout_s = request.connection_timeout.as_secs_f64(),
            response_timeout_s = request.response_timeout.as_secs_f64(),
            "task configured"
        );

        let mut cancel = self.cancellations.token(owner);

        let connection = match self.cache.get(&request.endpoint_url) {
            Some(connection) => connection,
            None => {
                match establish(
                    Arc::clone(&self.connector),
                    &request,
                    &self.cache,
                    &mut cancel,
                )
                .await
                {
                    Ok(connection) => connection,
                    Err(err) => {
                        error!(owner, endpoint = %request.endpoint_url, error = %err, "unable to get OPC UA connection");
                        return (false, TaskReport::failure(MSG_CONNECT_FAILED));
                    }
                }
            }
        };

        let outcome = executor::execute(
            Arc::clone(&self.connector),
            &self.cache,
            &self.shutdown,
            &request,
            operation,
            connection,
            &mut cancel,
        )
        .await;

        match outcome {
            Ok(results) => {
                let message = match operation {
                    Operation::Read => "OPC UA read operation successful",
                    Operation::Write => "OPC UA write operation successful",
                };
                (true, TaskReport::success(message, results))
            }
            Err(err) => {
                if err.is_expected_exit() {
                    info!(owner, endpoint = %request.endpoint_url, reason = %err, "task aborted");
                } else {
                    error!(owner, endpoint = %request.endpoint_url, error = %err, "task failed");
                }
                let message = match operation {
                    Operation::Read => "Error reading data from OPC UA",
                    Operation::Write => "Error writing data from OPC UA",
                };
                (false, TaskReport::failure(message))
            }
        }
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("cache", &self.cache)
            .finish()
    }
}
