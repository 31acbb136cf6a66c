// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Batch execution of a task's read or write items.
//!
//! Items run strictly in declaration order with no speculative parallel
//! dispatch; the first failure aborts the whole batch and earlier partial
//! results are discarded — callers never see partial success. A non-OK
//! write status from the protocol layer is treated identically to a
//! transport error.
//!
//! When an operation fails and the connection reports itself disconnected,
//! control passes to the reconnection loop; on success the failing item is
//! retried once over the new handle and the batch continues.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use relay_core::{CancelToken, ItemResult, ShutdownSignal};

use crate::cache::ConnectionCache;
use crate::error::{OperationError, TaskError};
use crate::reconnect::{self, ReconnectOutcome};
use crate::request::{Operation, TaskRequest};
use crate::transport::{Connection, Connector};
use crate::types::{AttrValue, NodeId};

/// Executes the request's active item list over a live connection.
///
/// Returns the ordered per-item results, one-to-one with the input items.
///
/// # Errors
///
/// The first failing item aborts the batch with the corresponding
/// [`OperationError`]; a lost connection that cannot be re-established
/// surfaces as a [`crate::error::ConnectionError`].
pub async fn execute(
    connector: Arc<dyn Connector>,
    cache: &ConnectionCache,
    shutdown: &ShutdownSignal,
    request: &TaskRequest,
    operation: Operation,
    connection: Arc<dyn Connection>,
    cancel: &mut CancelToken,
) -> Result<Vec<ItemResult>, TaskError> {
    let mut conn = connection;
    let mut results = Vec::new();

    match operation {
        Operation::Read => {
            for item in &request.read {
                let node = NodeId::numeric(request.namespace_index, item.node_id);
                let value = run_item(
                    &connector, cache, shutdown, request, &mut conn, cancel, &node,
                    |conn, node, timeout| read_once(conn, node, timeout),
                )
                .await?;
                results.push(ItemResult::new(value));
            }
        }
        Operation::Write => {
            for item in &request.write {
                let node = NodeId::numeric(request.namespace_index, item.node_id);
                let attr_value = AttrValue::from_json(&item.value).ok_or_else(|| {
                    OperationError::invalid_item(
                        "write",
                        format!(
                            "unsupported value type for node '{node}': {}",
                            type_of(&item.value)
                        ),
                    )
                })?;
                let value = run_item(
                    &connector, cache, shutdown, request, &mut conn, cancel, &node,
                    move |conn, node, timeout| write_once(conn, node, attr_value.clone(), timeout),
                )
                .await?;
                results.push(ItemResult::new(value));
            }
        }
    }

    debug!(
        endpoint = %request.endpoint_url,
        operation = %operation,
        items = results.len(),
        "batch completed"
    );

    Ok(results)
}

/// Runs one item, detouring through the reconnection loop when the
/// connection is lost underneath it.
#[allow(clippy::too_many_arguments)]
async fn run_item<F, Fut>(
    connector: &Arc<dyn Connector>,
    cache: &ConnectionCache,
    shutdown: &ShutdownSignal,
    request: &TaskRequest,
    conn: &mut Arc<dyn Connection>,
    cancel: &mut CancelToken,
    node: &NodeId,
    mut op: F,
) -> Result<Value, TaskError>
where
    F: FnMut(Arc<dyn Connection>, NodeId, Duration) -> Fut,
    Fut: std::future::Future<Output = Result<Value, OperationError>>,
{
    let mut outcome = op(Arc::clone(conn), *node, request.response_timeout).await;

    if outcome.is_err() && !conn.is_connected() {
        warn!(
            endpoint = %request.endpoint_url,
            node = %node,
            "operation failed on a lost connection"
        );

        match reconnect::run(
            Arc::clone(connector),
            request,
            cache,
            Arc::clone(conn),
            cancel,
            shutdown,
        )
        .await
        {
            ReconnectOutcome::Reconnected(fresh) => {
                *conn = fresh;
                outcome = op(Arc::clone(conn), *node, request.response_timeout).await;
            }
            ReconnectOutcome::Aborted(reason) => {
                return Err(reason
                    .into_connection_error(&request.endpoint_url, request.connection_timeout)
                    .into());
            }
        }
    }

    outcome.map_err(TaskError::from)
}

/// Issues one bounded-timeout read.
async fn read_once(
    conn: Arc<dyn Connection>,
    node: NodeId,
    timeout: Duration,
) -> Result<Value, OperationError> {
    match tokio::time::timeout(timeout, conn.read_attribute(&node, timeout)).await {
        Ok(Ok(reading)) => Ok(reading.value.to_json()),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(OperationError::timed_out(node.to_string(), timeout)),
    }
}

/// Issues one bounded-timeout write and checks the protocol status.
async fn write_once(
    conn: Arc<dyn Connection>,
    node: NodeId,
    value: AttrValue,
    timeout: Duration,
) -> Result<Value, OperationError> {
    match tokio::time::timeout(timeout, conn.write_attribute(&node, value, timeout)).await {
        Ok(Ok(status)) if status.is_good() => Ok(Value::from("OK")),
        Ok(Ok(status)) => Err(OperationError::bad_status(node.to_string(), status.code)),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(OperationError::timed_out(node.to_string(), timeout)),
    }
}

/// Returns a short type name for diagnostics.
fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
