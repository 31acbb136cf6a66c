// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection establishment.
//!
//! Establishment resolves the target's endpoints, selects the descriptor
//! matching the requested security settings, and opens the connection while
//! racing three signals: the owner's cancellation, completion of the
//! connect call, and the connection-timeout deadline. Exactly one branch
//! wins; the losing paths are cleaned up on every exit (the in-flight
//! connect task is aborted and a connection that completed anyway is
//! closed), so no task or half-open session leaks.
//!
//! The connect call runs on its own task so the caller keeps observing
//! cancellation and the deadline while the network operation is in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use relay_core::CancelToken;

use crate::cache::ConnectionCache;
use crate::error::ConnectionError;
use crate::request::TaskRequest;
use crate::transport::{select_endpoint, Connection, Connector};
use crate::types::ConnectOptions;

/// Establishes a connection for the request and caches it by endpoint.
///
/// On success the new entry replaces any stale entry for the same endpoint.
/// Initial-acquisition failures are terminal for the task; retrying is the
/// reconnection loop's job and only applies mid-task.
///
/// # Errors
///
/// - [`ConnectionError::Discovery`] / [`ConnectionError::NoMatchingEndpoint`]
///   when endpoint resolution fails
/// - [`ConnectionError::Cancelled`] when the owner's signal wins the race
/// - [`ConnectionError::Timeout`] when the deadline wins
/// - [`ConnectionError::Connect`] when the connect call itself fails
pub async fn establish(
    connector: Arc<dyn Connector>,
    request: &TaskRequest,
    cache: &ConnectionCache,
    cancel: &mut CancelToken,
) -> Result<Arc<dyn Connection>, ConnectionError> {
    let endpoint = request.endpoint_url.as_str();

    let descriptors = connector
        .discover_endpoints(endpoint, request.connection_timeout)
        .await?;
    debug!(endpoint, count = descriptors.len(), "endpoints discovered");

    let descriptor = select_endpoint(&descriptors, request.security_policy, request.security_mode)?;

    let options = ConnectOptions {
        security_policy: request.security_policy,
        security_mode: request.security_mode,
        security_policy_uri: descriptor.security_policy_uri.clone(),
        auth_policy: request.auth_policy,
        certificate_file: request.cert_file.clone(),
        private_key_file: request.key_file.clone(),
        response_timeout: request.response_timeout,
    };

    // Independent unit of work: the caller must stay free to observe
    // cancellation and the deadline while the connect call blocks.
    let mut connect_task: JoinHandle<Result<Arc<dyn Connection>, ConnectionError>> = {
        let connector = Arc::clone(&connector);
        let url = request.endpoint_url.clone();
        let timeout = request.connection_timeout;
        tokio::spawn(async move { connector.connect(&url, options, timeout).await })
    };

    let deadline = tokio::time::sleep(request.connection_timeout);
    tokio::pin!(deadline);

    let connection = tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            warn!(endpoint, "connection attempt cancelled by owner");
            abandon(connect_task).await;
            return Err(ConnectionError::cancelled(endpoint));
        }

        joined = &mut connect_task => match joined {
            Ok(Ok(connection)) => connection,
            Ok(Err(err)) => return Err(err),
            Err(join_err) => {
                return Err(ConnectionError::connect(
                    endpoint,
                    format!("connect task failed: {join_err}"),
                ));
            }
        },

        _ = &mut deadline => {
            warn!(endpoint, timeout = ?request.connection_timeout, "connection attempt timed out");
            abandon(connect_task).await;
            return Err(ConnectionError::timed_out(endpoint, request.connection_timeout));
        }
    };

    cache.insert(endpoint, Arc::clone(&connection));
    info!(endpoint, "connection established");

    Ok(connection)
}

/// Cleans up the losing connect branch: aborts the task and closes the
/// partial connection when the connect had already completed.
async fn abandon(task: JoinHandle<Result<Arc<dyn Connection>, ConnectionError>>) {
    task.abort();
    if let Ok(Ok(connection)) = task.await {
        connection.close().await;
    }
}
