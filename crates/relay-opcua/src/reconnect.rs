// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Mid-task reconnection.
//!
//! Invoked when a task discovers that its connection failed mid-execution;
//! initial establishment never comes here. The loop is an explicit state
//! machine,
//!
//! ```text
//! Disconnected ──▶ Retrying ──▶ Reconnected
//!                      │
//!                      └──────▶ Aborted (cancel | shutdown | deadline)
//! ```
//!
//! driven by one event selection per iteration: the abort signals are
//! checked between attempts, never preemptively inside an in-flight
//! attempt, so an already-issued connect always runs to its own conclusion.
//! Failed attempts are reported and the loop keeps going until it succeeds
//! or one of the abort conditions fires.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use relay_core::{CancelToken, ShutdownSignal};

use crate::cache::ConnectionCache;
use crate::error::ConnectionError;
use crate::establish::establish;
use crate::request::TaskRequest;
use crate::transport::{Connection, Connector};

// =============================================================================
// ReconnectState
// =============================================================================

/// States of the reconnection machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectState {
    /// The broken connection has been detected and is being torn down.
    Disconnected,

    /// Establishment attempts are running on the retry interval.
    Retrying,

    /// A new connection is live; the cache and the held reference are
    /// updated.
    Reconnected,

    /// The loop exited without a connection.
    Aborted,
}

impl ReconnectState {
    /// Returns `true` for the two terminal states.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Reconnected | Self::Aborted)
    }
}

impl fmt::Display for ReconnectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Retrying => write!(f, "Retrying"),
            Self::Reconnected => write!(f, "Reconnected"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

// =============================================================================
// AbortReason
// =============================================================================

/// Why a reconnection loop aborted. These are expected control-flow exits,
/// not failures to log loudly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The owner's cancellation signal fired.
    Cancelled,

    /// The process-wide shutdown signal fired.
    Shutdown,

    /// The overall reconnection deadline elapsed.
    TimedOut,
}

impl AbortReason {
    /// Converts the abort into the connection error surfaced to the task.
    pub fn into_connection_error(self, endpoint: &str, deadline: Duration) -> ConnectionError {
        match self {
            Self::Cancelled => ConnectionError::cancelled(endpoint),
            Self::Shutdown => ConnectionError::Shutdown,
            Self::TimedOut => ConnectionError::timed_out(endpoint, deadline),
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::Shutdown => write!(f, "shutdown"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

// =============================================================================
// ReconnectOutcome
// =============================================================================

/// Terminal result of a reconnection loop.
pub enum ReconnectOutcome {
    /// Establishment succeeded; the new handle replaces the broken one.
    Reconnected(Arc<dyn Connection>),

    /// The loop exited without a connection.
    Aborted(AbortReason),
}

impl fmt::Debug for ReconnectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reconnected(_) => write!(f, "Reconnected"),
            Self::Aborted(reason) => write!(f, "Aborted({reason})"),
        }
    }
}

// =============================================================================
// Reconnection loop
// =============================================================================

/// Runs the reconnection loop for a request whose connection was lost.
///
/// Closes the broken handle, then attempts establishment on the request's
/// retry interval until it succeeds, the owner cancels, the process shuts
/// down, or the overall deadline (the request's connection timeout)
/// elapses — whichever happens first, checked between attempts.
pub async fn run(
    connector: Arc<dyn Connector>,
    request: &TaskRequest,
    cache: &ConnectionCache,
    broken: Arc<dyn Connection>,
    cancel: &mut CancelToken,
    shutdown: &ShutdownSignal,
) -> ReconnectOutcome {
    let endpoint = request.endpoint_url.as_str();
    let mut state = ReconnectState::Disconnected;

    warn!(endpoint, "connection lost, entering reconnection");
    broken.close().await;

    let mut shutdown_listener = shutdown.listener();

    let deadline = tokio::time::sleep(request.connection_timeout);
    tokio::pin!(deadline);

    let mut ticker = tokio::time::interval(request.retry_delay);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick completes immediately; consume it so attempts
    // start one retry delay after entry, like a plain ticker.
    ticker.tick().await;

    transition(&mut state, ReconnectState::Retrying, endpoint);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                transition(&mut state, ReconnectState::Aborted, endpoint);
                info!(endpoint, "reconnection cancelled by owner");
                return ReconnectOutcome::Aborted(AbortReason::Cancelled);
            }

            _ = shutdown_listener.wait() => {
                transition(&mut state, ReconnectState::Aborted, endpoint);
                info!(endpoint, "reconnection aborted by shutdown");
                return ReconnectOutcome::Aborted(AbortReason::Shutdown);
            }

            _ = &mut deadline => {
                transition(&mut state, ReconnectState::Aborted, endpoint);
                warn!(
                    endpoint,
                    timeout = ?request.connection_timeout,
                    "reconnection deadline elapsed"
                );
                return ReconnectOutcome::Aborted(AbortReason::TimedOut);
            }

            _ = ticker.tick() => {
                info!(endpoint, "attempting to reconnect");
                match establish(Arc::clone(&connector), request, cache, cancel).await {
                    Ok(connection) => {
                        transition(&mut state, ReconnectState::Reconnected, endpoint);
                        info!(endpoint, "reconnected");
                        return ReconnectOutcome::Reconnected(connection);
                    }
                    Err(ConnectionError::Cancelled { .. }) => {
                        transition(&mut state, ReconnectState::Aborted, endpoint);
                        info!(endpoint, "reconnection cancelled by owner");
                        return ReconnectOutcome::Aborted(AbortReason::Cancelled);
                    }
                    Err(err) => {
                        // Not fatal; the loop continues until an abort
                        // condition or success.
                        warn!(endpoint, error = %err, "reconnect attempt failed");
                    }
                }
            }
        }
    }
}

/// Applies and logs a state transition.
fn transition(state: &mut ReconnectState, next: ReconnectState, endpoint: &str) {
    if *state != next {
        debug!(endpoint, from = %state, to = %next, "reconnect state changed");
        *state = next;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states() {
        assert!(ReconnectState::Reconnected.is_terminal());
        assert!(ReconnectState::Aborted.is_terminal());
        assert!(!ReconnectState::Retrying.is_terminal());
        assert_eq!(ReconnectState::Retrying.to_string(), "Retrying");
    }

    #[test]
    fn test_abort_reason_mapping() {
        let deadline = Duration::from_secs(5);

        assert!(matches!(
            AbortReason::Cancelled.into_connection_error("opc.tcp://x", deadline),
            ConnectionError::Cancelled { .. }
        ));
        assert!(matches!(
            AbortReason::Shutdown.into_connection_error("opc.tcp://x", deadline),
            ConnectionError::Shutdown
        ));
        assert!(matches!(
            AbortReason::TimedOut.into_connection_error("opc.tcp://x", deadline),
            ConnectionError::Timeout { .. }
        ));
    }
}
