// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport abstraction over the wire-level OPC UA client library.
//!
//! The task core never touches the binary protocol; it consumes the
//! primitives declared here. [`Connector`] covers discovery and connection
//! establishment, [`Connection`] covers attribute operations on a live
//! session. Production code plugs in the real client library behind the
//! `real-transport` feature; tests plug in mocks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{ConnectionError, OperationError};
use crate::types::{AttrValue, ConnectOptions, EndpointDescriptor, NodeId, SecurityMode, SecurityPolicy};

// =============================================================================
// AttrReading
// =============================================================================

/// Result of one attribute read.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrReading {
    /// The value read.
    pub value: AttrValue,

    /// Server timestamp, when the backend provides one.
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl AttrReading {
    /// Creates a reading with the current server timestamp.
    pub fn now(value: AttrValue) -> Self {
        Self {
            value,
            server_timestamp: Some(Utc::now()),
        }
    }

    /// Creates a reading without a timestamp.
    pub fn untimed(value: AttrValue) -> Self {
        Self {
            value,
            server_timestamp: None,
        }
    }
}

// =============================================================================
// WriteStatus
// =============================================================================

/// Protocol status returned by an attribute write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStatus {
    /// Raw protocol status code; the high bit marks a bad status.
    pub code: u32,
}

impl WriteStatus {
    /// The Good status code.
    pub const GOOD: u32 = 0;

    /// Creates a good status.
    #[inline]
    pub const fn good() -> Self {
        Self { code: Self::GOOD }
    }

    /// Creates a status from a raw code.
    #[inline]
    pub const fn from_code(code: u32) -> Self {
        Self { code }
    }

    /// Returns `true` when the write succeeded.
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.code & 0x8000_0000 == 0
    }
}

// =============================================================================
// Connector
// =============================================================================

/// Discovery and connection establishment primitives.
///
/// Implementations must be `Send + Sync`; the establisher runs the connect
/// call on its own task so it can race cancellation and the deadline.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Discovers the endpoints offered by the server at `endpoint_url`.
    ///
    /// The network call must be bounded by `timeout`.
    async fn discover_endpoints(
        &self,
        endpoint_url: &str,
        timeout: Duration,
    ) -> Result<Vec<EndpointDescriptor>, ConnectionError>;

    /// Opens a connection to `endpoint_url` using the given options.
    ///
    /// The connect operation must be bounded by `timeout`; the returned
    /// handle must already be usable for attribute operations.
    async fn connect(
        &self,
        endpoint_url: &str,
        options: ConnectOptions,
        timeout: Duration,
    ) -> Result<Arc<dyn Connection>, ConnectionError>;
}

// =============================================================================
// Connection
// =============================================================================

/// A live session to one endpoint.
///
/// Handles are shared by concurrent tasks targeting the same endpoint
/// without extra synchronization, deferring to the underlying client's own
/// concurrency contract.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Reads the value attribute of a node, bounded by `timeout`.
    async fn read_attribute(
        &self,
        node: &NodeId,
        timeout: Duration,
    ) -> Result<AttrReading, OperationError>;

    /// Writes the value attribute of a node, bounded by `timeout`.
    ///
    /// A transport-level failure is an error; a completed exchange returns
    /// the protocol status, which callers must still check.
    async fn write_attribute(
        &self,
        node: &NodeId,
        value: AttrValue,
        timeout: Duration,
    ) -> Result<WriteStatus, OperationError>;

    /// Returns `true` while the session is actively connected.
    fn is_connected(&self) -> bool;

    /// Closes the session. Advisory: concurrent holders of the handle may
    /// still be issuing calls, which will then fail with their own errors.
    async fn close(&self);
}

// =============================================================================
// Endpoint selection
// =============================================================================

/// Selects the discovered endpoint matching the requested security policy
/// and mode, preferring the highest security level among matches.
///
/// # Errors
///
/// Returns [`ConnectionError::NoMatchingEndpoint`] when nothing matches.
pub fn select_endpoint(
    descriptors: &[EndpointDescriptor],
    policy: SecurityPolicy,
    mode: SecurityMode,
) -> Result<EndpointDescriptor, ConnectionError> {
    descriptors
        .iter()
        .filter(|d| d.security_mode == mode && d.security_policy_uri == policy.uri())
        .max_by_key(|d| d.security_level)
        .cloned()
        .ok_or_else(|| ConnectionError::no_matching_endpoint(policy.name(), mode.name()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(policy: SecurityPolicy, mode: SecurityMode, level: u8) -> EndpointDescriptor {
        EndpointDescriptor {
            endpoint_url: "opc.tcp://localhost:4840".to_string(),
            security_policy_uri: policy.uri().to_string(),
            security_mode: mode,
            security_level: level,
        }
    }

    #[test]
    fn test_select_endpoint_matches_policy_and_mode() {
        let descriptors = vec![
            descriptor(SecurityPolicy::None, SecurityMode::None, 0),
            descriptor(SecurityPolicy::Basic256Sha256, SecurityMode::Sign, 2),
            descriptor(SecurityPolicy::Basic256Sha256, SecurityMode::SignAndEncrypt, 3),
        ];

        let selected =
            select_endpoint(&descriptors, SecurityPolicy::Basic256Sha256, SecurityMode::Sign)
                .unwrap();
        assert_eq!(selected.security_level, 2);

        let none = select_endpoint(&descriptors, SecurityPolicy::None, SecurityMode::None).unwrap();
        assert_eq!(none.security_level, 0);
    }

    #[test]
    fn test_select_endpoint_prefers_higher_level() {
        let descriptors = vec![
            descriptor(SecurityPolicy::None, SecurityMode::None, 1),
            descriptor(SecurityPolicy::None, SecurityMode::None, 5),
        ];

        let selected =
            select_endpoint(&descriptors, SecurityPolicy::None, SecurityMode::None).unwrap();
        assert_eq!(selected.security_level, 5);
    }

    #[test]
    fn test_select_endpoint_no_match() {
        let descriptors = vec![descriptor(SecurityPolicy::None, SecurityMode::None, 0)];

        let err = select_endpoint(
            &descriptors,
            SecurityPolicy::Basic256Sha256,
            SecurityMode::SignAndEncrypt,
        )
        .unwrap_err();

        assert!(matches!(err, ConnectionError::NoMatchingEndpoint { .. }));
    }

    #[test]
    fn test_write_status() {
        assert!(WriteStatus::good().is_good());
        assert!(WriteStatus::from_code(0x0000_0000).is_good());
        assert!(!WriteStatus::from_code(0x8000_0000).is_good());
        // Uncertain statuses do not fail a write.
        assert!(WriteStatus::from_code(0x4000_0000).is_good());
    }
}
