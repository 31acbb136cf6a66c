// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Production transport over the `opcua` crate.
//!
//! [`RealConnector`] implements the [`Connector`]/[`Connection`] seam with
//! actual OPC UA protocol communication. The underlying client API is
//! synchronous; discovery and connect run on blocking tasks so the
//! establisher's cancellation/timeout race stays responsive, while the
//! short-lived attribute calls run in place.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use opcua::client::prelude::{
    AttributeId, AttributeService, ClientBuilder, DataValue, EndpointDescription, IdentityToken,
    MessageSecurityMode, ReadValueId, Session, TimestampsToReturn, UserTokenPolicy, WriteValue,
};
use opcua::sync::RwLock as OpcUaRwLock;

use crate::error::{ConnectionError, OperationError};
use crate::transport::{AttrReading, Connection, Connector, WriteStatus};
use crate::types::{
    AttrValue, AuthPolicy, ConnectOptions, EndpointDescriptor, NodeId, SecurityMode,
};

/// Application name advertised to servers.
const APPLICATION_NAME: &str = "Relay OPC UA Client";

/// Application URI advertised to servers.
const APPLICATION_URI: &str = "urn:relay:opcua:client";

// =============================================================================
// RealConnector
// =============================================================================

/// Connector backed by the `opcua` crate.
#[derive(Debug, Default)]
pub struct RealConnector {
    /// Trust server certificates without a PKI trust store. Appropriate for
    /// closed industrial networks; leave off where a PKI directory is
    /// provisioned.
    trust_server_certs: bool,
}

impl RealConnector {
    /// Creates a connector with certificate trust left to the PKI store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector that trusts server certificates outright.
    pub fn trusting() -> Self {
        Self {
            trust_server_certs: true,
        }
    }

    /// Builds a client for one discovery or connect call.
    fn build_client(
        &self,
        endpoint_url: &str,
        options: Option<&ConnectOptions>,
    ) -> Result<opcua::client::prelude::Client, ConnectionError> {
        let mut builder = ClientBuilder::new()
            .application_name(APPLICATION_NAME)
            .application_uri(APPLICATION_URI)
            // Retry policy belongs to the reconnection loop, not the client.
            .session_retry_limit(0);

        if self.trust_server_certs {
            builder = builder.trust_server_certs(true);
        }

        if let Some((cert, key)) = options.and_then(ConnectOptions::client_key_pair) {
            builder = builder.certificate_path(cert).private_key_path(key);
        }

        builder
            .client()
            .ok_or_else(|| ConnectionError::connect(endpoint_url, "failed to build OPC UA client"))
    }

    /// Maps the configured auth policy to a client identity token.
    fn identity_token(options: &ConnectOptions) -> IdentityToken {
        match options.auth_policy {
            AuthPolicy::Anonymous => IdentityToken::Anonymous,
            AuthPolicy::Certificate => match options.client_key_pair() {
                Some((cert, key)) => {
                    IdentityToken::X509(PathBuf::from(cert), PathBuf::from(key))
                }
                None => {
                    warn!("certificate auth requested without cert/key pair, using anonymous");
                    IdentityToken::Anonymous
                }
            },
            AuthPolicy::UserName | AuthPolicy::IssuedToken => {
                // Task descriptions carry no credentials for these policies.
                warn!(
                    policy = %options.auth_policy,
                    "auth policy has no credential source, using anonymous"
                );
                IdentityToken::Anonymous
            }
        }
    }
}

#[async_trait]
impl Connector for RealConnector {
    async fn discover_endpoints(
        &self,
        endpoint_url: &str,
        timeout: Duration,
    ) -> Result<Vec<EndpointDescriptor>, ConnectionError> {
        let client = self.build_client(endpoint_url, None)?;
        let url = endpoint_url.to_string();

        let discovery = tokio::task::spawn_blocking(move || {
            client.get_server_endpoints_from_url(&url)
        });

        let endpoints = match tokio::time::timeout(timeout, discovery).await {
            Ok(Ok(Ok(endpoints))) => endpoints,
            Ok(Ok(Err(status))) => {
                return Err(ConnectionError::discovery(endpoint_url, status.to_string()));
            }
            Ok(Err(join_err)) => {
                return Err(ConnectionError::discovery(endpoint_url, join_err.to_string()));
            }
            Err(_) => return Err(ConnectionError::timed_out(endpoint_url, timeout)),
        };

        debug!(endpoint = endpoint_url, count = endpoints.len(), "endpoints discovered");

        Ok(endpoints.iter().map(to_descriptor).collect())
    }

    async fn connect(
        &self,
        endpoint_url: &str,
        options: ConnectOptions,
        timeout: Duration,
    ) -> Result<Arc<dyn Connection>, ConnectionError> {
        let client = self.build_client(endpoint_url, Some(&options))?;
        let identity_token = Self::identity_token(&options);

        let endpoint: EndpointDescription = (
            endpoint_url,
            options.security_policy.name(),
            to_message_security_mode(options.security_mode),
            UserTokenPolicy::anonymous(),
        )
            .into();

        let url = endpoint_url.to_string();
        let connecting = tokio::task::spawn_blocking(move || {
            let mut client = client;
            client.connect_to_endpoint(endpoint, identity_token)
        });

        let session = match tokio::time::timeout(timeout, connecting).await {
            Ok(Ok(Ok(session))) => session,
            Ok(Ok(Err(status))) => {
                return Err(ConnectionError::connect(url, status.to_string()));
            }
            Ok(Err(join_err)) => {
                return Err(ConnectionError::connect(url, join_err.to_string()));
            }
            Err(_) => return Err(ConnectionError::timed_out(url, timeout)),
        };

        Ok(Arc::new(RealConnection {
            endpoint_url: url,
            session,
            connected: AtomicBool::new(true),
        }))
    }
}

// =============================================================================
// RealConnection
// =============================================================================

/// A live session handle over the `opcua` crate.
struct RealConnection {
    endpoint_url: String,
    session: Arc<OpcUaRwLock<Session>>,
    connected: AtomicBool,
}

impl RealConnection {
    /// A service-level failure means the secure channel is gone; mark the
    /// handle stale so the cache stops returning it.
    fn mark_disconnected(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            warn!(endpoint = %self.endpoint_url, "connection marked disconnected");
        }
    }
}

#[async_trait]
impl Connection for RealConnection {
    async fn read_attribute(
        &self,
        node: &NodeId,
        _timeout: Duration,
    ) -> Result<AttrReading, OperationError> {
        let read_value_id = ReadValueId {
            node_id: to_opcua_node_id(node),
            attribute_id: AttributeId::Value as u32,
            index_range: opcua::types::UAString::null(),
            data_encoding: opcua::types::QualifiedName::null(),
        };

        let results = {
            let session = self.session.read();
            session.read(&[read_value_id], TimestampsToReturn::Both, 0.0)
        }
        .map_err(|status| {
            self.mark_disconnected();
            OperationError::read_failed(node.to_string(), status.to_string())
        })?;

        let Some(data_value) = results.first() else {
            return Err(OperationError::read_failed(node.to_string(), "empty read response"));
        };

        if let Some(status) = data_value.status {
            if status.is_bad() {
                return Err(OperationError::read_failed(node.to_string(), status.to_string()));
            }
        }

        Ok(AttrReading {
            value: data_value
                .value
                .as_ref()
                .map(from_opcua_variant)
                .unwrap_or(AttrValue::Null),
            server_timestamp: server_timestamp(data_value),
        })
    }

    async fn write_attribute(
        &self,
        node: &NodeId,
        value: AttrValue,
        _timeout: Duration,
    ) -> Result<WriteStatus, OperationError> {
        let write_value = WriteValue {
            node_id: to_opcua_node_id(node),
            attribute_id: AttributeId::Value as u32,
            index_range: opcua::types::UAString::null(),
            value: DataValue::new_now(to_opcua_variant(&value)),
        };

        let results = {
            let session = self.session.read();
            session.write(&[write_value])
        }
        .map_err(|status| {
            self.mark_disconnected();
            OperationError::write_failed(node.to_string(), status.to_string())
        })?;

        let Some(status) = results.first() else {
            return Err(OperationError::write_failed(node.to_string(), "empty write response"));
        };

        Ok(WriteStatus::from_code(status.bits()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let session = self.session.read();
        session.disconnect();
    }
}

// =============================================================================
// Conversions
// =============================================================================

/// Maps a discovered endpoint to the transport descriptor.
fn to_descriptor(endpoint: &EndpointDescription) -> EndpointDescriptor {
    EndpointDescriptor {
        endpoint_url: endpoint.endpoint_url.as_ref().to_string(),
        security_policy_uri: endpoint.security_policy_uri.as_ref().to_string(),
        security_mode: from_message_security_mode(endpoint.security_mode),
        security_level: endpoint.security_level,
    }
}

fn to_message_security_mode(mode: SecurityMode) -> MessageSecurityMode {
    match mode {
        SecurityMode::None => MessageSecurityMode::None,
        SecurityMode::Sign => MessageSecurityMode::Sign,
        SecurityMode::SignAndEncrypt => MessageSecurityMode::SignAndEncrypt,
    }
}

fn from_message_security_mode(mode: MessageSecurityMode) -> SecurityMode {
    match mode {
        MessageSecurityMode::Sign => SecurityMode::Sign,
        MessageSecurityMode::SignAndEncrypt => SecurityMode::SignAndEncrypt,
        _ => SecurityMode::None,
    }
}

fn to_opcua_node_id(node: &NodeId) -> opcua::types::NodeId {
    opcua::types::NodeId::new(node.namespace_index, node.identifier)
}

fn from_opcua_variant(variant: &opcua::types::Variant) -> AttrValue {
    use opcua::types::Variant;

    match variant {
        Variant::Empty => AttrValue::Null,
        Variant::Boolean(v) => AttrValue::Boolean(*v),
        Variant::SByte(v) => AttrValue::Int32(i32::from(*v)),
        Variant::Byte(v) => AttrValue::UInt32(u32::from(*v)),
        Variant::Int16(v) => AttrValue::Int32(i32::from(*v)),
        Variant::UInt16(v) => AttrValue::UInt32(u32::from(*v)),
        Variant::Int32(v) => AttrValue::Int32(*v),
        Variant::UInt32(v) => AttrValue::UInt32(*v),
        Variant::Int64(v) => AttrValue::Int64(*v),
        Variant::UInt64(v) => AttrValue::UInt64(*v),
        Variant::Float(v) => AttrValue::Float(*v),
        Variant::Double(v) => AttrValue::Double(*v),
        Variant::String(v) => AttrValue::String(v.as_ref().to_string()),
        Variant::DateTime(v) => AttrValue::DateTime(v.as_chrono()),
        // Complex types degrade to their debug rendering.
        other => AttrValue::String(format!("{other:?}")),
    }
}

fn to_opcua_variant(value: &AttrValue) -> opcua::types::Variant {
    use opcua::types::Variant;

    match value {
        AttrValue::Null => Variant::Empty,
        AttrValue::Boolean(v) => Variant::Boolean(*v),
        AttrValue::Int32(v) => Variant::Int32(*v),
        AttrValue::Int64(v) => Variant::Int64(*v),
        AttrValue::UInt32(v) => Variant::UInt32(*v),
        AttrValue::UInt64(v) => Variant::UInt64(*v),
        AttrValue::Float(v) => Variant::Float(*v),
        AttrValue::Double(v) => Variant::Double(*v),
        AttrValue::String(v) => Variant::String(opcua::types::UAString::from(v.as_str())),
        AttrValue::DateTime(v) => {
            Variant::DateTime(Box::new(opcua::types::DateTime::from(*v)))
        }
    }
}

fn server_timestamp(data_value: &DataValue) -> Option<chrono::DateTime<chrono::Utc>> {
    data_value.server_timestamp.as_ref().map(|t| t.as_chrono())
}
