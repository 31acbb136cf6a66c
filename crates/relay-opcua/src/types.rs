// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA types used by task execution.
//!
//! - **NodeId**: numeric node address (namespace index + identifier)
//! - **SecurityMode / SecurityPolicy / AuthPolicy**: enumerated connection
//!   security settings, parsed permissively from task description strings
//! - **AttrValue**: dynamic attribute value crossing the transport boundary
//! - **EndpointDescriptor / ConnectOptions**: endpoint discovery and
//!   connection establishment inputs

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// NodeId
// =============================================================================

/// A numeric OPC UA node address.
///
/// Tasks address attributes by a `(namespace index, numeric identifier)`
/// pair; the identifier comes from the task item, the namespace index from
/// the task config.
///
/// # Examples
///
/// ```
/// use relay_opcua::NodeId;
///
/// let node = NodeId::numeric(2, 5001);
/// assert_eq!(node.to_string(), "ns=2;i=5001");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// Numeric node identifier.
    pub identifier: u32,
}

impl NodeId {
    /// Creates a numeric node ID.
    #[inline]
    pub const fn numeric(namespace_index: u16, identifier: u32) -> Self {
        Self {
            namespace_index,
            identifier,
        }
    }

    /// Returns `true` if this node is in the standard namespace (ns=0).
    #[inline]
    pub const fn is_standard(&self) -> bool {
        self.namespace_index == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index == 0 {
            write!(f, "i={}", self.identifier)
        } else {
            write!(f, "ns={};i={}", self.namespace_index, self.identifier)
        }
    }
}

// =============================================================================
// SecurityMode
// =============================================================================

/// OPC UA message security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// Messages are neither signed nor encrypted.
    #[default]
    None,

    /// Messages are signed but not encrypted.
    Sign,

    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl SecurityMode {
    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
        }
    }

    /// Parses a task description string, falling back to the default for
    /// unrecognized input (unknown modes never select stricter behavior).
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SecurityMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "" | "none" => Ok(Self::None),
            "sign" | "signed" => Ok(Self::Sign),
            "signandencrypt" | "signencrypt" => Ok(Self::SignAndEncrypt),
            _ => Err(UnknownVariant),
        }
    }
}

// =============================================================================
// SecurityPolicy
// =============================================================================

/// OPC UA security policy (the cryptographic algorithm suite).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityPolicy {
    /// No security policy.
    #[default]
    None,

    /// Basic128Rsa15 (legacy).
    Basic128Rsa15,

    /// Basic256 (legacy).
    Basic256,

    /// Basic256Sha256.
    Basic256Sha256,

    /// Aes128Sha256RsaOaep.
    Aes128Sha256RsaOaep,

    /// Aes256Sha256RsaPss.
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    /// Returns the OPC UA policy URI.
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            Self::Basic128Rsa15 => "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15",
            Self::Basic256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256",
            Self::Basic256Sha256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
            Self::Aes128Sha256RsaOaep => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep"
            }
            Self::Aes256Sha256RsaPss => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss"
            }
        }
    }

    /// Returns the short name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Basic128Rsa15 => "Basic128Rsa15",
            Self::Basic256 => "Basic256",
            Self::Basic256Sha256 => "Basic256Sha256",
            Self::Aes128Sha256RsaOaep => "Aes128Sha256RsaOaep",
            Self::Aes256Sha256RsaPss => "Aes256Sha256RsaPss",
        }
    }

    /// Creates from a policy URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            u if u.ends_with("#None") => Some(Self::None),
            u if u.ends_with("#Basic128Rsa15") => Some(Self::Basic128Rsa15),
            u if u.ends_with("#Basic256") => Some(Self::Basic256),
            u if u.ends_with("#Basic256Sha256") => Some(Self::Basic256Sha256),
            u if u.contains("Aes128_Sha256_RsaOaep") => Some(Self::Aes128Sha256RsaOaep),
            u if u.contains("Aes256_Sha256_RsaPss") => Some(Self::Aes256Sha256RsaPss),
            _ => None,
        }
    }

    /// Parses a task description string, falling back to the default for
    /// unrecognized input.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SecurityPolicy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(policy) = Self::from_uri(s) {
            return Ok(policy);
        }

        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "" | "none" => Ok(Self::None),
            "basic128rsa15" | "basic128" => Ok(Self::Basic128Rsa15),
            "basic256" => Ok(Self::Basic256),
            "basic256sha256" => Ok(Self::Basic256Sha256),
            "aes128sha256rsaoaep" | "aes128" => Ok(Self::Aes128Sha256RsaOaep),
            "aes256sha256rsapss" | "aes256" => Ok(Self::Aes256Sha256RsaPss),
            _ => Err(UnknownVariant),
        }
    }
}

// =============================================================================
// AuthPolicy
// =============================================================================

/// How the client authenticates to the server.
///
/// Task descriptions carry the policy name only; certificate credentials
/// come from the separate `cert_file`/`key_file` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthPolicy {
    /// Anonymous authentication.
    #[default]
    Anonymous,

    /// Username/password authentication.
    UserName,

    /// X.509 certificate authentication.
    Certificate,

    /// Issued token authentication (e.g. OAuth).
    IssuedToken,
}

impl AuthPolicy {
    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Anonymous => "Anonymous",
            Self::UserName => "UserName",
            Self::Certificate => "Certificate",
            Self::IssuedToken => "IssuedToken",
        }
    }

    /// Parses a task description string, falling back to anonymous for
    /// unrecognized input.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for AuthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for AuthPolicy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "" | "anonymous" => Ok(Self::Anonymous),
            "username" | "username1" => Ok(Self::UserName),
            "certificate" | "x509" => Ok(Self::Certificate),
            "issuedtoken" => Ok(Self::IssuedToken),
            _ => Err(UnknownVariant),
        }
    }
}

/// Marker error for unrecognized enum strings; callers either propagate or
/// fall back to the permissive default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownVariant;

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant")
    }
}

impl std::error::Error for UnknownVariant {}

// =============================================================================
// AttrValue
// =============================================================================

/// A dynamic attribute value crossing the transport boundary.
///
/// Write items carry JSON values of arbitrary scalar type; reads come back
/// as whatever the server holds. `AttrValue` is the meeting point, with
/// lossless mapping to and from JSON for the task boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Boolean value.
    Boolean(bool),

    /// 32-bit signed integer.
    Int32(i32),

    /// 64-bit signed integer.
    Int64(i64),

    /// 32-bit unsigned integer.
    UInt32(u32),

    /// 64-bit unsigned integer.
    UInt64(u64),

    /// 32-bit float.
    Float(f32),

    /// 64-bit double.
    Double(f64),

    /// UTF-8 string.
    String(String),

    /// Date and time.
    DateTime(DateTime<Utc>),

    /// Null / empty value.
    Null,
}

impl AttrValue {
    /// Builds a value from a JSON scalar.
    ///
    /// Returns `None` for arrays and objects, which have no attribute
    /// representation.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Boolean(*b)),
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Some(Self::Int64(v))
                } else if let Some(v) = n.as_u64() {
                    Some(Self::UInt64(v))
                } else {
                    n.as_f64().map(Self::Double)
                }
            }
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Converts the value to JSON for task reports.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Boolean(v) => Value::from(*v),
            Self::Int32(v) => Value::from(*v),
            Self::Int64(v) => Value::from(*v),
            Self::UInt32(v) => Value::from(*v),
            Self::UInt64(v) => Value::from(*v),
            Self::Float(v) => Value::from(*v),
            Self::Double(v) => Value::from(*v),
            Self::String(v) => Value::from(v.clone()),
            Self::DateTime(v) => Value::from(v.to_rfc3339()),
            Self::Null => Value::Null,
        }
    }

    /// Returns `true` if this is a null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the value type name for diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::Int32(_) => "Int32",
            Self::Int64(_) => "Int64",
            Self::UInt32(_) => "UInt32",
            Self::UInt64(_) => "UInt64",
            Self::Float(_) => "Float",
            Self::Double(_) => "Double",
            Self::String(_) => "String",
            Self::DateTime(_) => "DateTime",
            Self::Null => "Null",
        }
    }
}

impl Default for AttrValue {
    fn default() -> Self {
        Self::Null
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Null => write!(f, "null"),
        }
    }
}

// =============================================================================
// EndpointDescriptor
// =============================================================================

/// One endpoint offered by a server during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// The endpoint URL.
    pub endpoint_url: String,

    /// Security policy URI offered by this endpoint.
    pub security_policy_uri: String,

    /// Security mode offered by this endpoint.
    pub security_mode: SecurityMode,

    /// Relative security strength; used to break ties between matches.
    pub security_level: u8,
}

// =============================================================================
// ConnectOptions
// =============================================================================

/// Options for one connection attempt, derived from the request and the
/// selected endpoint descriptor.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Requested security policy.
    pub security_policy: SecurityPolicy,

    /// Requested security mode.
    pub security_mode: SecurityMode,

    /// Policy URI of the selected endpoint.
    pub security_policy_uri: String,

    /// Authentication policy.
    pub auth_policy: AuthPolicy,

    /// Client certificate path; used only when the key path is also set.
    pub certificate_file: Option<String>,

    /// Client private key path; used only when the certificate path is also
    /// set.
    pub private_key_file: Option<String>,

    /// Timeout applied to protocol calls on the established connection.
    pub response_timeout: Duration,
}

impl ConnectOptions {
    /// Returns the certificate/key pair when both paths are present.
    pub fn client_key_pair(&self) -> Option<(&str, &str)> {
        match (&self.certificate_file, &self.private_key_file) {
            (Some(cert), Some(key)) if !cert.is_empty() && !key.is_empty() => {
                Some((cert.as_str(), key.as_str()))
            }
            _ => None,
        }
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
    fn test_node_id_display() {
        assert_eq!(NodeId::numeric(2, 5001).to_string(), "ns=2;i=5001");
        assert_eq!(NodeId::numeric(0, 84).to_string(), "i=84");
        assert!(NodeId::numeric(0, 84).is_standard());
    }

    #[test]
    fn test_security_mode_parsing() {
        assert_eq!(SecurityMode::parse_or_default("Sign"), SecurityMode::Sign);
        assert_eq!(
            SecurityMode::parse_or_default("sign_and_encrypt"),
            SecurityMode::SignAndEncrypt
        );
        assert_eq!(SecurityMode::parse_or_default(""), SecurityMode::None);
        // Unknown modes never select stricter behavior.
        assert_eq!(SecurityMode::parse_or_default("bogus"), SecurityMode::None);
    }

    #[test]
    fn test_security_policy_parsing() {
        assert_eq!(
            SecurityPolicy::parse_or_default("Basic256Sha256"),
            SecurityPolicy::Basic256Sha256
        );
        assert_eq!(
            SecurityPolicy::from_uri("http://opcfoundation.org/UA/SecurityPolicy#None"),
            Some(SecurityPolicy::None)
        );
        assert_eq!(
            SecurityPolicy::parse_or_default(SecurityPolicy::Aes256Sha256RsaPss.uri()),
            SecurityPolicy::Aes256Sha256RsaPss
        );
        assert_eq!(SecurityPolicy::parse_or_default("???"), SecurityPolicy::None);
    }

    #[test]
    fn test_auth_policy_parsing() {
        assert_eq!(AuthPolicy::parse_or_default("UserName"), AuthPolicy::UserName);
        assert_eq!(AuthPolicy::parse_or_default("x509"), AuthPolicy::Certificate);
        assert_eq!(AuthPolicy::parse_or_default(""), AuthPolicy::Anonymous);
        assert_eq!(AuthPolicy::parse_or_default("unknown"), AuthPolicy::Anonymous);
    }

    #[test]
    fn test_attr_value_json_round_trip() {
        assert_eq!(AttrValue::from_json(&json!(true)), Some(AttrValue::Boolean(true)));
        assert_eq!(AttrValue::from_json(&json!(42)), Some(AttrValue::Int64(42)));
        assert_eq!(AttrValue::from_json(&json!(2.5)), Some(AttrValue::Double(2.5)));
        assert_eq!(
            AttrValue::from_json(&json!("Processing")),
            Some(AttrValue::String("Processing".to_string()))
        );
        assert_eq!(AttrValue::from_json(&json!(null)), Some(AttrValue::Null));
        assert_eq!(AttrValue::from_json(&json!([1, 2])), None);
        assert_eq!(AttrValue::from_json(&json!({"v": 1})), None);

        assert_eq!(AttrValue::Int64(42).to_json(), json!(42));
        assert_eq!(AttrValue::String("OK".into()).to_json(), json!("OK"));
        assert_eq!(AttrValue::Null.to_json(), json!(null));
    }

    #[test]
    fn test_connect_options_key_pair() {
        let mut options = ConnectOptions {
            security_policy: SecurityPolicy::None,
            security_mode: SecurityMode::None,
            security_policy_uri: SecurityPolicy::None.uri().to_string(),
            auth_policy: AuthPolicy::Anonymous,
            certificate_file: Some("client.pem".into()),
            private_key_file: None,
            response_timeout: Duration::from_secs(5),
        };

        // Both paths required.
        assert_eq!(options.client_key_pair(), None);

        options.private_key_file = Some("client.key".into());
        assert_eq!(options.client_key_pair(), Some(("client.pem", "client.key")));
    }
}
