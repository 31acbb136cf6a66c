// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA task execution for the Relay gateway.
//!
//! This crate turns loosely-typed task descriptions into validated OPC UA
//! read/write batches and manages the lifecycle of the connections they run
//! over:
//!
//! - **Request**: Validation and strong typing of the raw task description
//! - **Transport**: Abstract connector/connection traits over the wire-level
//!   client library
//! - **Cache**: Process-wide connection reuse keyed by endpoint
//! - **Establish**: Timeout-bounded, cancellable connection establishment
//! - **Reconnect**: Fixed-interval retry loop for mid-task connection loss
//! - **Executor**: Ordered batch execution with first-failure abort
//! - **Runner**: The task-dispatch boundary composing all of the above
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TaskRunner                              │
//! │            (validate → connect → execute → report)              │
//! └─────────────────────────────────────────────────────────────────┘
//!            │                  │                     │
//!            ▼                  ▼                     ▼
//! ┌──────────────────┐ ┌────────────────┐ ┌──────────────────────┐
//! │   TaskRequest    │ │ ConnectionCache│ │     TaskExecutor     │
//! │  (typed config)  │ │  (one mutex)   │ │ (ordered batch runs) │
//! └──────────────────┘ └────────────────┘ └──────────────────────┘
//!                               │                     │
//!                               ▼                     ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Connector / Connection                        │
//! │            (abstract transport, real or mock)                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use relay_core::{CancellationRegistry, ShutdownSignal};
//! use relay_opcua::{ConnectionCache, RealConnector, TaskRunner};
//! use serde_json::json;
//!
//! let runner = TaskRunner::new(
//!     Arc::new(RealConnector::new()),
//!     Arc::new(ConnectionCache::new()),
//!     Arc::new(CancellationRegistry::new()),
//!     ShutdownSignal::new(),
//! );
//!
//! let task = json!({
//!     "description": {
//!         "connection": {"endpoint_url": "opc.tcp://127.0.0.1:4840"},
//!         "config": {"namespace_index": 2, "read": [{"node_id": 5001}]},
//!     }
//! });
//!
//! let (ok, report) = runner.process(&task, "robot1").await;
//! println!("{} {:?}", ok, report);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod cache;
pub mod error;
pub mod establish;
pub mod executor;
pub mod reconnect;
pub mod request;
pub mod runner;
pub mod transport;
pub mod types;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use cache::ConnectionCache;
pub use error::{ConnectionError, OperationError, TaskError, TaskResult, ValidationError};
pub use establish::establish;
pub use reconnect::{AbortReason, ReconnectOutcome, ReconnectState};
pub use request::{limits, Operation, ReadItem, TaskRequest, WriteItem};
pub use runner::TaskRunner;
pub use transport::{select_endpoint, AttrReading, Connection, Connector, WriteStatus};
pub use types::{
    AttrValue, AuthPolicy, ConnectOptions, EndpointDescriptor, NodeId, SecurityMode,
    SecurityPolicy,
};

#[cfg(feature = "real-transport")]
pub use real_transport::RealConnector;
