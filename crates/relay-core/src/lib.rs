// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # relay-core
//!
//! Core abstractions shared across the Relay task gateway.
//!
//! Relay accepts loosely-typed task descriptions (parsed JSON), resolves
//! them into validated protocol requests, and executes them against remote
//! devices. This crate provides the protocol-agnostic foundation:
//!
//! - **Extract**: Typed scalar extraction from untyped JSON maps, with
//!   strict and lenient modes, plus range clamping
//! - **Report**: The structured success/failure shape returned for every
//!   task, mirroring the dispatch boundary wire format
//! - **Cancel**: Per-owner cancellation registry so external code can abort
//!   in-flight connection attempts for a specific device
//! - **Shutdown**: Process-wide shutdown signal consumed at retry
//!   suspension points
//!
//! ## Example
//!
//! ```
//! use relay_core::extract::{extract_int, clamp_f64};
//! use serde_json::json;
//!
//! let map = json!({"namespace_index": "2"});
//! let ns = extract_int(map.as_object().unwrap(), "namespace_index").unwrap();
//! assert_eq!(ns, 2);
//!
//! assert_eq!(clamp_f64(42.0, 0.1, 10.0), 10.0);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod cancel;
pub mod error;
pub mod extract;
pub mod report;
pub mod shutdown;

pub use cancel::{CancelToken, CancellationRegistry};
pub use error::ExtractError;
pub use extract::{clamp_f64, extract_float_or, extract_int};
pub use report::{ItemData, ItemResult, TaskDisposition, TaskReport};
pub use shutdown::{ShutdownListener, ShutdownSignal};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
