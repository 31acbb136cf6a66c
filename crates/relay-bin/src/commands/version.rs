// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

/// Prints version information.
pub fn version() {
    println!("relay {}", env!("CARGO_PKG_VERSION"));
    println!("  relay-core  {}", relay_core::VERSION);
    println!("  transport   opcua (real-transport)");
}
