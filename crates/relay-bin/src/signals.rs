// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OS signal handling.
//!
//! Wires SIGTERM/SIGINT (Ctrl+C on Windows) into the process-wide shutdown
//! signal, which the reconnection loop consumes between retry attempts.

use relay_core::ShutdownSignal;
use tracing::info;

/// Spawns a background task that triggers `shutdown` on the first OS
/// termination signal.
pub fn spawn_signal_handler(shutdown: ShutdownSignal) {
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
}

#[cfg(windows)]
async fn wait_for_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to register Ctrl+C handler");
    info!("received Ctrl+C");
}
