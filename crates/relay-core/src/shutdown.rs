// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Process-wide shutdown signalling.
//!
//! One shutdown signal exists per process, created at the composition point
//! and passed by reference to the components that honor it. The reconnection
//! loop checks it between retry attempts; the binary wires OS signals
//! (SIGTERM, SIGINT) into it. Firing is idempotent, and listeners created
//! after the fact still observe the shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

// =============================================================================
// ShutdownSignal
// =============================================================================

/// Cloneable handle to the process-wide shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Creates a new, untriggered signal.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fires the signal, notifying all listeners. Idempotent.
    pub fn trigger(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("shutdown initiated");
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` once the signal has fired.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Creates a listener for this signal.
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
            triggered: Arc::clone(&self.triggered),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ShutdownListener
// =============================================================================

/// Waits for the shutdown signal.
///
/// Resolves immediately when the signal fired before the listener was
/// created; the `triggered` flag covers the gap a pure broadcast receiver
/// would miss.
#[derive(Debug)]
pub struct ShutdownListener {
    receiver: broadcast::Receiver<()>,
    triggered: Arc<AtomicBool>,
}

impl ShutdownListener {
    /// Resolves when shutdown is signalled.
    pub async fn wait(&mut self) {
        if self.triggered.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.receiver.recv().await;
    }

    /// Returns `true` once the signal has fired.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Tests
// =============================================================================
