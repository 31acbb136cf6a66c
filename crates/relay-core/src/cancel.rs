// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-owner task cancellation.
//!
//! Each task runs on behalf of an owner (a logical device or robot
//! identity). External code can abort an owner's in-flight connection
//! attempt or reconnection loop by firing that owner's signal; the core
//! only consumes signals by identity lookup.
//!
//! Cancellation is cooperative and level-triggered: a token observes a
//! cancellation even when it was fired before the token started waiting,
//! and the signal stays set until [`CancellationRegistry::reset`] is
//! called for the owner.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

// =============================================================================
// CancellationRegistry
// =============================================================================

/// Registry of cancellation signals keyed by owner identity.
///
/// Constructed once at the process composition point and shared by
/// reference; tests get a fresh registry each (see the design note on
/// avoiding ambient globals).
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    owners: RwLock<HashMap<String, watch::Sender<bool>>>,
}

impl CancellationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a token observing the owner's signal, creating the channel
    /// on first use.
    pub fn token(&self, owner: &str) -> CancelToken {
        let rx = {
            let owners = self.owners.read();
            owners.get(owner).map(|tx| tx.subscribe())
        };

        let rx = match rx {
            Some(rx) => rx,
            None => {
                let mut owners = self.owners.write();
                owners
                    .entry(owner.to_string())
                    .or_insert_with(|| watch::channel(false).0)
                    .subscribe()
            }
        };

        CancelToken { rx }
    }

    /// Fires the owner's cancellation signal.
    ///
    /// Returns `false` when the owner has never been registered, in which
    /// case the signal is created pre-fired so late subscribers still see
    /// it.
    pub fn cancel(&self, owner: &str) -> bool {
        let mut owners = self.owners.write();
        match owners.get(owner) {
            Some(tx) => {
                debug!(owner, "cancellation signalled");
                tx.send_replace(true);
                true
            }
            None => {
                let (tx, _rx) = watch::channel(true);
                owners.insert(owner.to_string(), tx);
                debug!(owner, "cancellation signalled before first use");
                false
            }
        }
    }

    /// Clears the owner's cancellation signal so subsequent tasks run.
    pub fn reset(&self, owner: &str) {
        let owners = self.owners.read();
        if let Some(tx) = owners.get(owner) {
            tx.send_replace(false);
        }
    }

    /// Removes the owner's signal entirely.
    pub fn remove(&self, owner: &str) {
        self.owners.write().remove(owner);
    }

    /// Returns the number of registered owners.
    pub fn len(&self) -> usize {
        self.owners.read().len()
    }

    /// Returns `true` when no owner is registered.
    pub fn is_empty(&self) -> bool {
        self.owners.read().is_empty()
    }
}

// =============================================================================
// CancelToken
// =============================================================================

/// A handle observing one owner's cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Returns `true` if the owner's signal has been fired.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when the owner's signal fires; resolves immediately if it
    /// already has. Pends forever when the registry entry was removed
    /// without firing.
    pub async fn cancelled(&mut self) {
        if *self.rx.borrow() {
            return;
        }
        while self.rx.changed().await.is_ok() {
            if *self.rx.borrow() {
                return;
            }
        }
        // Sender gone without ever firing: cancellation can no longer occur.
        std::future::pending::<()>().await
    }

    /// Creates a token that never fires, for tasks without an owner signal.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_observed_by_waiting_token() {
        let registry = Arc::new(CancellationRegistry::new());
        let mut token = registry.token("robot1");

        assert!(!token.is_cancelled());

        let registry_clone = Arc::clone(&registry);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            registry_clone.cancel("robot1");
        });

        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("token should observe cancellation");
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_before_wait_is_not_lost() {
        let registry = CancellationRegistry::new();
        let _ = registry.token("robot1");
        registry.cancel("robot1");

        let mut token = registry.token("robot1");
        assert!(token.is_cancelled());
        // Resolves immediately even though the fire predates the wait.
        tokio::time::timeout(Duration::from_millis(50), token.cancelled())
            .await
            .expect("pre-fired signal should resolve immediately");
    }

    #[tokio::test]
    async fn test_cancel_unknown_owner_pre_fires() {
        let registry = CancellationRegistry::new();
        assert!(!registry.cancel("ghost"));
        assert!(registry.token("ghost").is_cancelled());
    }

    #[tokio::test]
    async fn test_reset_clears_signal() {
        let registry = CancellationRegistry::new();
        let _ = registry.token("robot1");
        registry.cancel("robot1");
        registry.reset("robot1");

        assert!(!registry.token("robot1").is_cancelled());
    }

    #[tokio::test]
    async fn test_owners_are_independent() {
        let registry = CancellationRegistry::new();
        let _ = registry.token("robot1");
        let _ = registry.token("robot2");

        registry.cancel("robot1");

        assert!(registry.token("robot1").is_cancelled());
        assert!(!registry.token("robot2").is_cancelled());
    }
}
