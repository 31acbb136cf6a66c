// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Process-wide connection cache.
//!
//! Concurrent tasks targeting the same device reuse one session. The cache
//! maps endpoint identity to the live connection handle; access is
//! serialized by a single mutex held only for the map operation itself —
//! network calls never happen under the lock. Coarse locking is fine here:
//! entries are cheap to compare and held briefly.
//!
//! A cached entry counts only while it reports an actively-connected state
//! at lookup time; a stale entry is a cache miss and stays in place until
//! re-establishment overwrites it. At most one entry exists per endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::transport::Connection;

/// Endpoint-keyed cache of live connection handles.
///
/// Constructed once at the process composition point and shared by
/// reference (no ambient globals); tests build a fresh cache each.
#[derive(Default)]
pub struct ConnectionCache {
    entries: Mutex<HashMap<String, Arc<dyn Connection>>>,
}

impl ConnectionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live connection for `endpoint`, if one is cached and
    /// still connected. A disconnected entry is treated as a miss.
    pub fn get(&self, endpoint: &str) -> Option<Arc<dyn Connection>> {
        let entries = self.entries.lock();
        entries
            .get(endpoint)
            .filter(|conn| conn.is_connected())
            .cloned()
    }

    /// Inserts a connection for `endpoint`, replacing any previous entry.
    ///
    /// The replaced handle is not closed here; tasks still holding it drive
    /// it to completion and the underlying client cleans up on drop.
    pub fn insert(&self, endpoint: impl Into<String>, connection: Arc<dyn Connection>) {
        let endpoint = endpoint.into();
        let replaced = self
            .entries
            .lock()
            .insert(endpoint.clone(), connection)
            .is_some();
        debug!(endpoint = %endpoint, replaced, "connection cached");
    }

    /// Removes and returns the entry for `endpoint`.
    pub fn remove(&self, endpoint: &str) -> Option<Arc<dyn Connection>> {
        self.entries.lock().remove(endpoint)
    }

    /// Returns the number of cached entries, live or stale.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl std::fmt::Debug for ConnectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCache")
            .field("entries", &self.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
