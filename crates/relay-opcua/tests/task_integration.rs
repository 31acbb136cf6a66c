// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Task execution integration tests.
//!
//! These tests drive the full task path (validation, connection cache,
//! establishment, reconnection, batch execution) against an in-process mock
//! transport; no server is required. The mock counts discovery and connect
//! calls so tests can assert when network activity happens — and when it
//! must not.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};

use relay_core::{CancellationRegistry, ShutdownSignal};
use relay_opcua::{
    establish, reconnect, AttrReading, AttrValue, ConnectOptions, Connection, ConnectionCache,
    ConnectionError, Connector, EndpointDescriptor, NodeId, ReconnectOutcome, SecurityMode,
    SecurityPolicy, TaskRequest, TaskRunner, WriteStatus,
};

// =============================================================================
// Mock Transport
// =============================================================================

/// Shared state behind the mock connector and its connections.
#[derive(Default)]
struct MockState {
    /// Node values held by the simulated server, keyed by node string.
    values: RwLock<HashMap<String, AttrValue>>,

    /// Nodes whose writes come back with a bad protocol status.
    fail_write_nodes: RwLock<HashSet<String>>,

    /// Number of discovery calls issued.
    discover_calls: AtomicU32,

    /// Number of connect calls issued.
    connect_calls: AtomicU32,

    /// When set, connect never completes (for timeout/cancellation races).
    hang_connect: AtomicBool,

    /// When set, connect fails outright.
    fail_connect: AtomicBool,

    /// Operation failures granted to the next connection created; each
    /// failure also drops that connection's link. Lets tests simulate
    /// mid-task connection loss.
    pending_link_failures: AtomicI32,
}

impl MockState {
    fn set_value(&self, node: &str, value: AttrValue) {
        self.values.write().unwrap().insert(node.to_string(), value);
    }

    fn value(&self, node: &str) -> Option<AttrValue> {
        self.values.read().unwrap().get(node).cloned()
    }

    fn fail_writes_to(&self, node: &str) {
        self.fail_write_nodes.write().unwrap().insert(node.to_string());
    }

    fn discover_calls(&self) -> u32 {
        self.discover_calls.load(Ordering::SeqCst)
    }

    fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }
}

struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    fn new() -> (Arc<Self>, Arc<MockState>) {
        let state = Arc::new(MockState::default());
        (
            Arc::new(Self {
                state: Arc::clone(&state),
            }),
            state,
        )
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn discover_endpoints(
        &self,
        endpoint_url: &str,
        _timeout: Duration,
    ) -> Result<Vec<EndpointDescriptor>, ConnectionError> {
        self.state.discover_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![EndpointDescriptor {
            endpoint_url: endpoint_url.to_string(),
            security_policy_uri: SecurityPolicy::None.uri().to_string(),
            security_mode: SecurityMode::None,
            security_level: 0,
        }])
    }

    async fn connect(
        &self,
        endpoint_url: &str,
        _options: ConnectOptions,
        _timeout: Duration,
    ) -> Result<Arc<dyn Connection>, ConnectionError> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);

        if self.state.hang_connect.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(ConnectionError::connect(endpoint_url, "simulated refusal"));
        }

        Ok(mock_connection(&self.state))
    }
}

struct MockConnection {
    state: Arc<MockState>,
    connected: AtomicBool,
    link_failures_left: AtomicI32,
}

/// Creates a live mock connection, claiming any pending link failures.
fn mock_connection(state: &Arc<MockState>) -> Arc<MockConnection> {
    let failures = state.pending_link_failures.swap(0, Ordering::SeqCst);
    Arc::new(MockConnection {
        state: Arc::clone(state),
        connected: AtomicBool::new(true),
        link_failures_left: AtomicI32::new(failures),
    })
}

impl MockConnection {
    /// Simulates a dropped link on this operation when failures remain.
    fn check_link(&self, node: &NodeId) -> Result<(), relay_opcua::OperationError> {
        if self.link_failures_left.fetch_sub(1, Ordering::SeqCst) > 0 {
            self.connected.store(false, Ordering::SeqCst);
            return Err(relay_opcua::OperationError::read_failed(
                node.to_string(),
                "connection reset by peer",
            ));
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(relay_opcua::OperationError::read_failed(
                node.to_string(),
                "not connected",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn read_attribute(
        &self,
        node: &NodeId,
        _timeout: Duration,
    ) -> Result<AttrReading, relay_opcua::OperationError> {
        self.check_link(node)?;
        let value = self.state.value(&node.to_string()).unwrap_or(AttrValue::Null);
        Ok(AttrReading::now(value))
    }

    async fn write_attribute(
        &self,
        node: &NodeId,
        value: AttrValue,
        _timeout: Duration,
    ) -> Result<WriteStatus, relay_opcua::OperationError> {
        self.check_link(node)?;

        if self
            .state
            .fail_write_nodes
            .read()
            .unwrap()
            .contains(&node.to_string())
        {
            return Ok(WriteStatus::from_code(0x8000_0000));
        }

        self.state.set_value(&node.to_string(), value);
        Ok(WriteStatus::good())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// Fixtures
// =============================================================================

const ENDPOINT: &str = "opc.tcp://127.0.0.1:4840";

struct Fixture {
    runner: TaskRunner,
    state: Arc<MockState>,
    cache: Arc<ConnectionCache>,
    cancellations: Arc<CancellationRegistry>,
    shutdown: ShutdownSignal,
    connector: Arc<MockConnector>,
}

fn fixture() -> Fixture {
    let (connector, state) = MockConnector::new();
    let cache = Arc::new(ConnectionCache::new());
    let cancellations = Arc::new(CancellationRegistry::new());
    let shutdown = ShutdownSignal::new();

    let runner = TaskRunner::new(
        Arc::clone(&connector) as Arc<dyn Connector>,
        Arc::clone(&cache),
        Arc::clone(&cancellations),
        shutdown.clone(),
    );

    Fixture {
        runner,
        state,
        cache,
        cancellations,
        shutdown,
        connector,
    }
}

fn read_task(node_id: u32) -> Value {
    json!({
        "description": {
            "connection": {"endpoint_url": ENDPOINT},
            "config": {"namespace_index": 2, "read": [{"node_id": node_id}]},
        }
    })
}

fn write_task(items: Value) -> Value {
    json!({
        "description": {
            "connection": {"endpoint_url": ENDPOINT},
            "config": {"namespace_index": 2, "write": items},
        }
    })
}

fn request_with(connection_extra: Value) -> TaskRequest {
    let mut connection = json!({"endpoint_url": ENDPOINT});
    connection
        .as_object_mut()
        .unwrap()
        .extend(connection_extra.as_object().unwrap().clone());

    TaskRequest::from_task(&json!({
        "description": {
            "connection": connection,
            "config": {"namespace_index": 2, "read": [{"node_id": 1}]},
        }
    }))
    .unwrap()
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_validation_failure_precedes_network_activity() {
    let fx = fixture();

    let task = json!({
        "description": {
            "connection": {},
            "config": {"namespace_index": 2, "read": [{"node_id": 1}]},
        }
    });

    let (ok, report) = fx.runner.process(&task, "robot1").await;

    assert!(!ok);
    assert!(report.message.contains("endpoint_url"));
    assert_eq!(fx.state.discover_calls(), 0, "validation must precede discovery");
    assert_eq!(fx.state.connect_calls(), 0, "validation must precede connect");
}

#[tokio::test]
async fn test_empty_operation_lists_are_invalid() {
    let fx = fixture();

    let task = json!({
        "description": {
            "connection": {"endpoint_url": ENDPOINT},
            "config": {"namespace_index": 2, "read": [], "write": []},
        }
    });

    let (ok, report) = fx.runner.process(&task, "robot1").await;

    assert!(!ok);
    assert_eq!(
        report.to_json(),
        json!({
            "status": false,
            "operation": "TASK_INVALID",
            "message": "No OPC UA read or write operations specified",
        })
    );
    assert_eq!(fx.state.connect_calls(), 0);
}

// =============================================================================
// Read / write execution
// =============================================================================

#[tokio::test]
async fn test_read_task_returns_item_results() {
    let fx = fixture();
    fx.state.set_value("ns=2;i=5001", AttrValue::Int32(42));

    let (ok, report) = fx.runner.process(&read_task(5001), "robot1").await;

    assert!(ok);
    assert_eq!(
        report.to_json(),
        json!({
            "status": true,
            "message": "OPC UA read operation successful",
            "results": [{"data": {"value": 42}, "status": true}],
        })
    );
}

#[tokio::test]
async fn test_write_task_end_to_end() {
    let fx = fixture();

    let task = write_task(json!([{"node_id": 5002, "value": "Processing"}]));
    let (ok, report) = fx.runner.process(&task, "robot1").await;

    assert!(ok);
    assert_eq!(
        report.to_json(),
        json!({
            "status": true,
            "message": "OPC UA write operation successful",
            "results": [{"data": {"value": "OK"}, "status": true}],
        })
    );
    assert_eq!(
        fx.state.value("ns=2;i=5002"),
        Some(AttrValue::String("Processing".to_string()))
    );
}

#[tokio::test]
async fn test_read_batch_preserves_item_order() {
    let fx = fixture();
    fx.state.set_value("ns=2;i=1", AttrValue::Int32(1));
    // Node 2 has no value on the server and reads back null.
    let task = json!({
        "description": {
            "connection": {"endpoint_url": ENDPOINT},
            "config": {"namespace_index": 2, "read": [{"node_id": 1}, {"node_id": 2}]},
        }
    });

    let (ok, report) = fx.runner.process(&task, "robot1").await;
    assert!(ok);
    let results = report.results.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].data.value, json!(1));
    assert_eq!(results[1].data.value, json!(null));
}

#[tokio::test]
async fn test_write_batch_aborts_on_second_failure() {
    let fx = fixture();
    fx.state.fail_writes_to("ns=2;i=6002");

    let task = write_task(json!([
        {"node_id": 6001, "value": "first"},
        {"node_id": 6002, "value": "second"},
        {"node_id": 6003, "value": "third"},
    ]));

    let (ok, report) = fx.runner.process(&task, "robot1").await;

    assert!(!ok);
    assert_eq!(report.message, "Error writing data from OPC UA");
    assert_eq!(report.results, None, "no partial results after the failure point");

    // The first item was applied before the batch aborted; the third never ran.
    assert_eq!(
        fx.state.value("ns=2;i=6001"),
        Some(AttrValue::String("first".to_string()))
    );
    assert_eq!(fx.state.value("ns=2;i=6003"), None);
}

#[tokio::test]
async fn test_unsupported_write_value_fails_before_network_write() {
    let fx = fixture();

    let task = write_task(json!([{"node_id": 7001, "value": [1, 2, 3]}]));
    let (ok, report) = fx.runner.process(&task, "robot1").await;

    assert!(!ok);
    assert_eq!(report.message, "Error writing data from OPC UA");
    assert_eq!(fx.state.value("ns=2;i=7001"), None);
}

// =============================================================================
// Connection cache
// =============================================================================

#[tokio::test]
async fn test_connection_reused_across_tasks() {
    let fx = fixture();
    fx.state.set_value("ns=2;i=5001", AttrValue::Int32(42));

    let (ok, _) = fx.runner.process(&read_task(5001), "robot1").await;
    assert!(ok);
    let (ok, _) = fx.runner.process(&read_task(5001), "robot2").await;
    assert!(ok);

    assert_eq!(fx.state.connect_calls(), 1, "second task must reuse the cached entry");
    assert_eq!(fx.cache.len(), 1);
}

#[tokio::test]
async fn test_stale_cache_entry_triggers_reestablishment() {
    let fx = fixture();

    let (ok, _) = fx.runner.process(&read_task(5001), "robot1").await;
    assert!(ok);
    assert_eq!(fx.state.connect_calls(), 1);

    // Sever the cached connection; the next lookup must treat it as a miss
    // and re-establish, overwriting the stale entry.
    fx.cache.get(ENDPOINT).expect("entry should be live").close().await;
    assert!(fx.cache.get(ENDPOINT).is_none());

    let (ok, _) = fx.runner.process(&read_task(5001), "robot1").await;
    assert!(ok);
    assert_eq!(fx.state.connect_calls(), 2);
    assert_eq!(fx.cache.len(), 1, "replacement, not duplication");
}

// =============================================================================
// Establishment races
// =============================================================================

#[tokio::test]
async fn test_establish_times_out() {
    let fx = fixture();
    fx.state.hang_connect.store(true, Ordering::SeqCst);

    let request = request_with(json!({"connection_timeout": 0.2}));
    let mut cancel = fx.cancellations.token("robot1");

    let started = Instant::now();
    let err = establish(
        Arc::clone(&fx.connector) as Arc<dyn Connector>,
        &request,
        &fx.cache,
        &mut cancel,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ConnectionError::Timeout { .. }));
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(fx.cache.is_empty(), "no entry may be cached on failure");
}

#[tokio::test]
async fn test_establish_observes_cancellation() {
    let fx = fixture();
    fx.state.hang_connect.store(true, Ordering::SeqCst);

    let request = request_with(json!({"connection_timeout": 5.0}));
    let mut cancel = fx.cancellations.token("robot1");

    let cancellations = Arc::clone(&fx.cancellations);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancellations.cancel("robot1");
    });

    let started = Instant::now();
    let err = establish(
        Arc::clone(&fx.connector) as Arc<dyn Connector>,
        &request,
        &fx.cache,
        &mut cancel,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ConnectionError::Cancelled { .. }));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_no_matching_endpoint_is_terminal() {
    let fx = fixture();

    let task = json!({
        "description": {
            "connection": {
                "endpoint_url": ENDPOINT,
                "security_policy": "Basic256Sha256",
                "security_mode": "SignAndEncrypt",
            },
            "config": {"namespace_index": 2, "read": [{"node_id": 1}]},
        }
    });

    let (ok, report) = fx.runner.process(&task, "robot1").await;

    assert!(!ok);
    assert_eq!(report.message, "Unable to establish a connection to OPC UA server");
    assert_eq!(fx.state.discover_calls(), 1);
    assert_eq!(fx.state.connect_calls(), 0, "selection failure must not connect");
}

#[tokio::test]
async fn test_cancelled_establishment_reports_failure() {
    let fx = fixture();
    fx.state.hang_connect.store(true, Ordering::SeqCst);
    fx.cancellations.cancel("robot1");

    let (ok, report) = fx.runner.process(&read_task(5001), "robot1").await;

    assert!(!ok);
    assert_eq!(report.message, "Unable to establish a connection to OPC UA server");
}

// =============================================================================
// Reconnection loop
// =============================================================================

#[tokio::test]
async fn test_reconnect_aborts_immediately_when_cancelled() {
    let fx = fixture();
    let request = request_with(json!({"delay": 200}));
    let broken = mock_connection(&fx.state);

    fx.cancellations.cancel("robot1");
    let mut cancel = fx.cancellations.token("robot1");

    let started = Instant::now();
    let outcome = reconnect::run(
        Arc::clone(&fx.connector) as Arc<dyn Connector>,
        &request,
        &fx.cache,
        broken,
        &mut cancel,
        &fx.shutdown,
    )
    .await;

    assert!(matches!(
        outcome,
        ReconnectOutcome::Aborted(reconnect::AbortReason::Cancelled)
    ));
    // Exits within one retry-interval tick, with no connection attempt.
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(fx.state.connect_calls(), 0);
    assert_eq!(fx.state.discover_calls(), 0);
}

#[tokio::test]
async fn test_reconnect_aborts_on_shutdown() {
    let fx = fixture();
    let request = request_with(json!({"delay": 200}));
    let broken = mock_connection(&fx.state);

    fx.shutdown.trigger();
    let mut cancel = fx.cancellations.token("robot1");

    let outcome = reconnect::run(
        Arc::clone(&fx.connector) as Arc<dyn Connector>,
        &request,
        &fx.cache,
        broken,
        &mut cancel,
        &fx.shutdown,
    )
    .await;

    assert!(matches!(
        outcome,
        ReconnectOutcome::Aborted(reconnect::AbortReason::Shutdown)
    ));
    assert_eq!(fx.state.connect_calls(), 0);
}

#[tokio::test]
async fn test_reconnect_gives_up_at_deadline() {
    let fx = fixture();
    fx.state.fail_connect.store(true, Ordering::SeqCst);

    let request = request_with(json!({"delay": 100, "connection_timeout": 0.5}));
    let broken = mock_connection(&fx.state);
    let mut cancel = fx.cancellations.token("robot1");

    let outcome = reconnect::run(
        Arc::clone(&fx.connector) as Arc<dyn Connector>,
        &request,
        &fx.cache,
        broken,
        &mut cancel,
        &fx.shutdown,
    )
    .await;

    assert!(matches!(
        outcome,
        ReconnectOutcome::Aborted(reconnect::AbortReason::TimedOut)
    ));
    // Failed attempts are reported but not fatal; the loop kept trying
    // until the deadline.
    assert!(fx.state.connect_calls() >= 1);
}

#[tokio::test]
async fn test_midtask_connection_loss_reconnects_and_completes() {
    let fx = fixture();
    fx.state.set_value("ns=2;i=5001", AttrValue::Int32(1));
    fx.state.set_value("ns=2;i=5002", AttrValue::Int32(2));
    // First connection drops its link on the first operation.
    fx.state.pending_link_failures.store(1, Ordering::SeqCst);

    let task = json!({
        "description": {
            "connection": {"endpoint_url": ENDPOINT, "delay": 100},
            "config": {
                "namespace_index": 2,
                "read": [{"node_id": 5001}, {"node_id": 5002}],
            },
        }
    });

    let (ok, report) = fx.runner.process(&task, "robot1").await;

    assert!(ok, "task should survive mid-batch connection loss: {report:?}");
    let results = report.results.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].data.value, json!(1));
    assert_eq!(results[1].data.value, json!(2));
    assert_eq!(fx.state.connect_calls(), 2, "one initial connect plus one reconnect");
}
