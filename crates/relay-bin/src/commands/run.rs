// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use relay_core::{CancellationRegistry, ShutdownSignal};
use relay_opcua::{ConnectionCache, Connector, RealConnector, TaskRunner};

use crate::cli::RunArgs;
use crate::error::{BinError, BinResult};
use crate::signals;

/// Executes the task description file against the device it names.
///
/// The file holds either a single task description object or an array of
/// them; arrays run sequentially, sharing the process-wide connection
/// cache so consecutive tasks against one device reuse the session.
pub async fn run(args: RunArgs) -> BinResult<()> {
    let raw = std::fs::read_to_string(&args.task_file)?;
    let parsed: Value = serde_json::from_str(&raw)?;

    let tasks: Vec<Value> = match parsed {
        Value::Array(tasks) => tasks,
        single => vec![single],
    };

    // Process-wide state, built once at the composition point.
    let shutdown = ShutdownSignal::new();
    signals::spawn_signal_handler(shutdown.clone());

    let connector: Arc<dyn Connector> = if args.trust_server_certs {
        Arc::new(RealConnector::trusting())
    } else {
        Arc::new(RealConnector::new())
    };

    let runner = TaskRunner::new(
        connector,
        Arc::new(ConnectionCache::new()),
        Arc::new(CancellationRegistry::new()),
        shutdown,
    );

    let mut failures = 0usize;
    for (index, task) in tasks.iter().enumerate() {
        info!(index, owner = %args.owner, "dispatching task");

        let (ok, report) = runner.process(task, &args.owner).await;
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);

        if !ok {
            failures += 1;
        }
    }

    if failures > 0 {
        return Err(BinError::TaskFailed(format!(
            "{failures} of {} task(s) failed",
            tasks.len()
        )));
    }

    Ok(())
}
