// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use serde_json::Value;

use relay_opcua::TaskRequest;

use crate::cli::ValidateArgs;
use crate::error::BinResult;

/// Parses and validates a task description file without touching the
/// network.
pub fn validate(args: &ValidateArgs) -> BinResult<()> {
    let raw = std::fs::read_to_string(&args.task_file)?;
    let parsed: Value = serde_json::from_str(&raw)?;

    let tasks: Vec<Value> = match parsed {
        Value::Array(tasks) => tasks,
        single => vec![single],
    };

    for (index, task) in tasks.iter().enumerate() {
        let request = TaskRequest::from_task(task)?;
        let operation = request
            .operation()
            .map(|op| op.name())
            .unwrap_or("none (invalid)");

        println!(
            "task {index}: endpoint={} operation={} items={}",
            request.endpoint_url,
            operation,
            request.read.len().max(request.write.len()),
        );
    }

    println!("{} task(s) valid", tasks.len());
    Ok(())
}
