// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `watch` command.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::info;
use uapool_opcua::{Operation, ReadRequest};

use super::{Output, write_outputs};
use crate::cli::{Cli, WatchArgs};
use crate::error::{BinError, BinResult};
use crate::runtime::Runtime;

/// Reads the nodes on an interval until shutdown or `--count` reads.
///
/// Read failures are logged and the next tick tries again; configuration
/// and validation errors end the command.
pub async fn watch(cli: &Cli, runtime: &Runtime, args: &WatchArgs, out: Output<'_>) -> BinResult<()> {
    let interval = args
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or(runtime.config().watch.interval);
    if interval.is_zero() {
        return Err(BinError::usage("watch interval must be positive"));
    }

    let operation = Operation::Read(ReadRequest::new(args.node_ids.clone()));
    operation.validate()?;

    let coordinator = runtime.shutdown_coordinator().clone();
    let signal_task = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.wait_for_shutdown().await }
    });

    info!(
        nodes = args.node_ids.len(),
        interval = ?interval,
        "Watching nodes"
    );

    let result = watch_loop(cli, runtime, args, &operation, interval, out).await;
    signal_task.abort();
    result
}

async fn watch_loop(
    cli: &Cli,
    runtime: &Runtime,
    args: &WatchArgs,
    operation: &Operation,
    interval: Duration,
    out: Output<'_>,
) -> BinResult<()> {
    let format = cli.effective_output_format(runtime.config().output.format);
    let signal = runtime.shutdown_coordinator().shutdown_signal().wait();
    tokio::pin!(signal);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut reads: u64 = 0;

    loop {
        tokio::select! {
            _ = &mut signal => {
                info!(reads, "Watch stopped");
                return Ok(());
            }
            _ = ticker.tick() => {
                match runtime.execute(&cli.credential, operation).await {
                    Ok(outputs) => write_outputs(out, &outputs, format)?,
                    Err(BinError::OpcUa(e)) if !e.is_validation() => e.log("watch"),
                    Err(e) => return Err(e),
                }

                reads += 1;
                if args.count.is_some_and(|count| reads >= count) {
                    return Ok(());
                }
            }
        }
    }
}
