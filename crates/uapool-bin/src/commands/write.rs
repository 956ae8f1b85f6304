// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `write` command.

use uapool_opcua::{Operation, WriteVariableRequest};

use super::{Output, run_operation};
use crate::cli::{Cli, WriteArgs};
use crate::error::BinResult;
use crate::runtime::Runtime;

/// Writes one variable.
pub async fn write(
    cli: &Cli,
    runtime: &Runtime,
    args: &WriteArgs,
    out: Output<'_>,
) -> BinResult<()> {
    let operation = Operation::WriteVariable(WriteVariableRequest::new(
        &args.node_id,
        &args.value,
        &args.data_type,
    ));
    run_operation(cli, runtime, operation, out).await
}
