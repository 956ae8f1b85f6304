// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `call` command.

use uapool_opcua::{CallMethodRequest, Operation};

use super::{Output, run_operation};
use crate::cli::{CallArgs, Cli};
use crate::error::BinResult;
use crate::runtime::Runtime;

/// Calls one method with the given input arguments.
pub async fn call(cli: &Cli, runtime: &Runtime, args: &CallArgs, out: Output<'_>) -> BinResult<()> {
    let operation = Operation::CallMethod(CallMethodRequest::new(
        &args.object_id,
        &args.method_id,
        args.args.clone(),
    ));
    run_operation(cli, runtime, operation, out).await
}
