// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` command.

use uapool_opcua::{Operation, ReadRequest};

use super::{Output, run_operation};
use crate::cli::{Cli, ReadArgs};
use crate::error::BinResult;
use crate::runtime::Runtime;

/// Reads all requested nodes in one request.
pub async fn read(cli: &Cli, runtime: &Runtime, args: &ReadArgs, out: Output<'_>) -> BinResult<()> {
    let operation = Operation::Read(ReadRequest::new(args.node_ids.clone()));
    run_operation(cli, runtime, operation, out).await
}
