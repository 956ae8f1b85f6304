// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `test-connection` command.

use std::io::Write;

use super::Output;
use crate::cli::Cli;
use crate::error::{BinError, BinResult};
use crate::runtime::Runtime;

/// Probes the selected credential and prints `{status, message}`.
pub async fn test_connection(cli: &Cli, runtime: &Runtime, out: Output<'_>) -> BinResult<()> {
    let result = runtime.test_connection(&cli.credential).await;

    writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
    out.flush()?;

    if result.is_ok() {
        Ok(())
    } else {
        Err(BinError::ConnectionTest(result.message))
    }
}
