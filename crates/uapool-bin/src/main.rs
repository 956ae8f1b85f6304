// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! uapool - pooled OPC UA client
//!
//! Main binary entry point.

use uapool_bin::cli::Cli;
use uapool_bin::error::report_error_and_exit;
use uapool_bin::{commands, init_logging};
use uapool_config::{ConfigLoader, LoggingSettings};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    // Load errors are reported by the command itself.
    let settings = ConfigLoader::new()
        .load(&cli.config)
        .map(|config| config.logging)
        .unwrap_or_else(|_| LoggingSettings::default());
    init_logging(
        cli.effective_log_level(settings.level.as_str()),
        cli.effective_log_format(settings.format),
    );

    if let Err(e) = commands::execute(cli).await {
        report_error_and_exit(e);
    }
}
