// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use std::io::Write;

use super::Output;
use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(_cli: &Cli, out: Output<'_>) -> BinResult<()> {
    let enabled = |on: bool| if on { "enabled" } else { "disabled" };

    writeln!(out, "uapool - pooled OPC UA client")?;
    writeln!(out)?;
    writeln!(out, "Version Information:")?;
    writeln!(out, "  uapool-bin:    {}", crate::VERSION)?;
    writeln!(out, "  uapool-opcua:  {}", uapool_opcua::VERSION)?;
    writeln!(out, "  uapool-config: {}", uapool_config::VERSION)?;
    writeln!(out)?;
    writeln!(out, "Build Information:")?;
    writeln!(out, "  Rust Edition: 2024")?;
    writeln!(out, "  Target:       {}", std::env::consts::ARCH)?;
    writeln!(out, "  OS:           {}", std::env::consts::OS)?;
    writeln!(out)?;
    writeln!(out, "Features:")?;
    writeln!(
        out,
        "  Real Transport: {}",
        enabled(cfg!(feature = "real-transport"))
    )?;
    writeln!(out)?;
    writeln!(out, "License: PolyForm Noncommercial License 1.0.0")?;
    writeln!(out, "Copyright (c) 2025 Sylvex. All rights reserved.")?;

    Ok(())
}
