// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `read`, `write`, `call`: one pooled operation each
//! - `watch`: repeated reads until interrupted
//! - `test-connection`: credential probe outside the pool
//! - `validate`: configuration check
//! - `version`: version information

mod call;
mod read;
mod test_connection;
mod validate;
mod version;
mod watch;
mod write;

pub use call::call;
pub use read::read;
pub use test_connection::test_connection;
pub use validate::validate;
pub use version::version;
pub use watch::watch;
pub use write::write;

use std::io::Write;

use uapool_opcua::ProtocolOutput;

use crate::cli::{Cli, Commands, OutputFormat};
use crate::error::BinResult;
use crate::runtime::{Runtime, RuntimeBuilder};

/// Output sink of the commands.
pub type Output<'a> = &'a mut (dyn Write + Send);

/// Executes the command selected on the command line, writing to stdout.
pub async fn execute(cli: Cli) -> BinResult<()> {
    let mut stdout = std::io::stdout();

    match &cli.command {
        Commands::Validate(args) => validate::validate(&cli, args, &mut stdout),
        Commands::Version => version::version(&cli, &mut stdout),
        _ => {
            let runtime = RuntimeBuilder::new().config_path(&cli.config).build()?;
            execute_with(&cli, runtime, &mut stdout).await
        }
    }
}

/// Executes a pool-backed command on the given runtime.
///
/// The pool is shut down afterwards whether or not the command succeeded.
pub async fn execute_with(cli: &Cli, runtime: Runtime, out: Output<'_>) -> BinResult<()> {
    let result = match &cli.command {
        Commands::Read(args) => read::read(cli, &runtime, args, out).await,
        Commands::Write(args) => write::write(cli, &runtime, args, out).await,
        Commands::Call(args) => call::call(cli, &runtime, args, out).await,
        Commands::Watch(args) => watch::watch(cli, &runtime, args, out).await,
        Commands::TestConnection => test_connection::test_connection(cli, &runtime, out).await,
        Commands::Validate(args) => validate::validate(cli, args, out),
        Commands::Version => version::version(cli, out),
    };

    runtime.shutdown().await;
    result
}

/// Writes operation outputs in the requested format.
pub fn write_outputs(
    out: Output<'_>,
    outputs: &[ProtocolOutput],
    format: OutputFormat,
) -> BinResult<()> {
    for output in outputs {
        let rendered = match format {
            OutputFormat::Pretty => serde_json::to_string_pretty(output)?,
            OutputFormat::Lines => serde_json::to_string(output)?,
        };
        writeln!(out, "{}", rendered)?;
    }
    out.flush()?;
    Ok(())
}

/// Runs one operation and prints its outputs.
async fn run_operation(
    cli: &Cli,
    runtime: &Runtime,
    operation: uapool_opcua::Operation,
    out: Output<'_>,
) -> BinResult<()> {
    let outputs = runtime.execute(&cli.credential, &operation).await?;
    let format = cli.effective_output_format(runtime.config().output.format);
    write_outputs(out, &outputs, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_outputs_lines() {
        let outputs = vec![
            ProtocolOutput::new("a").with_status("ok"),
            ProtocolOutput::new("b").with_status("error"),
        ];
        let mut buffer = Vec::new();

        write_outputs(&mut buffer, &outputs, OutputFormat::Lines).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["source"], "a");
        assert_eq!(first["protocol"], "opcua");
    }

    #[test]
    fn test_write_outputs_pretty() {
        let outputs = vec![ProtocolOutput::new("a")];
        let mut buffer = Vec::new();

        write_outputs(&mut buffer, &outputs, OutputFormat::Pretty).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.lines().count() > 1);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["source"], "a");
    }
}
