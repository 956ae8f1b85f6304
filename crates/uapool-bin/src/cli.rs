// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `read`: Read one or more node values
//! - `write`: Write a variable
//! - `call`: Call a method
//! - `watch`: Read nodes on an interval until interrupted
//! - `test-connection`: Probe an endpoint with a credential
//! - `validate`: Validate configuration file
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uapool_opcua::MethodArgument;

/// Default credential name.
pub const DEFAULT_CREDENTIAL: &str = "default";

// =============================================================================
// Main CLI Structure
// =============================================================================

/// uapool - pooled OPC UA client
///
/// Reads, writes and calls methods on OPC UA servers through a bounded pool
/// of authenticated sessions.
#[derive(Parser, Debug)]
#[command(
    name = "uapool",
    author = "Sylvex <contact@sylvex.io>",
    version = uapool_opcua::VERSION,
    about = "Pooled OPC UA client for read, write and method-call operations",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "uapool.yaml",
        env = "UAPOOL_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(short, long, env = "UAPOOL_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json, compact); defaults to the config file
    #[arg(long, env = "UAPOOL_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Name of the credential record to use
    #[arg(long, default_value = DEFAULT_CREDENTIAL, env = "UAPOOL_CREDENTIAL", global = true)]
    pub credential: String,

    /// Output rendering; defaults to the config file
    #[arg(short, long, global = true)]
    pub output: Option<OutputFormat>,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the uapool CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Read node values
    ///
    /// All node ids are read in one request and reported as one output.
    Read(ReadArgs),

    /// Write a variable
    ///
    /// The value is coerced to the declared data type before writing.
    Write(WriteArgs),

    /// Call a method
    Call(CallArgs),

    /// Read node values on an interval
    ///
    /// Runs until SIGINT/SIGTERM or until `--count` reads were made,
    /// reusing pooled sessions between reads.
    Watch(WatchArgs),

    /// Test the selected credential
    ///
    /// Connects, opens a session and closes it again without using the pool.
    #[command(name = "test-connection")]
    TestConnection,

    /// Validate the configuration file
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `read` command.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Node ids, e.g. `ns=2;s=Temperature`
    #[arg(required = true)]
    pub node_ids: Vec<String>,
}

/// Arguments for the `write` command.
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Node id of the variable
    pub node_id: String,

    /// Value as text
    pub value: String,

    /// Data type name, e.g. `Double` or `Int32`
    #[arg(short = 't', long)]
    pub data_type: String,
}

/// Arguments for the `call` command.
#[derive(Args, Debug, Clone)]
pub struct CallArgs {
    /// Node id of the object owning the method
    pub object_id: String,

    /// Node id of the method
    pub method_id: String,

    /// Input argument as `TYPE=VALUE`, repeatable
    #[arg(short, long = "arg", value_parser = parse_method_argument)]
    pub args: Vec<MethodArgument>,
}

/// Arguments for the `watch` command.
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Node ids to read
    #[arg(required = true)]
    pub node_ids: Vec<String>,

    /// Interval in milliseconds; defaults to the config file
    #[arg(short, long = "interval-ms")]
    pub interval_ms: Option<u64>,

    /// Stop after this many reads
    #[arg(short = 'n', long)]
    pub count: Option<u64>,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<uapool_config::LogFormat> for LogFormat {
    fn from(format: uapool_config::LogFormat) -> Self {
        match format {
            uapool_config::LogFormat::Text => Self::Text,
            uapool_config::LogFormat::Json => Self::Json,
            uapool_config::LogFormat::Compact => Self::Compact,
        }
    }
}

/// Rendering of operation outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Indented JSON
    #[default]
    Pretty,
    /// One compact JSON document per line
    Lines,
}

impl From<uapool_config::OutputFormat> for OutputFormat {
    fn from(format: uapool_config::OutputFormat) -> Self {
        match format {
            uapool_config::OutputFormat::Pretty => Self::Pretty,
            uapool_config::OutputFormat::Lines => Self::Lines,
        }
    }
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Check if verbose logging is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }

    /// Get the effective log level based on flags, falling back to `configured`.
    pub fn effective_log_level<'a>(&'a self, configured: &'a str) -> &'a str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            self.log_level.as_deref().unwrap_or(configured)
        }
    }

    /// Get the effective log format, falling back to `configured`.
    pub fn effective_log_format(&self, configured: uapool_config::LogFormat) -> LogFormat {
        self.log_format.unwrap_or_else(|| configured.into())
    }

    /// Get the effective output format, falling back to `configured`.
    pub fn effective_output_format(&self, configured: uapool_config::OutputFormat) -> OutputFormat {
        self.output.unwrap_or_else(|| configured.into())
    }
}

/// Parses `TYPE=VALUE` into a method argument.
pub fn parse_method_argument(raw: &str) -> Result<MethodArgument, String> {
    match raw.split_once('=') {
        Some((data_type, value)) if !data_type.trim().is_empty() => {
            Ok(MethodArgument::new(data_type.trim(), value))
        }
        _ => Err(format!("expected TYPE=VALUE, got '{}'", raw)),
    }
}

// =============================================================================
// Tests
// =============================================================================
