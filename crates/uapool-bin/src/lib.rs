// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uapool-bin
//!
//! CLI binary for the pooled OPC UA client.
//!
//! - CLI argument parsing with clap
//! - Runtime bootstrap owning the process-wide connection pool
//! - Graceful shutdown handling
//! - Logging initialization
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────┐
//!                    │   main.rs   │
//!                    └──────┬──────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │   cli.rs    │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ runtime  │ │ logging  │
//!        └────┬─────┘ └────┬─────┘ └──────────┘
//!             │            │
//!             │     ┌──────▼──────────────────┐
//!             │     │ ConnectionPool          │
//!             │     │ OperationExecutor       │
//!             │     └─────────────────────────┘
//!             │
//!      ┌──────▼──────┐
//!      │  shutdown   │
//!      └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Read two nodes with the `default` credential
//! uapool read "ns=2;s=Temperature" "ns=2;s=Pressure"
//!
//! # Write a setpoint with another credential
//! uapool --credential plant write "ns=2;s=Setpoint" 42.5 -t Double
//!
//! # Call a method
//! uapool call "ns=2;s=Calculator" "ns=2;s=Add" --arg Int32=1 --arg Int32=2
//!
//! # Poll every second until Ctrl+C
//! uapool watch "ns=2;s=Temperature" --interval-ms 1000
//!
//! # Check a credential
//! uapool test-connection --credential plant
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{Runtime, RuntimeBuilder};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
