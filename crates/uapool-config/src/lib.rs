// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uapool-config
//!
//! Configuration management for the uapool OPC UA client.
//!
//! ## Features
//!
//! - **Named Credentials**: Credential records keyed by name, validated on load
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Environment Overrides**: Override config values via environment variables
//! - **Placeholders**: `${VAR}` and `${VAR:default}` in any value
//!
//! ## Quick Start
//!
//! ```no_run
//! use uapool_config::loader::load_config;
//!
//! let config = load_config("uapool.yaml").unwrap();
//! let credential = config.credential("default").unwrap();
//!
//! println!("Endpoint: {}", credential.endpoint_url);
//! ```
//!
//! ## Configuration Schema
//!
//! - `credentials` - Named endpoint and authentication records
//! - `pool` - Connection pool capacity and client naming
//! - `output` - Output source and rendering
//! - `watch` - Interval of the `watch` command
//! - `logging` - Logging configuration
//!
//! Values in config files can reference environment variables:
//!
//! ```yaml
//! credentials:
//!   default:
//!     endpointUrl: "opc.tcp://${PLC_HOST:localhost}:4840"
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use schema::{
    AppConfig, LogFormat, LogLevel, LoggingSettings, OutputFormat, OutputSettings, PoolSettings,
    WatchSettings,
};

pub use loader::{
    ConfigFormat, ConfigLoader, ConfigLoaderBuilder, DEFAULT_ENV_PREFIX, load_config,
    load_config_str, parse_log_level,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

// =============================================================================
// Prelude
// =============================================================================

/// Convenience re-exports for common use cases.
pub mod prelude {
    pub use crate::error::{ConfigError, ConfigResult};
    pub use crate::loader::{ConfigLoader, load_config};
    pub use crate::schema::AppConfig;
}

// =============================================================================
// Tests
// =============================================================================
