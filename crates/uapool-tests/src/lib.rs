// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uapool Integration Tests
//!
//! Integration tests for the pooled OPC UA client, plus the in-memory
//! transport and fixtures they share.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Credentials and configuration documents
//!   - `mocks`: In-memory client factory, client and session
//!   - `assertions`: Assertion helpers for operation outputs
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p uapool-tests
//!
//! # Run specific test suite
//! cargo test -p uapool-tests --test integration_pool
//! cargo test -p uapool-tests --test integration_executor
//! cargo test -p uapool-tests --test integration_config
//! cargo test -p uapool-tests --test integration_cli
//!
//! # Run with verbose output
//! cargo test -p uapool-tests -- --nocapture
//! ```
//!
//! ## Test Categories
//!
//! ### Pool Tests (`integration_pool.rs`)
//! - Key isolation and reuse
//! - Capacity and forced sharing
//! - Eviction of invalid, failing and reconnecting sessions
//! - Shutdown and concurrent acquisition
//!
//! ### Executor Tests (`integration_executor.rs`)
//! - Read consolidation and partial failures
//! - Writes and method calls with coercion
//! - Validation ordering and error wrapping
//! - Connection tests
//!
//! ### Config Tests (`integration_config.rs`)
//! - Loading credentials and pool settings from files
//! - Environment overrides
//! - Pool construction from loaded settings
//!
//! ### CLI Tests (`integration_cli.rs`)
//! - `read`, `write`, `call`, `watch` and `test-connection` on a mock runtime
//! - Output formats and exit codes
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use uapool_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (server, executor) = mock_executor();
//!     server.set_value("ns=2;s=Speed", OpcUaValue::Double(12.5));
//!
//!     let output = executor
//!         .read(&CredentialFixtures::anonymous(), &ReadRequest::new("ns=2;s=Speed"))
//!         .await
//!         .unwrap();
//!     assert_status(&output, "Good");
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::assertions::*;
    pub use crate::common::fixtures::*;
    pub use crate::common::mocks::*;
    pub use crate::common::{init_test_logging, temp_test_dir};
}
