// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Pooled OPC UA client sessions.
//!
//! This crate keeps a bounded set of authenticated OPC UA sessions per
//! endpoint and identity, and runs read, write and method-call operations on
//! them.
//!
//! # Features
//!
//! - Connection pool keyed by endpoint, authentication type and username
//! - Health probing before reuse, eviction of dead channels
//! - Batched reads with partial-failure reporting
//! - Variable writes and method calls with data type coercion
//! - Credential validation and one-shot connection tests
//! - `real-transport` feature: client factory on the `opcua` crate
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Validation    - Bad input, raised before any network attempt
//! ├── Connection    - Client, connect and session failures
//! ├── Operation     - Read / write / call failures
//! └── Configuration - Invalid settings values
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uapool_opcua::{ConnectionCredential, ConnectionPool, OperationExecutor, ReadRequest};
//!
//! let pool = Arc::new(ConnectionPool::new(factory));
//! let executor = OperationExecutor::new(pool.clone());
//!
//! let credential = ConnectionCredential::new("opc.tcp://localhost:4840");
//! let output = executor
//!     .read(&credential, &ReadRequest::new(vec!["ns=2;s=Speed", "ns=2;s=Load"]))
//!     .await?;
//! println!("{}", output.to_json());
//!
//! pool.shutdown().await;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod codec;
pub mod credential;
pub mod error;
pub mod executor;
pub mod output;
pub mod pool;
pub mod types;

// Re-export commonly used types
pub use error::{
    ConfigurationError, ConnectionError, ErrorCode, ErrorSeverity, OpcUaError, OpcUaResult,
    OperationError, ValidationError,
};

pub use types::{
    AuthenticationType, ClientOptions, ConnectionCredential, ConnectionCredentialBuilder,
    ConnectionStrategy, IdentityToken, PoolKey, SecurityMode, SecurityPolicy,
};

pub use client::{CallResult, ClientFactory, OpcUaClient, OpcUaSession, ReadResult, StatusCode};
pub use codec::{DataType, DateTimeValue, MethodArgument, OpcUaValue};
pub use credential::{
    CredentialTestResult, CredentialTestStatus, test_connection, validate_credential,
    validate_endpoint_url,
};
pub use executor::{
    CallMethodRequest, NodeIds, Operation, OperationExecutor, ReadRequest, WriteVariableRequest,
};
pub use output::ProtocolOutput;
pub use pool::{ConnectionLease, ConnectionPool, PoolConfig, PoolStats, PooledConnection};

#[cfg(feature = "real-transport")]
pub use client::RealClientFactory;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
