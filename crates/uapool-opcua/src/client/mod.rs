// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client seam.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     OperationExecutor                           │
//! │                (read / write / method call)                     │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     ConnectionPool                              │
//! │            (keyed buckets of PooledConnection)                  │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │           ClientFactory → OpcUaClient → OpcUaSession            │
//! │          (mock doubles or the `real-transport` stack)           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod transport;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use transport::{CallResult, ClientFactory, OpcUaClient, OpcUaSession, ReadResult, StatusCode};

#[cfg(feature = "real-transport")]
pub use real_transport::RealClientFactory;
