// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA Integration Tests
//!
//! The unit section runs against an in-memory transport. The server section
//! needs a running OPC UA server and the `real-transport` feature.
//!
//! # Environment Variables
//!
//! - `OPCUA_TEST_ENDPOINT`: OPC UA server endpoint (default: opc.tcp://localhost:4840)
//! - `OPCUA_TEST_NAMESPACE`: Namespace index for test nodes (default: 2)
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory tests
//! cargo test -p uapool-opcua --test opcua_integration
//!
//! # Server tests (requires simulator)
//! cargo test -p uapool-opcua --features real-transport --test opcua_integration -- --ignored
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;

use uapool_opcua::{
    CallMethodRequest, CallResult, ClientFactory, ClientOptions, ConnectionCredential,
    ConnectionPool, IdentityToken, MethodArgument, OpcUaClient, OpcUaResult, OpcUaSession,
    OpcUaValue, OperationExecutor, ReadRequest, ReadResult, StatusCode, WriteVariableRequest,
};

// =============================================================================
// Test Configuration
// =============================================================================

const DEFAULT_TEST_ENDPOINT: &str = "opc.tcp://localhost:4840";

#[allow(dead_code)]
const DEFAULT_TEST_NAMESPACE: u16 = 2;

fn test_endpoint() -> String {
    std::env::var("OPCUA_TEST_ENDPOINT").unwrap_or_else(|_| DEFAULT_TEST_ENDPOINT.to_string())
}

#[allow(dead_code)]
fn test_namespace() -> u16 {
    std::env::var("OPCUA_TEST_NAMESPACE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TEST_NAMESPACE)
}

// =============================================================================
// Echo Transport
// =============================================================================

/// Node store shared by every session of one factory.
#[derive(Default)]
struct EchoServer {
    values: RwLock<HashMap<String, OpcUaValue>>,
    clients: AtomicUsize,
}

struct EchoFactory(Arc<EchoServer>);

impl ClientFactory for EchoFactory {
    fn create(&self, _options: &ClientOptions) -> OpcUaResult<Box<dyn OpcUaClient>> {
        self.0.clients.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(EchoClient(Arc::clone(&self.0))))
    }
}

struct EchoClient(Arc<EchoServer>);

#[async_trait]
impl OpcUaClient for EchoClient {
    async fn connect(&self, _endpoint_url: &str) -> OpcUaResult<()> {
        Ok(())
    }

    async fn create_session(&self, _identity: IdentityToken) -> OpcUaResult<Arc<dyn OpcUaSession>> {
        Ok(Arc::new(EchoSession(Arc::clone(&self.0))))
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        Ok(())
    }
}

struct EchoSession(Arc<EchoServer>);

#[async_trait]
impl OpcUaSession for EchoSession {
    async fn read(&self, node_ids: &[String]) -> OpcUaResult<Vec<ReadResult>> {
        let values = self.0.values.read().unwrap();
        Ok(node_ids
            .iter()
            .map(|id| match values.get(id) {
                Some(value) => ReadResult::good(value.clone()),
                None => ReadResult::bad(StatusCode::BAD_NODE_ID_UNKNOWN),
            })
            .collect())
    }

    async fn write(&self, node_id: &str, value: OpcUaValue) -> OpcUaResult<StatusCode> {
        self.0
            .values
            .write()
            .unwrap()
            .insert(node_id.to_string(), value);
        Ok(StatusCode::GOOD)
    }

    async fn call(
        &self,
        _object_id: &str,
        method_id: &str,
        input_arguments: Vec<OpcUaValue>,
    ) -> OpcUaResult<CallResult> {
        if method_id != "ns=2;s=Sum" {
            return Ok(CallResult::new(StatusCode::BAD_METHOD_INVALID, Vec::new()));
        }
        let sum: f64 = input_arguments.iter().filter_map(OpcUaValue::as_f64).sum();
        Ok(CallResult::new(StatusCode::GOOD, vec![OpcUaValue::Double(sum)]))
    }

    async fn close(&self) -> OpcUaResult<()> {
        Ok(())
    }

    fn is_channel_valid(&self) -> OpcUaResult<bool> {
        Ok(true)
    }

    fn is_reconnecting(&self) -> bool {
        false
    }
}

fn executor() -> (Arc<EchoServer>, OperationExecutor) {
    let server = Arc::new(EchoServer::default());
    let pool = Arc::new(ConnectionPool::new(Arc::new(EchoFactory(Arc::clone(&server)))));
    (server, OperationExecutor::new(pool))
}

fn credential() -> ConnectionCredential {
    ConnectionCredential::new(test_endpoint())
}

// =============================================================================
// Unit Tests (No Server Required)
// =============================================================================

#[tokio::test]
async fn test_write_then_read_round_trip() {
    let (_server, executor) = executor();
    let cred = credential();

    let written = executor
        .write_variable(&cred, &WriteVariableRequest::new("ns=2;s=Setpoint", "123.45", "Double"))
        .await
        .unwrap();
    assert_eq!(written.status.as_deref(), Some("ok"));
    assert_eq!(written.meta_value("dataType"), Some(&json!("Double")));
    assert_eq!(written.meta_value("operationType"), Some(&json!("variable_write")));

    let read = executor
        .read(&cred, &ReadRequest::new("ns=2;s=Setpoint"))
        .await
        .unwrap();
    assert_eq!(read.metric("ns=2;s=Setpoint"), Some(&json!(123.45)));
    assert_eq!(read.status.as_deref(), Some("Good"));
}

#[tokio::test]
async fn test_connection_reused_across_operations() {
    let (server, executor) = executor();
    let cred = credential();

    for i in 0..4 {
        executor
            .write_variable(
                &cred,
                &WriteVariableRequest::new("ns=2;s=Counter", i.to_string(), "Int32"),
            )
            .await
            .unwrap();
    }

    assert_eq!(server.clients.load(Ordering::SeqCst), 1);
    assert_eq!(executor.pool().stats().reused(), 3);
}

#[tokio::test]
async fn test_method_call_output() {
    let (_server, executor) = executor();
    let request = CallMethodRequest::new(
        "ns=2;s=Calculator",
        "ns=2;s=Sum",
        vec![
            MethodArgument::new("Double", "1.5"),
            MethodArgument::new("Int32", json!(2)),
        ],
    );

    let output = executor.call_method(&credential(), &request).await.unwrap();

    assert_eq!(output.status.as_deref(), Some("ok"));
    assert_eq!(output.address.as_deref(), Some("ns=2;s=Sum"));
    assert_eq!(output.metric("outputArguments"), Some(&json!([3.5])));
    assert_eq!(output.meta_value("operationType"), Some(&json!("method_call")));
    assert_eq!(
        output.meta_value("inputArguments"),
        Some(&json!([
            {"dataType": "Double", "value": "1.5"},
            {"dataType": "Int32", "value": 2}
        ]))
    );
}

#[tokio::test]
async fn test_method_call_bad_status_is_data() {
    let (_server, executor) = executor();
    let request = CallMethodRequest::new("ns=2;s=Calculator", "ns=2;s=Missing", Vec::new());

    let output = executor.call_method(&credential(), &request).await.unwrap();

    assert_eq!(output.status.as_deref(), Some("error"));
    assert_eq!(output.meta_value("statusCode"), Some(&json!("BadMethodInvalid")));
}

#[tokio::test]
async fn test_validation_runs_before_connecting() {
    let (server, executor) = executor();

    let err = executor
        .read(&credential(), &ReadRequest::new(Vec::<String>::new()))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let bad_endpoint = ConnectionCredential::new("tcp://localhost:4840");
    let err = executor
        .read(&bad_endpoint, &ReadRequest::new("ns=2;s=A"))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    assert_eq!(server.clients.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Integration Tests (Requires OPC UA Simulator)
// =============================================================================

/// Reads the server's current time node through the real transport.
#[cfg(feature = "real-transport")]
#[tokio::test]
#[ignore = "Requires OPC UA simulator"]
async fn test_real_server_read_current_time() {
    let factory = Arc::new(uapool_opcua::RealClientFactory::new(
        std::env::temp_dir().join("uapool-test-pki"),
    ));
    let pool = Arc::new(ConnectionPool::new(factory));
    let executor = OperationExecutor::new(Arc::clone(&pool));

    let output = executor
        .read(&credential(), &ReadRequest::new("i=2258"))
        .await
        .expect("Failed to read from OPC UA server");

    assert_eq!(output.status.as_deref(), Some("Good"));
    assert_eq!(output.meta_value("dataType"), Some(&json!("DateTime")));

    pool.shutdown().await;
}

/// Writes and reads back a scalar on the simulator.
#[cfg(feature = "real-transport")]
#[tokio::test]
#[ignore = "Requires OPC UA simulator"]
async fn test_real_server_write_read() {
    let factory = Arc::new(uapool_opcua::RealClientFactory::new(
        std::env::temp_dir().join("uapool-test-pki"),
    ));
    let pool = Arc::new(ConnectionPool::new(factory));
    let executor = OperationExecutor::new(Arc::clone(&pool));
    let node = format!("ns={};s=Demo.Static.Scalar.Double", test_namespace());

    let written = executor
        .write_variable(&credential(), &WriteVariableRequest::new(&node, "42.5", "Double"))
        .await
        .expect("Failed to write");
    assert_eq!(written.status.as_deref(), Some("ok"));

    let read = executor
        .read(&credential(), &ReadRequest::new(node.as_str()))
        .await
        .expect("Failed to read");
    assert_eq!(read.metric(&node), Some(&json!(42.5)));

    pool.shutdown().await;
}
