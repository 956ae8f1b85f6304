// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Integration tests for operation execution over the pool.
//!
//! Covers:
//! - Read consolidation, partial failures and data type reporting
//! - Variable writes with coercion
//! - Method calls
//! - Validation ordering and error wrapping
//! - Connection tests

use std::sync::Arc;

use serde_json::json;

use uapool_opcua::{
    CallMethodRequest, ConnectionCredential, MethodArgument, OpcUaValue, Operation,
    OperationExecutor, PoolConfig, ReadRequest, StatusCode, WriteVariableRequest, test_connection,
};
use uapool_tests::prelude::*;

fn executor() -> (Arc<MockServer>, OperationExecutor) {
    init_test_logging();
    mock_executor()
}

// =============================================================================
// Read
// =============================================================================

#[tokio::test]
async fn test_write_then_read_back() {
    let (server, executor) = executor();
    let credential = CredentialFixtures::anonymous();

    let written = executor
        .write_variable(
            &credential,
            &WriteVariableRequest::new("ns=2;s=Setpoint", "123.45", "Double"),
        )
        .await
        .unwrap();
    assert_status(&written, "ok");
    assert_eq!(written.address.as_deref(), Some("ns=2;s=Setpoint"));
    assert_meta(&written, "dataType", json!("Double"));
    assert_meta(&written, "operationType", json!("variable_write"));
    assert_meta(&written, "statusCode", json!("Good"));
    assert_eq!(server.value("ns=2;s=Setpoint"), Some(OpcUaValue::Double(123.45)));

    let read = executor
        .read(&credential, &ReadRequest::new("ns=2;s=Setpoint"))
        .await
        .unwrap();
    assert_status(&read, "Good");
    assert_metric(&read, "ns=2;s=Setpoint", json!(123.45));
    assert_meta(&read, "dataType", json!("Double"));
    assert_eq!(read.protocol, "opcua");
    assert_eq!(read.source, "uapool-opcua-pool");

    assert_eq!(server.clients_created(), 1);
}

#[tokio::test]
async fn test_read_many_nodes_in_one_request() {
    let (server, executor) = executor();
    server.set_value("ns=2;s=Speed", OpcUaValue::Double(12.5));
    server.set_value("ns=2;s=Running", OpcUaValue::Boolean(true));

    let output = executor
        .read(
            &CredentialFixtures::anonymous(),
            &ReadRequest::new(vec!["ns=2;s=Speed", "ns=2;s=Running"]),
        )
        .await
        .unwrap();

    assert_status(&output, "Good");
    assert_eq!(output.address.as_deref(), Some("2 nodes"));
    assert_metric(&output, "ns=2;s=Speed", json!(12.5));
    assert_metric(&output, "ns=2;s=Running", json!(true));
    assert_meta(&output, "nodeCount", json!(2));
    assert_meta(&output, "nodeIds", json!(["ns=2;s=Speed", "ns=2;s=Running"]));
    assert_meta(
        &output,
        "dataTypes",
        json!({"ns=2;s=Speed": "Double", "ns=2;s=Running": "Boolean"}),
    );
    assert_eq!(output.meta_value("errors"), None);
    assert_eq!(server.reads(), 1);
}

#[tokio::test]
async fn test_read_partial_failure() {
    let (server, executor) = executor();
    server.set_value("ns=2;s=Speed", OpcUaValue::Int32(1500));

    let output = executor
        .read(
            &CredentialFixtures::anonymous(),
            &ReadRequest::new(vec!["ns=2;s=Speed", "ns=2;s=Missing"]),
        )
        .await
        .unwrap();

    assert_status(&output, "Partial");
    assert_metric(&output, "ns=2;s=Speed", json!(1500));
    assert_metric(&output, "ns=2;s=Missing", json!(null));
    assert_meta(&output, "errors", json!({"ns=2;s=Missing": "BadNodeIdUnknown"}));
    assert_meta(&output, "dataTypes", json!({"ns=2;s=Speed": "Int32"}));
}

#[tokio::test]
async fn test_read_single_bad_node() {
    let (_server, executor) = executor();

    let output = executor
        .read(&CredentialFixtures::anonymous(), &ReadRequest::new("ns=2;s=Missing"))
        .await
        .unwrap();

    assert_status(&output, "BadNodeIdUnknown");
    assert_metric(&output, "ns=2;s=Missing", json!(null));
    assert_meta(&output, "error", json!("BadNodeIdUnknown"));
    assert_meta(&output, "dataType", json!(null));
}

#[tokio::test]
async fn test_read_good_sub_codes_are_not_success() {
    let (server, executor) = executor();
    for (node_id, bits) in [("ns=2;s=Clamped", 0x0030_0000), ("ns=2;s=NoData", 0x00A5_0000)] {
        server.set_value(node_id, OpcUaValue::Int32(5));
        server.set_status(node_id, StatusCode(bits));
    }

    let clamped = executor
        .read(&CredentialFixtures::anonymous(), &ReadRequest::new("ns=2;s=Clamped"))
        .await
        .unwrap();
    assert_status(&clamped, "GoodClamped");
    assert_metric(&clamped, "ns=2;s=Clamped", json!(null));
    assert_meta(&clamped, "error", json!("GoodClamped"));

    let both = executor
        .read(
            &CredentialFixtures::anonymous(),
            &ReadRequest::new(vec!["ns=2;s=Clamped", "ns=2;s=NoData"]),
        )
        .await
        .unwrap();
    assert_status(&both, "Partial");
    assert_meta(
        &both,
        "errors",
        json!({"ns=2;s=Clamped": "GoodClamped", "ns=2;s=NoData": "GoodNoData"}),
    );
}

#[tokio::test]
async fn test_read_keeps_status_names_outside_common_codes() {
    let (server, executor) = executor();
    server.set_status("ns=2;s=Nonce", StatusCode(0x8024_0000));
    server.set_status("ns=2;s=Vendor", StatusCode(0x80FF_0000));

    let nonce = executor
        .read(&CredentialFixtures::anonymous(), &ReadRequest::new("ns=2;s=Nonce"))
        .await
        .unwrap();
    assert_status(&nonce, "BadNonceInvalid");

    let vendor = executor
        .read(&CredentialFixtures::anonymous(), &ReadRequest::new("ns=2;s=Vendor"))
        .await
        .unwrap();
    assert_status(&vendor, "0x80FF0000");
    assert_meta(&vendor, "error", json!("0x80FF0000"));
}

#[tokio::test]
async fn test_read_renders_byte_strings_and_dates() {
    let (server, executor) = executor();
    let credential = CredentialFixtures::anonymous();
    server.set_value("ns=2;s=Blob", OpcUaValue::ByteString(vec![1, 2, 3]));

    executor
        .write_variable(
            &credential,
            &WriteVariableRequest::new("ns=2;s=Stamp", "2024-05-01T12:30:00Z", "DateTime"),
        )
        .await
        .unwrap();
    executor
        .write_variable(
            &credential,
            &WriteVariableRequest::new("ns=2;s=BadStamp", "not a date", "DateTime"),
        )
        .await
        .unwrap();

    let output = executor
        .read(
            &credential,
            &ReadRequest::new(vec!["ns=2;s=Blob", "ns=2;s=Stamp", "ns=2;s=BadStamp"]),
        )
        .await
        .unwrap();

    assert_metric(&output, "ns=2;s=Blob", json!("AQID"));
    assert_metric(&output, "ns=2;s=Stamp", json!("2024-05-01T12:30:00.000Z"));
    assert_metric(&output, "ns=2;s=BadStamp", json!(null));
}

#[tokio::test]
async fn test_read_failure_is_wrapped_and_connection_released() {
    let (server, executor) = executor();
    let credential = CredentialFixtures::anonymous();
    server.fail_read(true);

    let err = executor
        .read(&credential, &ReadRequest::new("ns=2;s=A"))
        .await
        .unwrap_err();
    assert_wrapped_error(&err, "Failed to read node values.", "BadCommunicationError");

    server.fail_read(false);
    server.set_value("ns=2;s=A", OpcUaValue::Int16(3));
    executor
        .read(&credential, &ReadRequest::new("ns=2;s=A"))
        .await
        .unwrap();

    assert_eq!(server.clients_created(), 1);
    assert_eq!(executor.pool().stats().reused(), 1);
}

// =============================================================================
// Write
// =============================================================================

#[tokio::test]
async fn test_write_coerces_integers() {
    let (server, executor) = executor();
    let credential = CredentialFixtures::anonymous();

    for (node, value, data_type) in [
        ("ns=2;s=Hex", "0x1F", "Int32"),
        ("ns=2;s=Prefix", "42abc", "Int16"),
        ("ns=2;s=Clamped", "300", "Byte"),
        ("ns=2;s=Flag", "yes", "Boolean"),
    ] {
        executor
            .write_variable(&credential, &WriteVariableRequest::new(node, value, data_type))
            .await
            .unwrap();
    }

    assert_eq!(server.value("ns=2;s=Hex"), Some(OpcUaValue::Int32(31)));
    assert_eq!(server.value("ns=2;s=Prefix"), Some(OpcUaValue::Int16(42)));
    assert_eq!(server.value("ns=2;s=Clamped"), Some(OpcUaValue::Byte(255)));
    assert_eq!(server.value("ns=2;s=Flag"), Some(OpcUaValue::Boolean(true)));
}

#[tokio::test]
async fn test_write_unknown_type_falls_back_to_string() {
    let (server, executor) = executor();

    let output = executor
        .write_variable(
            &CredentialFixtures::anonymous(),
            &WriteVariableRequest::new("ns=2;s=Label", "hello", "Widget"),
        )
        .await
        .unwrap();

    assert_meta(&output, "dataType", json!("String"));
    assert_eq!(
        server.value("ns=2;s=Label"),
        Some(OpcUaValue::String("hello".into()))
    );
}

#[tokio::test]
async fn test_write_failure_is_wrapped() {
    let (server, executor) = executor();
    server.fail_write(true);

    let err = executor
        .write_variable(
            &CredentialFixtures::anonymous(),
            &WriteVariableRequest::new("ns=2;s=A", "1", "Int32"),
        )
        .await
        .unwrap_err();

    assert_wrapped_error(
        &err,
        "Failed to execute operation on OPC UA node.",
        "BadCommunicationError",
    );
}

// =============================================================================
// Method Call
// =============================================================================

#[tokio::test]
async fn test_method_call() {
    let (_server, executor) = executor();
    let request = CallMethodRequest::new(
        "ns=2;s=Calculator",
        SUM_METHOD_ID,
        vec![
            MethodArgument::new("Double", "1.5"),
            MethodArgument::new("Int32", json!(2)),
        ],
    );

    let output = executor
        .call_method(&CredentialFixtures::anonymous(), &request)
        .await
        .unwrap();

    assert_status(&output, "ok");
    assert_eq!(output.address.as_deref(), Some(SUM_METHOD_ID));
    assert_metric(&output, "outputArguments", json!([3.5]));
    assert_meta(&output, "operationType", json!("method_call"));
    assert_meta(&output, "statusCode", json!("Good"));
    assert_meta(
        &output,
        "inputArguments",
        json!([
            {"dataType": "Double", "value": "1.5"},
            {"dataType": "Int32", "value": 2}
        ]),
    );
}

#[tokio::test]
async fn test_method_call_bad_status() {
    let (_server, executor) = executor();
    let request = CallMethodRequest::new("ns=2;s=Calculator", "ns=2;s=Missing", Vec::new());

    let output = executor
        .call_method(&CredentialFixtures::anonymous(), &request)
        .await
        .unwrap();

    assert_status(&output, "error");
    assert_metric(&output, "outputArguments", json!([]));
    assert_meta(&output, "statusCode", json!("BadMethodInvalid"));
}

// =============================================================================
// Validation and Errors
// =============================================================================

#[tokio::test]
async fn test_validation_runs_before_connecting() {
    let (server, executor) = executor();
    let credential = CredentialFixtures::anonymous();

    let err = executor
        .read(&credential, &ReadRequest::new(Vec::<String>::new()))
        .await
        .unwrap_err();
    assert_validation_error(&err, "At least one Node ID must be provided for reading.");

    let err = executor
        .write_variable(&credential, &WriteVariableRequest::new("ns=2;s=A", "1", ""))
        .await
        .unwrap_err();
    assert_validation_error(&err, "Node ID and Data Type are required for variable write.");

    let err = executor
        .call_method(&credential, &CallMethodRequest::new("ns=2;s=Obj", "", Vec::new()))
        .await
        .unwrap_err();
    assert_validation_error(
        &err,
        "Object Node ID and Method Node ID are required for method call.",
    );

    let err = executor
        .read(
            &ConnectionCredential::new("tcp://plc.local:4840"),
            &ReadRequest::new("ns=2;s=A"),
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = executor
        .read(&CredentialFixtures::x509_incomplete(), &ReadRequest::new("ns=2;s=A"))
        .await
        .unwrap_err();
    assert_validation_error(
        &err,
        "X509 authentication requires both certificate and private key.",
    );

    assert_eq!(server.clients_created(), 0);
}

#[tokio::test]
async fn test_connect_failure_is_wrapped() {
    let (server, executor) = executor();
    server.fail_connect(true);

    let err = executor
        .read(&CredentialFixtures::anonymous(), &ReadRequest::new("ns=2;s=A"))
        .await
        .unwrap_err();

    assert!(err.is_connection());
    assert_wrapped_error(
        &err,
        "Failed to connect or authenticate to OPC UA server.",
        "injected connect failure",
    );
}

#[tokio::test]
async fn test_parsed_operations() {
    let (server, executor) = executor();
    let credential = CredentialFixtures::anonymous();

    let err = Operation::parse("write", None, &json!({})).unwrap_err();
    assert_validation_error(&err, "Write operation must be specified.");

    let operations = vec![
        Operation::parse(
            "write",
            Some("writeVariable"),
            &json!({"nodeId": "ns=2;s=Count", "value": 7, "dataType": "UInt16"}),
        )
        .unwrap(),
        Operation::parse("read", None, &json!({"nodeIds": "ns=2;s=Count"})).unwrap(),
        Operation::parse(
            "write",
            Some("callMethod"),
            &json!({
                "objectNodeId": "ns=2;s=Calculator",
                "methodNodeId": SUM_METHOD_ID,
                "parameters": {"arguments": [{"dataType": "Float", "value": 0.5}]}
            }),
        )
        .unwrap(),
    ];

    let outputs = executor.execute_all(&credential, &operations).await.unwrap();

    assert_eq!(outputs.len(), 3);
    assert_meta(&outputs[0], "dataType", json!("UInt16"));
    assert_metric(&outputs[1], "ns=2;s=Count", json!(7));
    assert_metric(&outputs[2], "outputArguments", json!([0.5]));
    assert_eq!(server.clients_created(), 1);
}

#[tokio::test]
async fn test_custom_source() {
    init_test_logging();
    let (server, pool) = mock_pool(PoolConfig::default());
    let executor = OperationExecutor::new(pool).with_source("line-7-gateway");
    server.set_value("ns=2;s=A", OpcUaValue::Boolean(false));

    let output = executor
        .read(&CredentialFixtures::anonymous(), &ReadRequest::new("ns=2;s=A"))
        .await
        .unwrap();

    assert_eq!(output.source, "line-7-gateway");
    assert_eq!(executor.source(), "line-7-gateway");
}

// =============================================================================
// Connection Test
// =============================================================================

#[tokio::test]
async fn test_connection_test_success() {
    init_test_logging();
    let server = MockServer::new();
    let factory = server.factory();

    let result = test_connection(
        factory.as_ref(),
        Some(&CredentialFixtures::operator()),
        "line-7",
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(result.message, "Connection successful!");
    assert_eq!(server.client_options()[0].client_name, "line-7-credential-test");
    assert_eq!(server.sessions_closed(), 1);
    assert_eq!(server.disconnects(), 1);
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"status": "OK", "message": "Connection successful!"})
    );
}

#[tokio::test]
async fn test_connection_test_failures() {
    init_test_logging();
    let server = MockServer::new();
    let factory = server.factory();

    let result = test_connection(factory.as_ref(), None, "uapool").await;
    assert!(!result.is_ok());
    assert_eq!(result.message, "No credentials provided.");

    let result = test_connection(
        factory.as_ref(),
        Some(&ConnectionCredential::new("http://plc.local")),
        "uapool",
    )
    .await;
    assert!(result.message.starts_with("Endpoint URL must start with"));

    server.fail_session(true);
    let result = test_connection(
        factory.as_ref(),
        Some(&CredentialFixtures::operator()),
        "uapool",
    )
    .await;
    assert!(!result.is_ok());
    assert!(result.message.contains("BadIdentityTokenRejected"));
    assert_eq!(server.disconnects(), 1);
    assert_eq!(server.clients_created(), 1);
}
