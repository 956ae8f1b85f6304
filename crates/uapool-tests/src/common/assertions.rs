// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Custom Assertions
//!
//! Assertion helpers for operation outputs and errors.

use serde_json::Value as JsonValue;
use uapool_opcua::{OpcUaError, ProtocolOutput};

/// Asserts the output status.
#[track_caller]
pub fn assert_status(output: &ProtocolOutput, expected: &str) {
    assert_eq!(
        output.status.as_deref(),
        Some(expected),
        "Unexpected status in output: {}",
        output.to_json()
    );
}

/// Asserts one metric value.
#[track_caller]
pub fn assert_metric(output: &ProtocolOutput, name: &str, expected: JsonValue) {
    assert_eq!(
        output.metric(name),
        Some(&expected),
        "Unexpected metric '{}' in output: {}",
        name,
        output.to_json()
    );
}

/// Asserts one metadata value.
#[track_caller]
pub fn assert_meta(output: &ProtocolOutput, name: &str, expected: JsonValue) {
    assert_eq!(
        output.meta_value(name),
        Some(&expected),
        "Unexpected meta '{}' in output: {}",
        name,
        output.to_json()
    );
}

/// Asserts a validation error with the given message.
#[track_caller]
pub fn assert_validation_error(error: &OpcUaError, message: &str) {
    assert!(error.is_validation(), "Expected validation error, got: {:?}", error);
    assert_eq!(error.to_string(), message);
}

/// Asserts an error whose outer message is `outer` and whose root cause
/// mentions `root`.
#[track_caller]
pub fn assert_wrapped_error(error: &OpcUaError, outer: &str, root: &str) {
    assert_eq!(error.to_string(), outer);
    let root_message = error.root_message();
    assert!(
        root_message.contains(root),
        "Root message '{}' does not mention '{}'",
        root_message,
        root
    );
}
