// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Read, write and method-call operations over pooled sessions.
//!
//! Every operation validates its input and the credential first, borrows a
//! connection from the pool, runs exactly one protocol call and releases the
//! connection again, also when the call fails. Failures are reported in
//! three classes:
//!
//! - validation errors, before any connection is attempted
//! - `Failed to connect or authenticate to OPC UA server.` when no
//!   connection could be obtained
//! - `Failed to read node values.` or
//!   `Failed to execute operation on OPC UA node.` when the protocol call
//!   itself failed
//!
//! Non-`Good` status codes returned by the server are data, not errors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use tracing::debug;

use crate::client::{ReadResult, StatusCode};
use crate::codec::{self, MethodArgument, OpcUaValue};
use crate::credential::validate_credential;
use crate::error::{OpcUaError, OpcUaResult, OperationError, ValidationError};
use crate::output::{DEFAULT_SOURCE, ProtocolOutput};
use crate::pool::{ConnectionLease, ConnectionPool};
use crate::types::ConnectionCredential;

// =============================================================================
// Requests
// =============================================================================

/// One node id or a list of node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeIds {
    /// A single node id.
    One(String),
    /// Several node ids.
    Many(Vec<String>),
}

impl NodeIds {
    /// Returns the ids as a list.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(id) => vec![id],
            Self::Many(ids) => ids,
        }
    }
}

impl Default for NodeIds {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl From<&str> for NodeIds {
    fn from(id: &str) -> Self {
        Self::One(id.to_string())
    }
}

impl From<String> for NodeIds {
    fn from(id: String) -> Self {
        Self::One(id)
    }
}

impl From<Vec<String>> for NodeIds {
    fn from(ids: Vec<String>) -> Self {
        Self::Many(ids)
    }
}

impl From<Vec<&str>> for NodeIds {
    fn from(ids: Vec<&str>) -> Self {
        Self::Many(ids.into_iter().map(str::to_string).collect())
    }
}

/// Batched read of node values.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRequest {
    /// Nodes to read.
    #[serde(default)]
    pub node_ids: NodeIds,
}

impl ReadRequest {
    /// Creates a read request.
    pub fn new(node_ids: impl Into<NodeIds>) -> Self {
        Self {
            node_ids: node_ids.into(),
        }
    }

    /// Returns the normalized node list.
    ///
    /// Fails when the list is empty or its first entry is blank.
    pub fn validate(&self) -> OpcUaResult<Vec<String>> {
        let ids = self.node_ids.clone().into_vec();
        match ids.first() {
            Some(first) if !first.trim().is_empty() => Ok(ids),
            _ => Err(ValidationError::NoNodeIds.into()),
        }
    }
}

/// Write of one variable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteVariableRequest {
    /// Target node.
    pub node_id: String,
    /// Value in text form.
    #[serde(default)]
    pub value: String,
    /// Declared data type name.
    pub data_type: String,
}

impl WriteVariableRequest {
    /// Creates a write request.
    pub fn new(
        node_id: impl Into<String>,
        value: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            value: value.into(),
            data_type: data_type.into(),
        }
    }

    /// Checks that node id and data type are present.
    pub fn validate(&self) -> OpcUaResult<()> {
        if self.node_id.is_empty() || self.data_type.is_empty() {
            return Err(ValidationError::MissingWriteTarget.into());
        }
        Ok(())
    }
}

/// Call of a method on an object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMethodRequest {
    /// Object node.
    pub object_id: String,
    /// Method node.
    pub method_id: String,
    /// Input arguments.
    #[serde(default)]
    pub arguments: Vec<MethodArgument>,
}

impl CallMethodRequest {
    /// Creates a call request.
    pub fn new(
        object_id: impl Into<String>,
        method_id: impl Into<String>,
        arguments: Vec<MethodArgument>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            method_id: method_id.into(),
            arguments,
        }
    }

    /// Creates a call request from a free-form parameters value.
    ///
    /// Arguments are taken only from an object with an `arguments` array;
    /// any other shape yields no arguments.
    pub fn from_parameters(
        object_id: impl Into<String>,
        method_id: impl Into<String>,
        parameters: &JsonValue,
    ) -> Self {
        let arguments = match parameters.get("arguments") {
            Some(JsonValue::Array(items)) => items.iter().map(argument_from_json).collect(),
            _ => Vec::new(),
        };
        Self::new(object_id, method_id, arguments)
    }

    /// Checks that object and method ids are present.
    pub fn validate(&self) -> OpcUaResult<()> {
        if self.object_id.is_empty() || self.method_id.is_empty() {
            return Err(ValidationError::MissingMethodTarget.into());
        }
        Ok(())
    }
}

fn argument_from_json(item: &JsonValue) -> MethodArgument {
    let data_type = item
        .get("dataType")
        .and_then(JsonValue::as_str)
        .unwrap_or("String");
    let value = item.get("value").cloned().unwrap_or(JsonValue::Null);
    MethodArgument::new(data_type, value)
}

// =============================================================================
// Operation
// =============================================================================

/// A protocol operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Read one or more nodes.
    Read(ReadRequest),
    /// Write one variable.
    WriteVariable(WriteVariableRequest),
    /// Call one method.
    CallMethod(CallMethodRequest),
}

impl Operation {
    /// Builds an operation from its selectors and parameter object.
    ///
    /// `operation` is `read` or `write`; writes also need `write_operation`
    /// (`writeVariable` or `callMethod`). Parameters use the names
    /// `nodeIds`, `nodeId`, `value`, `dataType`, `objectNodeId`,
    /// `methodNodeId` and `parameters`.
    pub fn parse(
        operation: &str,
        write_operation: Option<&str>,
        parameters: &JsonValue,
    ) -> OpcUaResult<Self> {
        match operation {
            "read" => {
                let node_ids = parameters
                    .get("nodeIds")
                    .cloned()
                    .and_then(|value| serde_json::from_value::<NodeIds>(value).ok())
                    .unwrap_or_default();
                Ok(Self::Read(ReadRequest::new(node_ids)))
            }
            "write" => match write_operation.unwrap_or_default() {
                "" => Err(ValidationError::MissingWriteOperation.into()),
                "writeVariable" => Ok(Self::WriteVariable(WriteVariableRequest::new(
                    text_parameter(parameters, "nodeId"),
                    text_parameter(parameters, "value"),
                    text_parameter(parameters, "dataType"),
                ))),
                "callMethod" => Ok(Self::CallMethod(CallMethodRequest::from_parameters(
                    text_parameter(parameters, "objectNodeId"),
                    text_parameter(parameters, "methodNodeId"),
                    parameters.get("parameters").unwrap_or(&JsonValue::Null),
                ))),
                other => Err(ValidationError::UnsupportedOperation {
                    operation: other.to_string(),
                }
                .into()),
            },
            other => Err(ValidationError::InvalidOperation {
                operation: other.to_string(),
            }
            .into()),
        }
    }

    /// Returns the operation name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Read(_) => "read",
            Self::WriteVariable(_) => "writeVariable",
            Self::CallMethod(_) => "callMethod",
        }
    }

    /// Validates the request without touching the network.
    pub fn validate(&self) -> OpcUaResult<()> {
        match self {
            Self::Read(request) => request.validate().map(|_| ()),
            Self::WriteVariable(request) => request.validate(),
            Self::CallMethod(request) => request.validate(),
        }
    }
}

fn text_parameter(parameters: &JsonValue, name: &str) -> String {
    match parameters.get(name) {
        Some(JsonValue::String(s)) => s.clone(),
        None | Some(JsonValue::Null) => String::new(),
        Some(other) => other.to_string(),
    }
}

// =============================================================================
// OperationExecutor
// =============================================================================

/// Runs operations against pooled connections.
#[derive(Debug, Clone)]
pub struct OperationExecutor {
    pool: Arc<ConnectionPool>,
    source: String,
}

impl OperationExecutor {
    /// Creates an executor over a pool.
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            source: DEFAULT_SOURCE.to_string(),
        }
    }

    /// Sets the `source` written into outputs.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Returns the pool.
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Returns the output source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Runs one operation.
    pub async fn execute(
        &self,
        credential: &ConnectionCredential,
        operation: &Operation,
    ) -> OpcUaResult<Vec<ProtocolOutput>> {
        let output = match operation {
            Operation::Read(request) => self.read(credential, request).await?,
            Operation::WriteVariable(request) => self.write_variable(credential, request).await?,
            Operation::CallMethod(request) => self.call_method(credential, request).await?,
        };
        Ok(vec![output])
    }

    /// Runs operations in order, one output each, stopping at the first error.
    pub async fn execute_all(
        &self,
        credential: &ConnectionCredential,
        operations: &[Operation],
    ) -> OpcUaResult<Vec<ProtocolOutput>> {
        let mut outputs = Vec::with_capacity(operations.len());
        for operation in operations {
            outputs.extend(self.execute(credential, operation).await?);
        }
        Ok(outputs)
    }

    /// Reads all requested nodes in one call and consolidates the results.
    pub async fn read(
        &self,
        credential: &ConnectionCredential,
        request: &ReadRequest,
    ) -> OpcUaResult<ProtocolOutput> {
        let node_ids = request.validate()?;
        validate_credential(credential)?;

        let lease = self.lease(credential).await?;
        debug!(nodes = node_ids.len(), client = %lease.client_name(), "Reading nodes");

        let results = lease
            .session()
            .read(&node_ids)
            .await
            .map_err(OpcUaError::read_failed)?;

        read_output(&self.source, &node_ids, results).map_err(OpcUaError::read_failed)
    }

    /// Coerces and writes one value.
    pub async fn write_variable(
        &self,
        credential: &ConnectionCredential,
        request: &WriteVariableRequest,
    ) -> OpcUaResult<ProtocolOutput> {
        request.validate()?;
        validate_credential(credential)?;

        let lease = self.lease(credential).await?;

        let tag = codec::tag_for_name(&request.data_type);
        let value = codec::coerce(&request.value, &request.data_type);
        debug!(node_id = %request.node_id, data_type = %request.data_type, "Writing node");

        let status = lease
            .session()
            .write(&request.node_id, value.clone())
            .await
            .map_err(OpcUaError::execute_failed)?;

        let mut metrics = Map::new();
        metrics.insert(request.node_id.clone(), value.to_json());

        let mut meta = Map::new();
        meta.insert("dataType".into(), json!(codec::name_for_tag(Some(tag))));
        meta.insert("operationType".into(), json!("variable_write"));
        meta.insert("statusCode".into(), json!(status.name()));

        Ok(ProtocolOutput::new(&self.source)
            .with_address(&request.node_id)
            .with_metrics(metrics)
            .with_status(ok_or_error(status))
            .with_meta(meta))
    }

    /// Coerces the arguments and calls one method.
    pub async fn call_method(
        &self,
        credential: &ConnectionCredential,
        request: &CallMethodRequest,
    ) -> OpcUaResult<ProtocolOutput> {
        request.validate()?;
        validate_credential(credential)?;

        let lease = self.lease(credential).await?;

        let inputs: Vec<OpcUaValue> = request.arguments.iter().map(MethodArgument::coerce).collect();
        debug!(
            object_id = %request.object_id,
            method_id = %request.method_id,
            arguments = inputs.len(),
            "Calling method"
        );

        let result = lease
            .session()
            .call(&request.object_id, &request.method_id, inputs)
            .await
            .map_err(OpcUaError::execute_failed)?;

        let outputs: Vec<JsonValue> = result.output_arguments.iter().map(OpcUaValue::to_json).collect();
        let mut metrics = Map::new();
        metrics.insert("outputArguments".into(), JsonValue::Array(outputs));

        let mut meta = Map::new();
        meta.insert(
            "inputArguments".into(),
            serde_json::to_value(&request.arguments).unwrap_or(JsonValue::Null),
        );
        meta.insert("operationType".into(), json!("method_call"));
        meta.insert("statusCode".into(), json!(result.status.name()));

        Ok(ProtocolOutput::new(&self.source)
            .with_address(&request.method_id)
            .with_metrics(metrics)
            .with_status(ok_or_error(result.status))
            .with_meta(meta))
    }

    async fn lease(&self, credential: &ConnectionCredential) -> OpcUaResult<ConnectionLease<'_>> {
        self.pool.acquire(credential).await.map_err(|e| {
            e.log("connection acquisition");
            OpcUaError::acquire_failed(e)
        })
    }
}

fn ok_or_error(status: StatusCode) -> &'static str {
    if status.is_good() { "ok" } else { "error" }
}

/// Consolidates per-node read results into one output.
fn read_output(
    source: &str,
    node_ids: &[String],
    results: Vec<ReadResult>,
) -> OpcUaResult<ProtocolOutput> {
    if results.len() < node_ids.len() {
        return Err(OperationError::read_failed(format!(
            "expected {} results, received {}",
            node_ids.len(),
            results.len()
        ))
        .into());
    }

    let single = node_ids.len() == 1;
    let mut metrics = Map::new();
    let mut data_types = Map::new();
    let mut errors = Map::new();
    let mut overall = "Good".to_string();

    for (node_id, result) in node_ids.iter().zip(results) {
        if !result.is_good() {
            let status = result.status.to_string();
            metrics.insert(node_id.clone(), JsonValue::Null);
            errors.insert(node_id.clone(), json!(status));
            overall = if single { status } else { "Partial".to_string() };
            continue;
        }

        let value = result.value.as_ref().map_or(JsonValue::Null, OpcUaValue::to_json);
        metrics.insert(node_id.clone(), value);
        if let Some(name) = codec::name_for_tag(result.data_type_tag) {
            data_types.insert(node_id.clone(), json!(name));
        }
    }

    let mut meta = Map::new();
    let address = if single {
        let node_id = &node_ids[0];
        meta.insert(
            "dataType".into(),
            data_types.get(node_id).cloned().unwrap_or(JsonValue::Null),
        );
        if let Some(error) = errors.get(node_id) {
            meta.insert("error".into(), error.clone());
        }
        node_id.clone()
    } else {
        meta.insert("dataTypes".into(), JsonValue::Object(data_types));
        if !errors.is_empty() {
            meta.insert("errors".into(), JsonValue::Object(errors));
        }
        meta.insert("nodeCount".into(), json!(node_ids.len()));
        meta.insert("nodeIds".into(), json!(node_ids));
        format!("{} nodes", node_ids.len())
    };

    Ok(ProtocolOutput::new(source)
        .with_address(address)
        .with_metrics(metrics)
        .with_status(overall)
        .with_meta(meta))
}

// =============================================================================
// Tests
// =============================================================================
