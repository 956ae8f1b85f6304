// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Uniform output envelope produced by every operation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Protocol name carried in every output.
pub const PROTOCOL: &str = "opcua";

/// Default `source` of pooled outputs.
pub const DEFAULT_SOURCE: &str = "uapool-opcua-pool";

/// One operation result.
///
/// `metrics` maps data point names to values; `meta` carries operation
/// specific details such as data types and status codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolOutput {
    /// Unix time in milliseconds.
    pub timestamp: i64,
    /// Data source identifier.
    pub source: String,
    /// Always `opcua`.
    pub protocol: String,
    /// Node id, method id or `"N nodes"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Data points.
    pub metrics: Map<String, JsonValue>,
    /// Outcome, e.g. `Good`, `Partial`, `ok` or `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Extra metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, JsonValue>>,
}

impl ProtocolOutput {
    /// Creates an output stamped with the current time.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
            source: source.into(),
            protocol: PROTOCOL.to_string(),
            address: None,
            metrics: Map::new(),
            status: None,
            meta: None,
        }
    }

    /// Sets the address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the metrics.
    pub fn with_metrics(mut self, metrics: Map<String, JsonValue>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the metadata.
    pub fn with_meta(mut self, meta: Map<String, JsonValue>) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Returns a metric by name.
    pub fn metric(&self, name: &str) -> Option<&JsonValue> {
        self.metrics.get(name)
    }

    /// Returns a metadata entry by name.
    pub fn meta_value(&self, name: &str) -> Option<&JsonValue> {
        self.meta.as_ref().and_then(|meta| meta.get(name))
    }

    /// Converts to a JSON value.
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_shape() {
        let mut metrics = Map::new();
        metrics.insert("ns=1;s=A".into(), json!(1.5));

        let output = ProtocolOutput::new(DEFAULT_SOURCE)
            .with_address("ns=1;s=A")
            .with_metrics(metrics)
            .with_status("Good");

        let value = output.to_json();
        assert_eq!(value["protocol"], "opcua");
        assert_eq!(value["source"], "uapool-opcua-pool");
        assert_eq!(value["metrics"]["ns=1;s=A"], 1.5);
        assert!(value.get("meta").is_none());
        assert!(output.timestamp > 0);
    }

    #[test]
    fn test_meta_lookup() {
        let mut meta = Map::new();
        meta.insert("nodeCount".into(), json!(2));
        let output = ProtocolOutput::new("plc-1").with_meta(meta);

        assert_eq!(output.meta_value("nodeCount"), Some(&json!(2)));
        assert_eq!(output.meta_value("missing"), None);
        assert_eq!(output.metric("missing"), None);
    }
}
