// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol seam between the pool and an OPC UA client stack.
//!
//! The pool only needs a factory that builds clients, a client that can
//! connect and open sessions, and a session that can read, write, call and
//! report its health. Everything else about the stack stays behind these
//! traits, which keeps the pool testable with in-memory doubles.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::codec::{DataType, OpcUaValue};
use crate::error::OpcUaResult;
use crate::types::{ClientOptions, IdentityToken};

// =============================================================================
// Traits
// =============================================================================

/// Builds protocol clients from connection options.
pub trait ClientFactory: Send + Sync {
    /// Creates an unconnected client.
    fn create(&self, options: &ClientOptions) -> OpcUaResult<Box<dyn OpcUaClient>>;
}

/// A protocol client bound to one secure channel.
#[async_trait]
pub trait OpcUaClient: Send + Sync {
    /// Opens the secure channel to the endpoint.
    async fn connect(&self, endpoint_url: &str) -> OpcUaResult<()>;

    /// Creates and activates a session with the given identity.
    async fn create_session(&self, identity: IdentityToken) -> OpcUaResult<Arc<dyn OpcUaSession>>;

    /// Closes the secure channel.
    async fn disconnect(&self) -> OpcUaResult<()>;
}

/// An activated session.
///
/// `is_channel_valid` and `is_reconnecting` are synchronous so the pool can
/// probe and claim an entry without yielding in between.
#[async_trait]
pub trait OpcUaSession: Send + Sync {
    /// Reads the `Value` attribute of every node in one request.
    ///
    /// Results are returned in request order.
    async fn read(&self, node_ids: &[String]) -> OpcUaResult<Vec<ReadResult>>;

    /// Writes a value to the `Value` attribute of a node.
    async fn write(&self, node_id: &str, value: OpcUaValue) -> OpcUaResult<StatusCode>;

    /// Calls a method on an object.
    async fn call(
        &self,
        object_id: &str,
        method_id: &str,
        input_arguments: Vec<OpcUaValue>,
    ) -> OpcUaResult<CallResult>;

    /// Closes the session.
    async fn close(&self) -> OpcUaResult<()>;

    /// Returns whether the underlying channel is still usable.
    fn is_channel_valid(&self) -> OpcUaResult<bool>;

    /// Returns `true` while the session is re-establishing its channel.
    fn is_reconnecting(&self) -> bool;
}

// =============================================================================
// StatusCode
// =============================================================================

/// OPC UA status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// The `Good` status.
    pub const GOOD: Self = Self(0);
    /// `BadNodeIdUnknown`.
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);
    /// `BadNotWritable`.
    pub const BAD_NOT_WRITABLE: Self = Self(0x803B_0000);
    /// `BadTypeMismatch`.
    pub const BAD_TYPE_MISMATCH: Self = Self(0x8074_0000);
    /// `BadMethodInvalid`.
    pub const BAD_METHOD_INVALID: Self = Self(0x8075_0000);

    /// Returns the raw bits.
    #[inline]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns the code part with the info bits masked off.
    #[inline]
    pub const fn code(&self) -> u32 {
        self.0 & 0xFFFF_0000
    }

    /// Returns `true` only for the plain `Good` code.
    ///
    /// Good-severity sub-codes such as `GoodClamped` are not plain success.
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.code() == 0
    }

    /// Returns `true` for bad severity.
    #[inline]
    pub const fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Returns the symbolic name, if the code is in the table.
    pub fn known_name(&self) -> Option<&'static str> {
        let name = match self.code() {
            0x0000_0000 => "Good",

            0x002D_0000 => "GoodSubscriptionTransferred",
            0x002E_0000 => "GoodCompletesAsynchronously",
            0x002F_0000 => "GoodOverload",
            0x0030_0000 => "GoodClamped",
            0x0096_0000 => "GoodLocalOverride",
            0x00A2_0000 => "GoodEntryInserted",
            0x00A3_0000 => "GoodEntryReplaced",
            0x00A5_0000 => "GoodNoData",
            0x00A6_0000 => "GoodMoreData",
            0x00A7_0000 => "GoodCommunicationEvent",
            0x00A8_0000 => "GoodShutdownEvent",
            0x00A9_0000 => "GoodCallAgain",
            0x00AA_0000 => "GoodNonCriticalTimeout",
            0x00BA_0000 => "GoodResultsMayBeIncomplete",
            0x00D9_0000 => "GoodDataIgnored",
            0x00DC_0000 => "GoodEdited",
            0x00DD_0000 => "GoodPostActionFailed",

            0x406C_0000 => "UncertainReferenceOutOfServer",
            0x408F_0000 => "UncertainNoCommunicationLastUsableValue",
            0x4090_0000 => "UncertainLastUsableValue",
            0x4091_0000 => "UncertainSubstituteValue",
            0x4092_0000 => "UncertainInitialValue",
            0x4093_0000 => "UncertainSensorNotAccurate",
            0x4094_0000 => "UncertainEngineeringUnitsExceeded",
            0x4095_0000 => "UncertainSubNormal",
            0x40A4_0000 => "UncertainDataSubNormal",
            0x40BC_0000 => "UncertainReferenceNotDeleted",
            0x40C0_0000 => "UncertainNotAllNodesAvailable",

            0x8001_0000 => "BadUnexpectedError",
            0x8002_0000 => "BadInternalError",
            0x8003_0000 => "BadOutOfMemory",
            0x8004_0000 => "BadResourceUnavailable",
            0x8005_0000 => "BadCommunicationError",
            0x8006_0000 => "BadEncodingError",
            0x8007_0000 => "BadDecodingError",
            0x8008_0000 => "BadEncodingLimitsExceeded",
            0x800A_0000 => "BadTimeout",
            0x800B_0000 => "BadServiceUnsupported",
            0x800C_0000 => "BadShutdown",
            0x800D_0000 => "BadServerNotConnected",
            0x800E_0000 => "BadServerHalted",
            0x800F_0000 => "BadNothingToDo",
            0x8010_0000 => "BadTooManyOperations",
            0x8011_0000 => "BadDataTypeIdUnknown",
            0x8012_0000 => "BadCertificateInvalid",
            0x8013_0000 => "BadSecurityChecksFailed",
            0x8014_0000 => "BadCertificateTimeInvalid",
            0x8015_0000 => "BadCertificateIssuerTimeInvalid",
            0x8016_0000 => "BadCertificateHostNameInvalid",
            0x8017_0000 => "BadCertificateUriInvalid",
            0x8018_0000 => "BadCertificateUseNotAllowed",
            0x8019_0000 => "BadCertificateIssuerUseNotAllowed",
            0x801A_0000 => "BadCertificateUntrusted",
            0x801B_0000 => "BadCertificateRevocationUnknown",
            0x801C_0000 => "BadCertificateIssuerRevocationUnknown",
            0x801D_0000 => "BadCertificateRevoked",
            0x801E_0000 => "BadCertificateIssuerRevoked",
            0x801F_0000 => "BadUserAccessDenied",
            0x8020_0000 => "BadIdentityTokenInvalid",
            0x8021_0000 => "BadIdentityTokenRejected",
            0x8022_0000 => "BadSecureChannelIdInvalid",
            0x8023_0000 => "BadInvalidTimestamp",
            0x8024_0000 => "BadNonceInvalid",
            0x8025_0000 => "BadSessionIdInvalid",
            0x8026_0000 => "BadSessionClosed",
            0x8027_0000 => "BadSessionNotActivated",
            0x8028_0000 => "BadSubscriptionIdInvalid",
            0x8033_0000 => "BadNodeIdInvalid",
            0x8034_0000 => "BadNodeIdUnknown",
            0x8035_0000 => "BadAttributeIdInvalid",
            0x8036_0000 => "BadIndexRangeInvalid",
            0x8037_0000 => "BadIndexRangeNoData",
            0x8038_0000 => "BadDataEncodingInvalid",
            0x8039_0000 => "BadDataEncodingUnsupported",
            0x803A_0000 => "BadNotReadable",
            0x803B_0000 => "BadNotWritable",
            0x803C_0000 => "BadOutOfRange",
            0x803D_0000 => "BadNotSupported",
            0x803E_0000 => "BadNotFound",
            0x803F_0000 => "BadObjectDeleted",
            0x8040_0000 => "BadNotImplemented",
            0x8074_0000 => "BadTypeMismatch",
            0x8075_0000 => "BadMethodInvalid",
            0x8076_0000 => "BadArgumentsMissing",
            0x80AB_0000 => "BadInvalidArgument",
            0x80AE_0000 => "BadConnectionClosed",
            0x80AF_0000 => "BadInvalidState",
            0x80E5_0000 => "BadTooManyArguments",
            _ => return None,
        };
        Some(name)
    }

    /// Returns the symbolic name, or the raw bits as `0xXXXXXXXX` for codes
    /// outside the table.
    pub fn name(&self) -> Cow<'static, str> {
        match self.known_name() {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("0x{:08X}", self.0)),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<u32> for StatusCode {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl Serialize for StatusCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

// =============================================================================
// Results
// =============================================================================

/// Result of reading one node.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    /// Status of the read.
    pub status: StatusCode,
    /// Value, if the server returned one.
    pub value: Option<OpcUaValue>,
    /// Wire type tag reported with the value.
    pub data_type_tag: Option<u32>,
}

impl ReadResult {
    /// Creates a good result for a value, tagged with its own data type.
    pub fn good(value: OpcUaValue) -> Self {
        let data_type_tag = (!value.is_null()).then(|| value.data_type().tag());
        Self {
            status: StatusCode::GOOD,
            value: Some(value),
            data_type_tag,
        }
    }

    /// Creates a result without a value.
    pub fn bad(status: StatusCode) -> Self {
        Self {
            status,
            value: None,
            data_type_tag: None,
        }
    }

    /// Overrides the reported wire type tag.
    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type_tag = Some(data_type.tag());
        self
    }

    /// Returns `true` if the status is exactly `Good`.
    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }
}

/// Result of a method call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    /// Status of the call.
    pub status: StatusCode,
    /// Output arguments.
    pub output_arguments: Vec<OpcUaValue>,
}

impl CallResult {
    /// Creates a call result.
    pub fn new(status: StatusCode, output_arguments: Vec<OpcUaValue>) -> Self {
        Self {
            status,
            output_arguments,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_names() {
        assert_eq!(StatusCode::GOOD.name(), "Good");
        assert_eq!(StatusCode::BAD_NODE_ID_UNKNOWN.name(), "BadNodeIdUnknown");
        assert_eq!(StatusCode::BAD_NOT_WRITABLE.to_string(), "BadNotWritable");
        assert_eq!(StatusCode(0x0030_0000).name(), "GoodClamped");
        assert_eq!(StatusCode(0x8024_0000).name(), "BadNonceInvalid");
        assert_eq!(StatusCode(0x80FF_0000).name(), "0x80FF0000");
        assert_eq!(StatusCode(0x40FF_0000).name(), "0x40FF0000");
        assert_eq!(StatusCode(0x80FF_0000).known_name(), None);
    }

    #[test]
    fn test_status_code_severity() {
        assert!(StatusCode::GOOD.is_good());
        assert!(StatusCode(0x0000_0400).is_good());
        assert!(!StatusCode(0x0030_0000).is_good());
        assert!(!StatusCode(0x00A5_0000).is_good());
        assert!(!StatusCode::BAD_TYPE_MISMATCH.is_good());
        assert!(StatusCode::BAD_TYPE_MISMATCH.is_bad());
        assert!(!StatusCode(0x4090_0000).is_good());
        assert!(!StatusCode(0x4090_0000).is_bad());
    }

    #[test]
    fn test_read_result_tags_value_type() {
        let result = ReadResult::good(OpcUaValue::Double(1.5));
        assert!(result.is_good());
        assert_eq!(result.data_type_tag, Some(11));

        let empty = ReadResult::good(OpcUaValue::Null);
        assert_eq!(empty.data_type_tag, None);

        let bad = ReadResult::bad(StatusCode::BAD_NODE_ID_UNKNOWN);
        assert!(!bad.is_good());
        assert!(bad.value.is_none());
    }

    #[test]
    fn test_status_code_serializes_as_name() {
        let json = serde_json::to_string(&StatusCode::BAD_NODE_ID_UNKNOWN).unwrap();
        assert_eq!(json, "\"BadNodeIdUnknown\"");
    }
}
