// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for pooled OPC UA operations.
//!
//! Every fatal error carries a message that tells the caller which class of
//! failure happened, so a workflow can tell a bad request apart from an
//! unreachable server or a failing node operation.
//!
//! # Error Categories
//!
//! ```text
//! OpcUaError
//! ├── Validation    - Missing or malformed input, raised before any network I/O
//! ├── Connection    - Client construction, connect and session activation
//! ├── Operation     - Read / write / call failures on an acquired session
//! └── Configuration - Invalid settings values
//! ```
//!
//! Protocol status codes that are not `Good` are *not* errors. They are
//! reported as data in the operation output.
//!
//! # Examples
//!
//! ```
//! use uapool_opcua::error::{ConnectionError, OpcUaError};
//!
//! let error = OpcUaError::connection(ConnectionError::refused(
//!     "opc.tcp://localhost:4840",
//!     "connection reset",
//! ));
//!
//! assert_eq!(error.category(), "connection");
//! assert!(error.is_retryable());
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

// =============================================================================
// OpcUaError - Main Error Type
// =============================================================================

/// The main error type for pooled OPC UA operations.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// Input validation errors.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Connection and authentication errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Read / write / call errors.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl OpcUaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a validation error.
    #[inline]
    pub fn validation(error: ValidationError) -> Self {
        Self::Validation(error)
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates an operation error.
    #[inline]
    pub fn operation(error: OperationError) -> Self {
        Self::Operation(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Wraps an acquisition failure as "failed to connect or authenticate".
    pub fn acquire_failed(source: OpcUaError) -> Self {
        Self::Connection(ConnectionError::AcquireFailed {
            source: Box::new(source),
        })
    }

    /// Wraps a read failure as "failed to read node values".
    pub fn read_failed(source: OpcUaError) -> Self {
        Self::Operation(OperationError::ReadNodes {
            source: Box::new(source),
        })
    }

    /// Wraps a write or call failure as "failed to execute operation".
    pub fn execute_failed(source: OpcUaError) -> Self {
        Self::Operation(OperationError::Execute {
            source: Box::new(source),
        })
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns `true` if this is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` if this is an operation error.
    pub fn is_operation(&self) -> bool {
        matches!(self, Self::Operation(_))
    }

    /// Returns `true` if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Operation(e) => e.is_retryable(),
            Self::Validation(_) | Self::Configuration(_) => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Validation(_) => ErrorSeverity::Warning,
            Self::Connection(e) => e.severity(),
            Self::Operation(_) => ErrorSeverity::Error,
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Connection(_) => "connection",
            Self::Operation(_) => "operation",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Validation(e) => e.error_code(),
            Self::Connection(e) => e.error_code(),
            Self::Operation(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                "{self}"
            ),
        }
    }

    /// Returns the message of the innermost error in the cause chain.
    pub fn root_message(&self) -> String {
        let mut current: &dyn std::error::Error = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current.to_string()
    }
}

// =============================================================================
// ValidationError
// =============================================================================

/// Errors raised before any network attempt is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No credential record was supplied.
    #[error("No credentials provided.")]
    MissingCredential,

    /// Endpoint URL is empty.
    #[error("Endpoint URL is required and cannot be empty.")]
    EmptyEndpoint,

    /// Endpoint URL has an unrecognized scheme.
    #[error("Endpoint URL must start with opc.tcp:// or opc.https://. Received: \"{url}\"")]
    InvalidEndpointScheme {
        /// The rejected URL.
        url: String,
    },

    /// X509 authentication without certificate or private key.
    #[error("X509 authentication requires both certificate and private key.")]
    IncompleteX509,

    /// Username/password authentication without a username.
    #[error("Username is required for usernamePassword authentication.")]
    MissingUsername,

    /// Read request without node identifiers.
    #[error("At least one Node ID must be provided for reading.")]
    NoNodeIds,

    /// Variable write without node id or data type.
    #[error("Node ID and Data Type are required for variable write.")]
    MissingWriteTarget,

    /// Write request without a write sub-operation.
    #[error("Write operation must be specified.")]
    MissingWriteOperation,

    /// Method call without object or method node id.
    #[error("Object Node ID and Method Node ID are required for method call.")]
    MissingMethodTarget,

    /// Unknown write sub-operation.
    #[error("Unsupported operation type.")]
    UnsupportedOperation {
        /// The rejected selector.
        operation: String,
    },

    /// Unknown top-level operation.
    #[error("Invalid operation selected.")]
    InvalidOperation {
        /// The rejected selector.
        operation: String,
    },
}

impl ValidationError {
    /// Creates an invalid endpoint scheme error.
    pub fn invalid_scheme(url: impl Into<String>) -> Self {
        Self::InvalidEndpointScheme { url: url.into() }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingCredential => ErrorCode::new(1, 1),
            Self::EmptyEndpoint => ErrorCode::new(1, 2),
            Self::InvalidEndpointScheme { .. } => ErrorCode::new(1, 3),
            Self::IncompleteX509 => ErrorCode::new(1, 4),
            Self::MissingUsername => ErrorCode::new(1, 5),
            Self::NoNodeIds => ErrorCode::new(1, 6),
            Self::MissingWriteTarget => ErrorCode::new(1, 7),
            Self::MissingMethodTarget => ErrorCode::new(1, 8),
            Self::UnsupportedOperation { .. } => ErrorCode::new(1, 9),
            Self::InvalidOperation { .. } => ErrorCode::new(1, 10),
            Self::MissingWriteOperation => ErrorCode::new(1, 11),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Connection and session activation errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The protocol client could not be constructed.
    #[error("Failed to build OPC UA client: {reason}")]
    ClientBuild {
        /// Reason.
        reason: String,
    },

    /// Connection refused or dropped while connecting.
    #[error("Connection refused to '{endpoint}': {reason}")]
    Refused {
        /// Target endpoint.
        endpoint: String,
        /// Reason.
        reason: String,
    },

    /// Connection timed out.
    #[error("Connection timed out to '{endpoint}' after {duration:?}")]
    TimedOut {
        /// Target endpoint.
        endpoint: String,
        /// Timeout duration.
        duration: Duration,
    },

    /// No endpoint on the server matches the requested security settings.
    #[error("No suitable endpoint found with security '{security}'")]
    NoSuitableEndpoint {
        /// Requested policy and mode.
        security: String,
    },

    /// Session creation or activation was rejected.
    #[error("Failed to create session on '{endpoint}': {reason}")]
    SessionRejected {
        /// Target endpoint.
        endpoint: String,
        /// Reason.
        reason: String,
    },

    /// The client is not connected.
    #[error("Not connected to OPC UA server")]
    NotConnected,

    /// The pool was shut down while this connection was being opened.
    #[error("Connection pool shut down while connecting to '{endpoint}'")]
    PoolShutDown {
        /// Target endpoint.
        endpoint: String,
    },

    /// Acquiring a pooled connection failed.
    #[error("Failed to connect or authenticate to OPC UA server.")]
    AcquireFailed {
        /// Underlying error.
        #[source]
        source: Box<OpcUaError>,
    },
}

impl ConnectionError {
    /// Creates a client build error.
    pub fn client_build(reason: impl Into<String>) -> Self {
        Self::ClientBuild {
            reason: reason.into(),
        }
    }

    /// Creates a connection refused error.
    pub fn refused(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates a connection timed out error.
    pub fn timed_out(endpoint: impl Into<String>, duration: Duration) -> Self {
        Self::TimedOut {
            endpoint: endpoint.into(),
            duration,
        }
    }

    /// Creates a no suitable endpoint error.
    pub fn no_suitable_endpoint(security: impl Into<String>) -> Self {
        Self::NoSuitableEndpoint {
            security: security.into(),
        }
    }

    /// Creates a session rejected error.
    pub fn session_rejected(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SessionRejected {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Refused { .. }
            | Self::TimedOut { .. }
            | Self::NotConnected
            | Self::PoolShutDown { .. } => true,
            Self::AcquireFailed { source } => source.is_retryable(),
            Self::ClientBuild { .. }
            | Self::NoSuitableEndpoint { .. }
            | Self::SessionRejected { .. } => false,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected | Self::TimedOut { .. } | Self::PoolShutDown { .. } => {
                ErrorSeverity::Warning
            }
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ClientBuild { .. } => ErrorCode::new(2, 1),
            Self::Refused { .. } => ErrorCode::new(2, 2),
            Self::TimedOut { .. } => ErrorCode::new(2, 3),
            Self::NoSuitableEndpoint { .. } => ErrorCode::new(2, 4),
            Self::SessionRejected { .. } => ErrorCode::new(2, 5),
            Self::NotConnected => ErrorCode::new(2, 6),
            Self::AcquireFailed { .. } => ErrorCode::new(2, 7),
            Self::PoolShutDown { .. } => ErrorCode::new(2, 8),
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Errors raised while running an operation on an acquired session.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Batched read failed.
    #[error("Read failed: {message}")]
    ReadFailed {
        /// Error message.
        message: String,
    },

    /// Write failed.
    #[error("Write failed for node '{node_id}': {message}")]
    WriteFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Method call failed.
    #[error("Call failed for method '{method_id}': {message}")]
    CallFailed {
        /// Method node ID.
        method_id: String,
        /// Error message.
        message: String,
    },

    /// Session close failed.
    #[error("Failed to close session: {message}")]
    CloseFailed {
        /// Error message.
        message: String,
    },

    /// The channel health probe failed.
    #[error("Channel health probe failed: {message}")]
    ChannelProbe {
        /// Error message.
        message: String,
    },

    /// A node identifier could not be understood by the protocol stack.
    #[error("Invalid node id '{node_id}'")]
    InvalidNodeId {
        /// Node ID.
        node_id: String,
    },

    /// Read step failed as a whole.
    #[error("Failed to read node values.")]
    ReadNodes {
        /// Underlying error.
        #[source]
        source: Box<OpcUaError>,
    },

    /// Write or call step failed as a whole.
    #[error("Failed to execute operation on OPC UA node.")]
    Execute {
        /// Underlying error.
        #[source]
        source: Box<OpcUaError>,
    },
}

impl OperationError {
    /// Creates a read failed error.
    pub fn read_failed(message: impl Into<String>) -> Self {
        Self::ReadFailed {
            message: message.into(),
        }
    }

    /// Creates a write failed error.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a call failed error.
    pub fn call_failed(method_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CallFailed {
            method_id: method_id.into(),
            message: message.into(),
        }
    }

    /// Creates a close failed error.
    pub fn close_failed(message: impl Into<String>) -> Self {
        Self::CloseFailed {
            message: message.into(),
        }
    }

    /// Creates a channel probe error.
    pub fn channel_probe(message: impl Into<String>) -> Self {
        Self::ChannelProbe {
            message: message.into(),
        }
    }

    /// Creates an invalid node id error.
    pub fn invalid_node_id(node_id: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ReadFailed { .. }
            | Self::WriteFailed { .. }
            | Self::CallFailed { .. }
            | Self::ChannelProbe { .. } => true,
            Self::ReadNodes { source } | Self::Execute { source } => source.is_retryable(),
            Self::CloseFailed { .. } | Self::InvalidNodeId { .. } => false,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ReadFailed { .. } => ErrorCode::new(3, 1),
            Self::WriteFailed { .. } => ErrorCode::new(3, 2),
            Self::CallFailed { .. } => ErrorCode::new(3, 3),
            Self::CloseFailed { .. } => ErrorCode::new(3, 4),
            Self::ChannelProbe { .. } => ErrorCode::new(3, 5),
            Self::InvalidNodeId { .. } => ErrorCode::new(3, 6),
            Self::ReadNodes { .. } => ErrorCode::new(3, 7),
            Self::Execute { .. } => ErrorCode::new(3, 8),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Invalid settings values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Unknown authentication type string.
    #[error("Unknown authentication type '{value}'")]
    UnknownAuthenticationType {
        /// The rejected value.
        value: String,
    },

    /// Invalid value for a setting.
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue {
        /// Setting name.
        field: String,
        /// Error message.
        message: String,
    },
}

impl ConfigurationError {
    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnknownAuthenticationType { .. } => ErrorCode::new(4, 1),
            Self::InvalidValue { .. } => ErrorCode::new(4, 2),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code for categorization.
///
/// Format: `UA-XXYY` where XX is category and YY is specific error.
///
/// Categories:
/// - 1: Validation
/// - 2: Connection
/// - 3: Operation
/// - 4: Configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category (1-4).
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02X}{:02X}", self.category, self.code)
    }
}

/// Result type for OPC UA operations.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::IncompleteX509.to_string(),
            "X509 authentication requires both certificate and private key."
        );
        assert_eq!(
            ValidationError::invalid_scheme("http://host").to_string(),
            "Endpoint URL must start with opc.tcp:// or opc.https://. Received: \"http://host\""
        );
        assert_eq!(
            ValidationError::NoNodeIds.to_string(),
            "At least one Node ID must be provided for reading."
        );
    }

    #[test]
    fn test_wrapped_messages_keep_cause() {
        let inner = OpcUaError::connection(ConnectionError::refused("opc.tcp://h:4840", "reset"));
        let wrapped = OpcUaError::acquire_failed(inner);

        assert_eq!(
            wrapped.to_string(),
            "Failed to connect or authenticate to OPC UA server."
        );
        assert_eq!(
            wrapped.root_message(),
            "Connection refused to 'opc.tcp://h:4840': reset"
        );
        assert!(wrapped.is_retryable());
    }

    #[test]
    fn test_operation_wrappers() {
        let read = OpcUaError::read_failed(OperationError::read_failed("socket closed").into());
        assert_eq!(read.to_string(), "Failed to read node values.");
        assert!(read.is_operation());

        let exec = OpcUaError::execute_failed(
            OperationError::write_failed("ns=1;s=A", "timeout").into(),
        );
        assert_eq!(exec.to_string(), "Failed to execute operation on OPC UA node.");
    }

    #[test]
    fn test_categories_and_codes() {
        let err = OpcUaError::validation(ValidationError::EmptyEndpoint);
        assert_eq!(err.category(), "validation");
        assert!(!err.is_retryable());
        assert_eq!(err.error_code().to_string(), "UA-0102");

        let err = OpcUaError::configuration(ConfigurationError::invalid_value("pool", "zero"));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.tracing_level(), Level::ERROR);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
        assert_eq!(ErrorSeverity::Warning.to_string(), "warning");
    }
}
