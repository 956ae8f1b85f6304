// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Failures of the `uapool` command and the exit code each one maps to.

use thiserror::Error;

/// Result type alias for uapool-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Why a `uapool` command failed.
#[derive(Debug, Error)]
pub enum BinError {
    /// The command line asks for something that cannot run.
    #[error("Invalid invocation: {0}")]
    Usage(String),

    /// No OPC UA transport is compiled into this build.
    #[error("No OPC UA transport: {0}")]
    Transport(String),

    /// The configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] uapool_config::ConfigError),

    /// `test-connection` reached the server but the check failed.
    #[error("Connection test failed: {0}")]
    ConnectionTest(String),

    /// A read, write or call failed.
    #[error(transparent)]
    OpcUa(#[from] uapool_opcua::OpcUaError),

    /// Results could not be written to the output stream.
    #[error("Cannot write results: {0}")]
    Output(#[from] std::io::Error),

    /// Another failure with the step that hit it.
    #[error("{context}: {source}")]
    WithContext {
        /// The step that failed.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a usage error.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) | Self::Config(_) => 1,
            Self::Transport(_) => 2,
            Self::Output(_) => 4,
            Self::ConnectionTest(_) => 5,
            Self::OpcUa(e) if e.is_validation() => 6,
            Self::OpcUa(_) => 7,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }

    /// Returns the protocol error behind this error, looking through context.
    pub fn opcua_error(&self) -> Option<&uapool_opcua::OpcUaError> {
        match self {
            Self::OpcUa(e) => Some(e),
            Self::WithContext { source, .. } => source.opcua_error(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for BinError {
    fn from(err: serde_json::Error) -> Self {
        Self::Output(err.into())
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Reports an error with its cause chain.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);
    if let Some(e) = error.opcua_error() {
        eprintln!("  Code: {} ({})", e.error_code(), e.category());
    }

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }
}

/// Reports an error and exits with the appropriate code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uapool_config::ConfigError;
    use uapool_opcua::{OpcUaError, ValidationError};

    #[test]
    fn test_usage_with_context() {
        let err = BinError::usage("watch interval must be positive").with_context("watch");
        assert_eq!(
            err.to_string(),
            "watch: Invalid invocation: watch interval must be positive"
        );
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::from(ConfigError::file_not_found("uapool.yaml")).exit_code(), 1);
        assert_eq!(BinError::Transport("none".into()).exit_code(), 2);
        assert_eq!(BinError::ConnectionTest("timeout".into()).exit_code(), 5);

        let err: BinError = OpcUaError::validation(ValidationError::NoNodeIds).into();
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_config_error_is_shown_as_is() {
        let err = BinError::from(ConfigError::file_not_found("uapool.yaml"));
        assert_eq!(err.to_string(), "Configuration file uapool.yaml does not exist");
    }

    #[test]
    fn test_render_failures_are_output_errors() {
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = BinError::from(json);
        assert!(matches!(err, BinError::Output(_)));
        assert_eq!(err.exit_code(), 4);

        let broken = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        assert!(BinError::from(broken).to_string().starts_with("Cannot write results"));
    }

    #[test]
    fn test_opcua_error_through_context() {
        let err: BinError = OpcUaError::validation(ValidationError::NoNodeIds).into();
        let err = err.with_context("read");
        assert!(err.opcua_error().is_some_and(OpcUaError::is_validation));
        assert!(BinError::usage("count").opcua_error().is_none());
    }
}
