// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors raised while turning a configuration document into an [`AppConfig`].
//!
//! [`AppConfig`]: crate::AppConfig

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Why a configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("Configuration file {path} does not exist")]
    FileNotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("Cannot read configuration file {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file extension names no supported format.
    #[error("Cannot load '.{extension}' configuration files; use .yaml, .yml, .toml or .json")]
    UnsupportedFormat {
        /// Offending extension, `unknown` when there is none.
        extension: String,
    },

    /// The document does not fit the configuration schema.
    #[error("{}", describe_parse(.path.as_deref(), *.line, .message))]
    Parse {
        /// Source file; `None` for documents loaded from a string.
        path: Option<PathBuf>,
        /// One-based line, when the parser reports one.
        line: Option<usize>,
        /// Parser message.
        message: String,
    },

    /// A `UAPOOL_*` override does not fit its setting.
    #[error("Environment override {name} is invalid: {message}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// What was expected.
        message: String,
    },

    /// A setting or credential record failed validation.
    #[error("Invalid '{field}': {message}")]
    Validation {
        /// Dotted path of the setting, e.g. `credentials.default`.
        field: String,
        /// Validation message.
        message: String,
    },

    /// A command selected a credential the configuration does not define.
    #[error("Unknown credential '{name}' (configured: {configured})")]
    UnknownCredential {
        /// Requested name.
        name: String,
        /// Comma-separated configured names.
        configured: String,
    },
}

impl ConfigError {
    /// Parse failure in a file, without position.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: Some(path.into()),
            line: None,
            message: message.into(),
        }
    }

    /// Parse failure in a file at a one-based line.
    pub fn parse_at_line(path: impl Into<PathBuf>, message: impl Into<String>, line: usize) -> Self {
        Self::Parse {
            path: Some(path.into()),
            line: Some(line),
            message: message.into(),
        }
    }

    /// Parse failure in a document loaded from a string.
    pub fn unparsable(message: impl Into<String>) -> Self {
        Self::Parse {
            path: None,
            line: None,
            message: message.into(),
        }
    }

    /// Validation failure of one setting.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Unknown credential name, listing the configured ones.
    pub fn unknown_credential<'a>(
        name: impl Into<String>,
        configured: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self::UnknownCredential {
            name: name.into(),
            configured: configured.into_iter().collect::<Vec<_>>().join(", "),
        }
    }

    /// Read failure of an existing file.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Invalid override value.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Missing configuration file.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Unsupported file extension.
    pub fn unsupported_format(extension: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            extension: extension.into(),
        }
    }
}

fn describe_parse(path: Option<&Path>, line: Option<usize>, message: &str) -> String {
    let mut text = String::from("Invalid configuration");
    if let Some(path) = path {
        let _ = write!(text, " in {}", path.display());
    }
    if let Some(line) = line {
        let _ = write!(text, " at line {line}");
    }
    let _ = write!(text, ": {message}");
    text
}

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
