// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema.
//!
//! ```yaml
//! credentials:
//!   default:
//!     endpointUrl: "opc.tcp://localhost:4840"
//!     securityPolicy: Basic256Sha256
//!     securityMode: SignAndEncrypt
//!     authenticationType: usernamePassword
//!     username: operator
//!     password: "${PLANT_PASSWORD:}"
//!
//! pool:
//!   max_connections_per_key: 3
//!   client_name_prefix: uapool-opcua
//!   pki_dir: ./pki
//!
//! output:
//!   source: line-3
//!   format: pretty
//!
//! watch:
//!   interval: 5s
//!
//! logging:
//!   level: info
//!   format: text
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uapool_opcua::output::DEFAULT_SOURCE;
use uapool_opcua::pool::{DEFAULT_CLIENT_NAME_PREFIX, DEFAULT_MAX_CONNECTIONS_PER_KEY};
use uapool_opcua::{ConnectionCredential, PoolConfig, validate_credential};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Root Configuration
// =============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Named credential records.
    #[serde(default)]
    pub credentials: BTreeMap<String, ConnectionCredential>,

    /// Connection pool settings.
    #[serde(default)]
    pub pool: PoolSettings,

    /// Output settings.
    #[serde(default)]
    pub output: OutputSettings,

    /// Watch command settings.
    #[serde(default)]
    pub watch: WatchSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, credential) in &self.credentials {
            validate_credential(credential).map_err(|e| {
                ConfigError::validation(format!("credentials.{name}"), e.root_message())
            })?;
        }

        self.pool.validate()?;
        self.watch.validate()?;

        Ok(())
    }

    /// Returns a credential record by name.
    pub fn credential(&self, name: &str) -> ConfigResult<&ConnectionCredential> {
        self.credentials
            .get(name)
            .ok_or_else(|| ConfigError::unknown_credential(name, self.credential_names()))
    }

    /// Returns the credential names in order.
    pub fn credential_names(&self) -> impl Iterator<Item = &str> {
        self.credentials.keys().map(String::as_str)
    }

    /// Builds the pool configuration.
    pub fn to_pool_config(&self) -> PoolConfig {
        PoolConfig::default()
            .with_max_connections_per_key(self.pool.max_connections_per_key)
            .with_client_name_prefix(self.pool.client_name_prefix.clone())
            .with_close_evicted(self.pool.close_evicted)
    }
}

// =============================================================================
// Pool Settings
// =============================================================================

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum sessions per pool key.
    #[serde(default = "default_max_connections_per_key")]
    pub max_connections_per_key: usize,

    /// Prefix for generated client names.
    #[serde(default = "default_client_name_prefix")]
    pub client_name_prefix: String,

    /// Close sessions dropped by the health check.
    #[serde(default = "default_enabled")]
    pub close_evicted: bool,

    /// Client PKI directory, relative to the config file when not absolute.
    #[serde(default = "default_pki_dir")]
    pub pki_dir: PathBuf,
}

impl PoolSettings {
    /// Validates the pool settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_connections_per_key == 0 {
            return Err(ConfigError::validation(
                "pool.max_connections_per_key",
                "must be at least 1",
            ));
        }
        if self.client_name_prefix.trim().is_empty() {
            return Err(ConfigError::validation(
                "pool.client_name_prefix",
                "cannot be empty",
            ));
        }
        Ok(())
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections_per_key: default_max_connections_per_key(),
            client_name_prefix: default_client_name_prefix(),
            close_evicted: true,
            pki_dir: default_pki_dir(),
        }
    }
}

// =============================================================================
// Output Settings
// =============================================================================

/// Output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSettings {
    /// `source` field of every output.
    #[serde(default = "default_source")]
    pub source: String,

    /// Rendering of printed outputs.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            source: default_source(),
            format: OutputFormat::default(),
        }
    }
}

/// Output rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Indented JSON.
    #[default]
    Pretty,
    /// One compact JSON document per line.
    Lines,
}

// =============================================================================
// Watch Settings
// =============================================================================

/// Settings of the `watch` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSettings {
    /// Delay between two reads.
    #[serde(default = "default_watch_interval", with = "humantime_serde")]
    pub interval: Duration,
}

impl WatchSettings {
    /// Validates the watch settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval.is_zero() {
            return Err(ConfigError::validation("watch.interval", "must be positive"));
        }
        Ok(())
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            interval: default_watch_interval(),
        }
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable text.
    #[default]
    Text,
    /// Single-line compact text.
    Compact,
    /// JSON lines.
    Json,
}

// =============================================================================
// Defaults
// =============================================================================

fn default_enabled() -> bool {
    true
}

fn default_max_connections_per_key() -> usize {
    DEFAULT_MAX_CONNECTIONS_PER_KEY
}

fn default_client_name_prefix() -> String {
    DEFAULT_CLIENT_NAME_PREFIX.to_string()
}

fn default_pki_dir() -> PathBuf {
    PathBuf::from("./pki")
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

fn default_watch_interval() -> Duration {
    Duration::from_secs(5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uapool_opcua::AuthenticationType;

    fn anonymous(url: &str) -> ConnectionCredential {
        ConnectionCredential::new(url)
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.credentials.is_empty());
        assert_eq!(config.pool.max_connections_per_key, 3);
        assert_eq!(config.pool.client_name_prefix, "uapool-opcua");
        assert!(config.pool.close_evicted);
        assert_eq!(config.output.source, "uapool-opcua-pool");
        assert_eq!(config.output.format, OutputFormat::Pretty);
        assert_eq!(config.watch.interval, Duration::from_secs(5));
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_credential() {
        let mut config = AppConfig::default();
        config.credentials.insert(
            "plant".into(),
            ConnectionCredential {
                authentication_type: AuthenticationType::X509,
                certificate: Some("-----BEGIN CERTIFICATE-----".into()),
                ..anonymous("opc.tcp://plc:4840")
            },
        );

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "credentials.plant"));
        assert!(
            err.to_string()
                .contains("requires both certificate and private key")
        );
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = AppConfig::default();
        config.pool.max_connections_per_key = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credential_lookup() {
        let mut config = AppConfig::default();
        config
            .credentials
            .insert("default".into(), anonymous("opc.tcp://localhost:4840"));

        assert_eq!(
            config.credential("default").unwrap().endpoint_url,
            "opc.tcp://localhost:4840"
        );
        assert!(matches!(
            config.credential("missing"),
            Err(ConfigError::UnknownCredential { .. })
        ));
        assert_eq!(config.credential_names().collect::<Vec<_>>(), vec!["default"]);
    }

    #[test]
    fn test_to_pool_config() {
        let mut config = AppConfig::default();
        config.pool.max_connections_per_key = 5;
        config.pool.client_name_prefix = "line-3".into();
        config.pool.close_evicted = false;

        let pool = config.to_pool_config();
        assert_eq!(pool.max_connections_per_key, 5);
        assert_eq!(pool.client_name_prefix, "line-3");
        assert!(!pool.close_evicted);
    }
}
