// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing for uapool.
//!
//! # Loading Pipeline
//!
//! 1. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw text
//! 2. Parse YAML, TOML or JSON into [`AppConfig`]
//! 3. Apply environment variable overrides
//! 4. Resolve relative paths against the config file directory
//! 5. Validate configuration
//!
//! # Environment Variable Override
//!
//! ```text
//! UAPOOL_POOL_MAX_CONNECTIONS_PER_KEY=2
//! UAPOOL_POOL_CLIENT_NAME_PREFIX=line-3
//! UAPOOL_POOL_PKI_DIR=/var/lib/uapool/pki
//! UAPOOL_OUTPUT_SOURCE=line-3-reader
//! UAPOOL_LOG_LEVEL=debug
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{AppConfig, LogFormat, LogLevel};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "UAPOOL";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for uapool.
///
/// # Examples
///
/// ```no_run
/// use uapool_config::loader::ConfigLoader;
///
/// let loader = ConfigLoader::new();
/// let config = loader.load("uapool.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base directory for resolving relative paths.
    base_path: Option<PathBuf>,

    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve placeholders and apply overrides.
    resolve_env_vars: bool,

    /// Whether to resolve relative paths.
    resolve_paths: bool,

    /// Variables used instead of the process environment.
    environment: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Creates a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            base_path: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
            resolve_paths: true,
            environment: None,
        }
    }

    /// Creates a builder for configuring the loader.
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder::new()
    }

    /// Sets the base path for resolving relative paths.
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Enables or disables relative path resolution.
    pub fn with_path_resolution(mut self, enabled: bool) -> Self {
        self.resolve_paths = enabled;
        self
    }

    /// Reads variables from the given map instead of the process environment.
    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Returns the environment variable prefix.
    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }

    /// Loads configuration from a file.
    ///
    /// The file format is determined by the file extension:
    /// - `.yaml` or `.yml` - YAML format
    /// - `.toml` - TOML format
    /// - `.json` - JSON format
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let base_path = self.base_path.clone().unwrap_or_else(|| {
            path.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        });

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let mut config = self.parse_content(&content, format, path)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        if self.resolve_paths {
            self.resolve_relative_paths(&mut config, &base_path);
        }

        config.validate()?;

        info!("Configuration loaded successfully");
        debug!(
            credentials = config.credentials.len(),
            max_connections_per_key = config.pool.max_connections_per_key,
            "Loaded configuration"
        );

        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<AppConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut config: AppConfig = parse_str(&content, format)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        if self.resolve_paths {
            if let Some(ref base_path) = self.base_path {
                self.resolve_relative_paths(&mut config, base_path);
            }
        }

        config.validate()?;

        Ok(config)
    }

    /// Reads file content.
    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    /// Parses content based on format.
    fn parse_content(
        &self,
        content: &str,
        format: ConfigFormat,
        path: &Path,
    ) -> ConfigResult<AppConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        match format {
            ConfigFormat::Yaml => serde_yaml::from_str(&content).map_err(|e| match e.location() {
                Some(location) => ConfigError::parse_at_line(path, e.to_string(), location.line()),
                None => ConfigError::parse(path, e.to_string()),
            }),
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| match e.span() {
                Some(span) => ConfigError::parse_at_line(
                    path,
                    e.message(),
                    line_of_offset(&content, span.start),
                ),
                None => ConfigError::parse(path, e.message()),
            }),
            ConfigFormat::Json => serde_json::from_str(&content)
                .map_err(|e| ConfigError::parse_at_line(path, e.to_string(), e.line())),
        }
    }

    /// Looks up a variable in the injected map or the process environment.
    fn env_var(&self, name: &str) -> Option<String> {
        match self.environment {
            Some(ref vars) => vars.get(name).cloned(),
            None => env::var(name).ok(),
        }
    }

    /// Resolves environment variable placeholders in content.
    ///
    /// Supports the format: `${VAR_NAME}` or `${VAR_NAME:default}`
    fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' || chars.peek() != Some(&'{') {
                result.push(c);
                continue;
            }
            chars.next();

            let mut var_content = String::new();
            let mut found_close = false;
            for c in chars.by_ref() {
                if c == '}' {
                    found_close = true;
                    break;
                }
                var_content.push(c);
            }

            if !found_close {
                result.push_str("${");
                result.push_str(&var_content);
                continue;
            }

            let (var_name, default_value) = match var_content.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (var_content.as_str(), None),
            };

            match (self.env_var(var_name), default_value) {
                (Some(value), _) => result.push_str(&value),
                (None, Some(default)) => result.push_str(default),
                (None, None) => {
                    warn!("Environment variable '{}' not found", var_name);
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        }

        result
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&self, config: &mut AppConfig) -> ConfigResult<()> {
        let name = |suffix: &str| format!("{}_{}", self.env_prefix, suffix);

        let key = name("POOL_MAX_CONNECTIONS_PER_KEY");
        if let Some(value) = self.env_var(&key) {
            config.pool.max_connections_per_key = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(&key, "expected a positive integer"))?;
        }
        if let Some(value) = self.env_var(&name("POOL_CLIENT_NAME_PREFIX")) {
            config.pool.client_name_prefix = value;
        }
        if let Some(value) = self.env_var(&name("POOL_CLOSE_EVICTED")) {
            config.pool.close_evicted = parse_bool(&value);
        }
        if let Some(value) = self.env_var(&name("POOL_PKI_DIR")) {
            config.pool.pki_dir = PathBuf::from(value);
        }

        if let Some(value) = self.env_var(&name("OUTPUT_SOURCE")) {
            config.output.source = value;
        }

        let key = name("LOG_LEVEL");
        if let Some(value) = self.env_var(&key) {
            config.logging.level = parse_log_level(&value)
                .ok_or_else(|| ConfigError::invalid_env_var(&key, "unknown log level"))?;
        }
        if let Some(value) = self.env_var(&name("LOG_FORMAT")) {
            if let Some(format) = parse_log_format(&value) {
                config.logging.format = format;
            }
        }

        Ok(())
    }

    /// Resolves relative paths in the configuration.
    fn resolve_relative_paths(&self, config: &mut AppConfig, base_path: &Path) {
        if config.pool.pki_dir.is_relative() {
            config.pool.pki_dir = base_path.join(&config.pool.pki_dir);
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigLoaderBuilder
// =============================================================================

/// Builder for ConfigLoader.
#[derive(Debug, Default)]
pub struct ConfigLoaderBuilder {
    base_path: Option<PathBuf>,
    env_prefix: Option<String>,
    resolve_env_vars: Option<bool>,
    resolve_paths: Option<bool>,
    environment: Option<HashMap<String, String>>,
}

impl ConfigLoaderBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base path.
    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment variable prefix.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn resolve_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = Some(enabled);
        self
    }

    /// Enables or disables path resolution.
    pub fn resolve_paths(mut self, enabled: bool) -> Self {
        self.resolve_paths = Some(enabled);
        self
    }

    /// Sets the variables used instead of the process environment.
    pub fn environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Builds the ConfigLoader.
    pub fn build(self) -> ConfigLoader {
        ConfigLoader {
            base_path: self.base_path,
            env_prefix: self
                .env_prefix
                .unwrap_or_else(|| DEFAULT_ENV_PREFIX.to_string()),
            resolve_env_vars: self.resolve_env_vars.unwrap_or(true),
            resolve_paths: self.resolve_paths.unwrap_or(true),
            environment: self.environment,
        }
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Configuration file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match extension.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(ext) => Err(ConfigError::unsupported_format(ext)),
            None => Err(ConfigError::unsupported_format("unknown")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => {
            serde_yaml::from_str(content).map_err(|e| ConfigError::unparsable(e.to_string()))
        }
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::unparsable(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::unparsable(e.to_string()))
        }
    }
}

/// One-based line number of a byte offset.
fn line_of_offset(content: &str, offset: usize) -> usize {
    content
        .get(..offset)
        .map(|prefix| prefix.matches('\n').count() + 1)
        .unwrap_or(1)
}

/// Parses a string to bool.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enabled"
    )
}

/// Parses a log level string.
pub fn parse_log_level(value: &str) -> Option<LogLevel> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(LogLevel::Trace),
        "debug" => Some(LogLevel::Debug),
        "info" => Some(LogLevel::Info),
        "warn" | "warning" => Some(LogLevel::Warn),
        "error" => Some(LogLevel::Error),
        _ => None,
    }
}

fn parse_log_format(value: &str) -> Option<LogFormat> {
    match value.trim().to_lowercase().as_str() {
        "text" | "pretty" => Some(LogFormat::Text),
        "compact" => Some(LogFormat::Compact),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
///
/// ```no_run
/// use uapool_config::loader::load_config;
///
/// let config = load_config("uapool.yaml").unwrap();
/// ```
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<AppConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;
    use uapool_opcua::AuthenticationType;

    fn create_test_yaml() -> String {
        r#"
credentials:
  default:
    endpointUrl: "opc.tcp://localhost:4840"
  plant:
    endpointUrl: "opc.tcp://plc-7:4840"
    securityPolicy: Basic256Sha256
    securityMode: SignAndEncrypt
    authenticationType: usernamePassword
    username: operator
    password: "${PLANT_PASSWORD:changeme}"

pool:
  max_connections_per_key: 2
  client_name_prefix: line-3

watch:
  interval: 250ms

logging:
  level: debug
"#
        .to_string()
    }

    fn isolated() -> ConfigLoader {
        ConfigLoader::new().with_environment(HashMap::new())
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(create_test_yaml().as_bytes()).unwrap();

        let config = isolated().load(file.path()).unwrap();

        assert_eq!(config.credentials.len(), 2);
        let plant = config.credential("plant").unwrap();
        assert_eq!(plant.authentication_type, AuthenticationType::UsernamePassword);
        assert_eq!(plant.username.as_deref(), Some("operator"));
        assert_eq!(plant.password.as_deref(), Some("changeme"));
        assert_eq!(config.pool.max_connections_per_key, 2);
        assert_eq!(config.pool.client_name_prefix, "line-3");
        assert_eq!(config.watch.interval, Duration::from_millis(250));
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[credentials.default]
endpointUrl = "opc.tcp://localhost:4840"
authenticationType = "anonymous"

[pool]
close_evicted = false

[output]
source = "bench"
format = "lines"
"#;
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let config = isolated().load(file.path()).unwrap();

        assert_eq!(
            config.credential("default").unwrap().endpoint_url,
            "opc.tcp://localhost:4840"
        );
        assert!(!config.pool.close_evicted);
        assert_eq!(config.output.source, "bench");
        assert_eq!(config.output.format, crate::schema::OutputFormat::Lines);
    }

    #[test]
    fn test_load_json_string() {
        let json = r#"{
            "credentials": {
                "default": {
                    "endpointUrl": "opc.https://gateway:4843",
                    "authenticationType": "x509",
                    "certificate": "CERT",
                    "privateKey": "KEY"
                }
            }
        }"#;

        let config = isolated().load_from_str(json, ConfigFormat::Json).unwrap();
        let credential = config.credential("default").unwrap();
        assert_eq!(credential.authentication_type, AuthenticationType::X509);
        assert_eq!(credential.private_key.as_deref(), Some("KEY"));
    }

    #[test]
    fn test_placeholder_resolution() {
        let loader = ConfigLoader::new().with_environment(env(&[
            ("PLC_HOST", "plc-9"),
            ("EMPTY", ""),
        ]));

        assert_eq!(
            loader.resolve_env_placeholders("opc.tcp://${PLC_HOST}:4840"),
            "opc.tcp://plc-9:4840"
        );
        assert_eq!(loader.resolve_env_placeholders("${MISSING:fallback}"), "fallback");
        assert_eq!(loader.resolve_env_placeholders("${EMPTY:fallback}"), "");
        assert_eq!(loader.resolve_env_placeholders("${MISSING}"), "${MISSING}");
        assert_eq!(loader.resolve_env_placeholders("${UNCLOSED"), "${UNCLOSED");
        assert_eq!(loader.resolve_env_placeholders("cost: $5"), "cost: $5");
    }

    #[test]
    fn test_env_overrides() {
        let loader = ConfigLoader::new().with_environment(env(&[
            ("UAPOOL_POOL_MAX_CONNECTIONS_PER_KEY", "1"),
            ("UAPOOL_POOL_CLIENT_NAME_PREFIX", "override"),
            ("UAPOOL_OUTPUT_SOURCE", "from-env"),
            ("UAPOOL_LOG_LEVEL", "WARN"),
        ]));

        let config = loader
            .load_from_str(&create_test_yaml(), ConfigFormat::Yaml)
            .unwrap();

        assert_eq!(config.pool.max_connections_per_key, 1);
        assert_eq!(config.pool.client_name_prefix, "override");
        assert_eq!(config.output.source, "from-env");
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_invalid_env_override() {
        let loader = ConfigLoader::new().with_environment(env(&[(
            "UAPOOL_POOL_MAX_CONNECTIONS_PER_KEY",
            "many",
        )]));

        let err = loader
            .load_from_str(&create_test_yaml(), ConfigFormat::Yaml)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnvVar { ref name, .. } if name == "UAPOOL_POOL_MAX_CONNECTIONS_PER_KEY"
        ));
    }

    #[test]
    fn test_env_vars_disabled() {
        let loader = ConfigLoader::builder()
            .resolve_env_vars(false)
            .environment(env(&[("UAPOOL_OUTPUT_SOURCE", "ignored")]))
            .build();

        let config = loader
            .load_from_str(&create_test_yaml(), ConfigFormat::Yaml)
            .unwrap();

        assert_eq!(config.output.source, "uapool-opcua-pool");
        assert_eq!(
            config.credential("plant").unwrap().password.as_deref(),
            Some("${PLANT_PASSWORD:changeme}")
        );
    }

    #[test]
    fn test_relative_pki_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uapool.yaml");
        fs::write(&path, "pool:\n  pki_dir: certs\n").unwrap();

        let config = isolated().load(&path).unwrap();
        assert_eq!(config.pool.pki_dir, dir.path().join("certs"));
    }

    #[test]
    fn test_validation_failure_on_load() {
        let yaml = r#"
credentials:
  broken:
    endpointUrl: "http://localhost:4840"
"#;
        let err = isolated()
            .load_from_str(yaml, ConfigFormat::Yaml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
        assert!(err.to_string().contains("opc.tcp://"));
    }

    #[test]
    fn test_yaml_keeps_key_case() {
        let yaml = r#"
credentials:
  Line7Gateway:
    endpointUrl: "opc.https://gateway:4843"
    securityPolicy: Basic256Sha256
    securityMode: Sign
    authenticationType: x509
    certificate: CERT
    privateKey: KEY
"#;
        let config = isolated()
            .load_from_str(yaml, ConfigFormat::Yaml)
            .unwrap();

        let credential = config.credential("Line7Gateway").unwrap();
        assert_eq!(credential.endpoint_url, "opc.https://gateway:4843");
        assert_eq!(credential.authentication_type, AuthenticationType::X509);
        assert_eq!(credential.security_policy.as_deref(), Some("Basic256Sha256"));
        assert_eq!(credential.security_mode.as_deref(), Some("Sign"));
        assert_eq!(credential.private_key.as_deref(), Some("KEY"));
    }

    #[test]
    fn test_yaml_parse_error_has_line() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(b"pool:\n  max_connections_per_key: [\n").unwrap();

        match isolated().load(file.path()).unwrap_err() {
            ConfigError::Parse { line, .. } => assert!(line.is_some()),
            other => panic!("Expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_file_not_found() {
        let err = isolated().load("/nonexistent/uapool.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_toml_parse_error_has_line() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(b"[pool]\nmax_connections_per_key = \n").unwrap();

        match isolated().load(file.path()).unwrap_err() {
            ConfigError::Parse { line, .. } => assert!(line.is_some_and(|l| l >= 2)),
            other => panic!("Expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("a.TOML")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(ConfigFormat::Json.extension(), "json");
        assert!(ConfigFormat::from_path(Path::new("a.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("config")).is_err());
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("warning"), Some(LogLevel::Warn));
        assert_eq!(parse_log_level(" Info "), Some(LogLevel::Info));
        assert_eq!(parse_log_level("loud"), None);
    }
}
