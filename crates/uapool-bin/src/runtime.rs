// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Process bootstrap.
//!
//! The runtime owns the single [`ConnectionPool`] of the process:
//!
//! - Configuration loading and validation
//! - Client factory selection
//! - Pool and executor construction
//! - Pool shutdown before exit

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use uapool_config::{AppConfig, ConfigLoader};
use uapool_opcua::{
    ClientFactory, ConnectionCredential, ConnectionPool, CredentialTestResult, Operation,
    OperationExecutor, ProtocolOutput, test_connection,
};

use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// Runtime
// =============================================================================

/// Configuration, pool and executor of one process.
pub struct Runtime {
    config: Arc<AppConfig>,
    factory: Arc<dyn ClientFactory>,
    pool: Arc<ConnectionPool>,
    executor: OperationExecutor,
    shutdown: ShutdownCoordinator,
}

impl Runtime {
    /// Creates a runtime from a loaded configuration and a client factory.
    pub fn new(config: AppConfig, factory: Arc<dyn ClientFactory>) -> Self {
        let pool = Arc::new(ConnectionPool::with_config(
            Arc::clone(&factory),
            config.to_pool_config(),
        ));
        let executor =
            OperationExecutor::new(Arc::clone(&pool)).with_source(config.output.source.clone());

        Self {
            config: Arc::new(config),
            factory,
            pool,
            executor,
            shutdown: ShutdownCoordinator::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Returns the connection pool.
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Returns the operation executor.
    pub fn executor(&self) -> &OperationExecutor {
        &self.executor
    }

    /// Returns the shutdown coordinator.
    pub fn shutdown_coordinator(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Looks up a credential record by name.
    pub fn credential(&self, name: &str) -> BinResult<&ConnectionCredential> {
        Ok(self.config.credential(name)?)
    }

    /// Runs one operation with the named credential.
    pub async fn execute(
        &self,
        credential_name: &str,
        operation: &Operation,
    ) -> BinResult<Vec<ProtocolOutput>> {
        let credential = self.credential(credential_name)?;
        debug!(
            credential = credential_name,
            operation = operation.name(),
            "Executing operation"
        );
        Ok(self.executor.execute(credential, operation).await?)
    }

    /// Probes the named credential outside the pool.
    pub async fn test_connection(&self, credential_name: &str) -> CredentialTestResult {
        let credential = self.config.credentials.get(credential_name);
        test_connection(
            self.factory.as_ref(),
            credential,
            &self.config.pool.client_name_prefix,
        )
        .await
    }

    /// Closes every pooled session.
    pub async fn shutdown(self) {
        let stats = self.pool.stats().snapshot();
        info!(
            created = stats.created,
            reused = stats.reused,
            evicted = stats.evicted,
            forced_reuses = stats.forced_reuses,
            creation_failures = stats.creation_failures,
            "Shutting down connection pool"
        );
        self.pool.shutdown().await;
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for constructing the runtime.
#[derive(Default)]
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<AppConfig>,
    factory: Option<Arc<dyn ClientFactory>>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the client factory, replacing the built-in transport.
    pub fn client_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> BinResult<Runtime> {
        let config = match self.config {
            Some(cfg) => cfg,
            None => {
                let path = self
                    .config_path
                    .ok_or_else(|| BinError::usage("no configuration file or configuration value given"))?;

                ConfigLoader::new()
                    .load(&path)
                    .map_err(|e| BinError::from(e).with_context(format!(
                        "Failed to load config from {}",
                        path.display()
                    )))?
            }
        };

        let factory = match self.factory {
            Some(factory) => factory,
            None => default_factory(&config)?,
        };

        Ok(Runtime::new(config, factory))
    }
}

#[cfg(feature = "real-transport")]
fn default_factory(config: &AppConfig) -> BinResult<Arc<dyn ClientFactory>> {
    Ok(Arc::new(uapool_opcua::RealClientFactory::new(
        config.pool.pki_dir.clone(),
    )))
}

#[cfg(not(feature = "real-transport"))]
fn default_factory(_config: &AppConfig) -> BinResult<Arc<dyn ClientFactory>> {
    Err(BinError::Transport(
        "uapool was built without the `real-transport` feature".to_string(),
    ))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uapool_opcua::{ClientOptions, ConnectionError, OpcUaClient, OpcUaError, OpcUaResult};

    struct RefusingFactory;

    impl ClientFactory for RefusingFactory {
        fn create(&self, _options: &ClientOptions) -> OpcUaResult<Box<dyn OpcUaClient>> {
            Err(OpcUaError::connection(ConnectionError::refused(
                "opc.tcp://localhost:4840",
                "connection refused",
            )))
        }
    }

    fn runtime() -> Runtime {
        let mut config = AppConfig::default();
        config.credentials.insert(
            "default".into(),
            ConnectionCredential::new("opc.tcp://localhost:4840"),
        );
        RuntimeBuilder::new()
            .config(config)
            .client_factory(Arc::new(RefusingFactory))
            .build()
            .unwrap()
    }

    #[test]
    fn test_runtime_builder_requires_config() {
        let result = RuntimeBuilder::new()
            .client_factory(Arc::new(RefusingFactory))
            .build();
        assert!(matches!(result, Err(BinError::Usage(_))));
    }

    #[test]
    fn test_missing_config_file() {
        let err = RuntimeBuilder::new()
            .config_path("/nonexistent/uapool.yaml")
            .client_factory(Arc::new(RefusingFactory))
            .build()
            .err()
            .unwrap();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_unknown_credential() {
        let runtime = runtime();
        let err = runtime.credential("plant").unwrap_err();
        assert!(err.to_string().contains("default"));
    }

    #[tokio::test]
    async fn test_connection_test_reports_error() {
        let runtime = runtime();

        let result = runtime.test_connection("default").await;
        assert!(!result.is_ok());

        let result = runtime.test_connection("missing").await;
        assert_eq!(result.message, "No credentials provided.");

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_execute_maps_connect_failure() {
        let runtime = runtime();
        let operation = Operation::Read(uapool_opcua::ReadRequest::new("ns=2;s=A"));

        let err = runtime.execute("default", &operation).await.unwrap_err();
        assert!(matches!(err, BinError::OpcUa(_)));
        assert_eq!(runtime.pool().stats().creation_failures(), 1);

        runtime.shutdown().await;
    }
}
