// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! An in-memory OPC UA transport for exercising the pool and executor.
//!
//! - One [`MockServer`] holds the node store, the failure switches and the
//!   interaction counters shared by every client it hands out
//! - Each session gets its own [`SessionHealth`] so tests can break one
//!   pooled connection without touching the others

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use uapool_opcua::{
    CallResult, ClientFactory, ClientOptions, ConnectionError, ConnectionPool, IdentityToken,
    OpcUaClient, OpcUaResult, OpcUaSession, OpcUaValue, OperationError, OperationExecutor,
    PoolConfig, ReadResult, StatusCode,
};

/// Method id the mock sessions answer with the sum of their inputs.
pub const SUM_METHOD_ID: &str = "ns=2;s=Sum";

// =============================================================================
// SessionHealth
// =============================================================================

/// Health switches of one mock session.
#[derive(Debug)]
pub struct SessionHealth {
    channel_valid: AtomicBool,
    reconnecting: AtomicBool,
    probe_error: AtomicBool,
    closed: AtomicBool,
}

impl SessionHealth {
    fn new() -> Self {
        Self {
            channel_valid: AtomicBool::new(true),
            reconnecting: AtomicBool::new(false),
            probe_error: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Sets the value returned by the channel probe.
    pub fn set_channel_valid(&self, valid: bool) {
        self.channel_valid.store(valid, Ordering::SeqCst);
    }

    /// Marks the session as reconnecting.
    pub fn set_reconnecting(&self, reconnecting: bool) {
        self.reconnecting.store(reconnecting, Ordering::SeqCst);
    }

    /// Makes the channel probe fail.
    pub fn set_probe_error(&self, fail: bool) {
        self.probe_error.store(fail, Ordering::SeqCst);
    }

    /// Returns `true` once `close` was called on the session.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

// =============================================================================
// MockServer
// =============================================================================

/// Shared state behind the mock transport.
#[derive(Debug, Default)]
pub struct MockServer {
    values: RwLock<HashMap<String, OpcUaValue>>,
    statuses: RwLock<HashMap<String, StatusCode>>,

    fail_create: AtomicBool,
    fail_connect: AtomicBool,
    fail_session: AtomicBool,
    fail_read: AtomicBool,
    fail_write: AtomicBool,
    fail_close: AtomicBool,
    fail_disconnect: AtomicBool,

    /// Simulated connect latency in milliseconds.
    connect_latency_ms: AtomicU64,

    clients_created: AtomicUsize,
    connects: AtomicUsize,
    sessions_created: AtomicUsize,
    sessions_closed: AtomicUsize,
    disconnects: AtomicUsize,
    reads: AtomicUsize,

    sessions: Mutex<Vec<Arc<SessionHealth>>>,
    client_options: Mutex<Vec<ClientOptions>>,
    identities: Mutex<Vec<IdentityToken>>,
}

impl MockServer {
    /// Creates a server with an empty node store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns a client factory bound to this server.
    pub fn factory(self: &Arc<Self>) -> Arc<MockClientFactory> {
        Arc::new(MockClientFactory(Arc::clone(self)))
    }

    // =========================================================================
    // Node Store
    // =========================================================================

    /// Sets a node value.
    pub fn set_value(&self, node_id: impl Into<String>, value: OpcUaValue) {
        self.values.write().insert(node_id.into(), value);
    }

    /// Returns a node value.
    pub fn value(&self, node_id: &str) -> Option<OpcUaValue> {
        self.values.read().get(node_id).cloned()
    }

    /// Makes reads of a node report `status` alongside its stored value.
    pub fn set_status(&self, node_id: impl Into<String>, status: StatusCode) {
        self.statuses.write().insert(node_id.into(), status);
    }

    // =========================================================================
    // Error Injection
    // =========================================================================

    /// Makes `ClientFactory::create` fail.
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Makes `connect` fail.
    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Makes `create_session` fail.
    pub fn fail_session(&self, fail: bool) {
        self.fail_session.store(fail, Ordering::SeqCst);
    }

    /// Makes session reads fail.
    pub fn fail_read(&self, fail: bool) {
        self.fail_read.store(fail, Ordering::SeqCst);
    }

    /// Makes session writes and calls fail.
    pub fn fail_write(&self, fail: bool) {
        self.fail_write.store(fail, Ordering::SeqCst);
    }

    /// Makes session `close` fail.
    pub fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Makes client `disconnect` fail.
    pub fn fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    /// Delays every `connect`.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.connect_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Number of clients built by the factory.
    pub fn clients_created(&self) -> usize {
        self.clients_created.load(Ordering::SeqCst)
    }

    /// Number of `connect` calls.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of sessions activated.
    pub fn sessions_created(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }

    /// Number of `close` calls, failed ones included.
    pub fn sessions_closed(&self) -> usize {
        self.sessions_closed.load(Ordering::SeqCst)
    }

    /// Number of `disconnect` calls, failed ones included.
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Number of read requests served.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Health switches of the n-th session created.
    pub fn session(&self, index: usize) -> Option<Arc<SessionHealth>> {
        self.sessions.lock().get(index).cloned()
    }

    /// Options passed to the factory, in creation order.
    pub fn client_options(&self) -> Vec<ClientOptions> {
        self.client_options.lock().clone()
    }

    /// Identities presented on session activation, in order.
    pub fn identities(&self) -> Vec<IdentityToken> {
        self.identities.lock().clone()
    }
}

// =============================================================================
// MockClientFactory / MockClient
// =============================================================================

/// Client factory handing out [`MockClient`]s.
#[derive(Debug)]
pub struct MockClientFactory(Arc<MockServer>);

impl MockClientFactory {
    /// Returns the backing server.
    pub fn server(&self) -> &Arc<MockServer> {
        &self.0
    }
}

impl ClientFactory for MockClientFactory {
    fn create(&self, options: &ClientOptions) -> OpcUaResult<Box<dyn OpcUaClient>> {
        if self.0.fail_create.load(Ordering::SeqCst) {
            return Err(ConnectionError::client_build("injected factory failure").into());
        }
        self.0.clients_created.fetch_add(1, Ordering::SeqCst);
        self.0.client_options.lock().push(options.clone());
        Ok(Box::new(MockClient {
            server: Arc::clone(&self.0),
            endpoint: Mutex::new(None),
        }))
    }
}

/// A mock client.
#[derive(Debug)]
pub struct MockClient {
    server: Arc<MockServer>,
    endpoint: Mutex<Option<String>>,
}

#[async_trait]
impl OpcUaClient for MockClient {
    async fn connect(&self, endpoint_url: &str) -> OpcUaResult<()> {
        self.server.connects.fetch_add(1, Ordering::SeqCst);

        let latency = self.server.connect_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.server.fail_connect.load(Ordering::SeqCst) {
            return Err(ConnectionError::refused(endpoint_url, "injected connect failure").into());
        }
        *self.endpoint.lock() = Some(endpoint_url.to_string());
        Ok(())
    }

    async fn create_session(&self, identity: IdentityToken) -> OpcUaResult<Arc<dyn OpcUaSession>> {
        let endpoint = self.endpoint.lock().clone().unwrap_or_default();
        if self.server.fail_session.load(Ordering::SeqCst) {
            return Err(
                ConnectionError::session_rejected(endpoint, "BadIdentityTokenRejected").into(),
            );
        }

        self.server.sessions_created.fetch_add(1, Ordering::SeqCst);
        self.server.identities.lock().push(identity);

        let health = Arc::new(SessionHealth::new());
        self.server.sessions.lock().push(Arc::clone(&health));

        Ok(Arc::new(MockSession {
            server: Arc::clone(&self.server),
            health,
        }))
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        self.server.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.server.fail_disconnect.load(Ordering::SeqCst) {
            return Err(ConnectionError::NotConnected.into());
        }
        Ok(())
    }
}

// =============================================================================
// MockSession
// =============================================================================

/// A mock session over the shared node store.
#[derive(Debug)]
pub struct MockSession {
    server: Arc<MockServer>,
    health: Arc<SessionHealth>,
}

#[async_trait]
impl OpcUaSession for MockSession {
    async fn read(&self, node_ids: &[String]) -> OpcUaResult<Vec<ReadResult>> {
        self.server.reads.fetch_add(1, Ordering::SeqCst);
        if self.server.fail_read.load(Ordering::SeqCst) {
            return Err(OperationError::read_failed("BadCommunicationError").into());
        }

        let values = self.server.values.read();
        let statuses = self.server.statuses.read();
        Ok(node_ids
            .iter()
            .map(|id| match (values.get(id), statuses.get(id)) {
                (value, Some(status)) => ReadResult {
                    status: *status,
                    value: value.cloned(),
                    data_type_tag: None,
                },
                (Some(value), None) => ReadResult::good(value.clone()),
                (None, None) => ReadResult::bad(StatusCode::BAD_NODE_ID_UNKNOWN),
            })
            .collect())
    }

    async fn write(&self, node_id: &str, value: OpcUaValue) -> OpcUaResult<StatusCode> {
        if self.server.fail_write.load(Ordering::SeqCst) {
            return Err(OperationError::write_failed(node_id, "BadCommunicationError").into());
        }
        self.server.set_value(node_id, value);
        Ok(StatusCode::GOOD)
    }

    async fn call(
        &self,
        _object_id: &str,
        method_id: &str,
        input_arguments: Vec<OpcUaValue>,
    ) -> OpcUaResult<CallResult> {
        if self.server.fail_write.load(Ordering::SeqCst) {
            return Err(OperationError::call_failed(method_id, "BadCommunicationError").into());
        }
        if method_id != SUM_METHOD_ID {
            return Ok(CallResult::new(StatusCode::BAD_METHOD_INVALID, Vec::new()));
        }
        let sum: f64 = input_arguments.iter().filter_map(OpcUaValue::as_f64).sum();
        Ok(CallResult::new(StatusCode::GOOD, vec![OpcUaValue::Double(sum)]))
    }

    async fn close(&self) -> OpcUaResult<()> {
        self.server.sessions_closed.fetch_add(1, Ordering::SeqCst);
        self.health.closed.store(true, Ordering::SeqCst);
        if self.server.fail_close.load(Ordering::SeqCst) {
            return Err(OperationError::close_failed("injected close failure").into());
        }
        Ok(())
    }

    fn is_channel_valid(&self) -> OpcUaResult<bool> {
        if self.health.probe_error.load(Ordering::SeqCst) {
            return Err(OperationError::channel_probe("secure channel gone").into());
        }
        Ok(self.health.channel_valid.load(Ordering::SeqCst))
    }

    fn is_reconnecting(&self) -> bool {
        self.health.reconnecting.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Creates a pool over a fresh mock server.
pub fn mock_pool(config: PoolConfig) -> (Arc<MockServer>, Arc<ConnectionPool>) {
    let server = MockServer::new();
    let pool = Arc::new(ConnectionPool::with_config(server.factory(), config));
    (server, pool)
}

/// Creates an executor over a fresh mock server with default pool settings.
pub fn mock_executor() -> (Arc<MockServer>, OperationExecutor) {
    let (server, pool) = mock_pool(PoolConfig::default());
    (server, OperationExecutor::new(pool))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_round_trip() {
        let server = MockServer::new();
        let credential = uapool_opcua::ConnectionCredential::new("opc.tcp://mock:4840");
        let options = ClientOptions::pooled(&credential, "test").unwrap();
        let client = server.factory().create(&options).unwrap();

        client.connect("opc.tcp://mock:4840").await.unwrap();
        let session = client.create_session(IdentityToken::Anonymous).await.unwrap();
        session.write("ns=2;s=A", OpcUaValue::Int32(7)).await.unwrap();

        let results = session
            .read(&["ns=2;s=A".to_string(), "ns=2;s=B".to_string()])
            .await
            .unwrap();
        assert!(results[0].is_good());
        assert_eq!(results[1].status, StatusCode::BAD_NODE_ID_UNKNOWN);

        server.session(0).unwrap().set_probe_error(true);
        assert!(session.is_channel_valid().is_err());

        session.close().await.unwrap();
        assert!(server.session(0).unwrap().is_closed());
        assert_eq!(server.clients_created(), 1);
    }
}
