// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Keyed pool of authenticated OPC UA sessions.
//!
//! Connections are grouped by [`PoolKey`] (endpoint, authentication type and
//! username). Each key holds at most [`PoolConfig::max_connections_per_key`]
//! live connections.
//!
//! # Acquisition
//!
//! 1. Scan the key's entries in insertion order. Busy entries and entries
//!    whose session is reconnecting are skipped. A free entry whose channel
//!    probe succeeds is claimed; a free entry whose probe fails or errors is
//!    evicted.
//! 2. With no reusable entry and spare capacity, a slot is reserved and a new
//!    connection is built outside the lock.
//! 3. At capacity, the oldest entry is handed out again even if busy. Two
//!    callers may then share one session.
//!
//! The scan and the `in_use` flip run under one synchronous lock, so no other
//! caller can claim the same entry between probe and claim.
//!
//! # Example
//!
//! ```rust,ignore
//! let pool = ConnectionPool::new(Arc::new(RealClientFactory::default()));
//! let connection = pool.get_connection(&credential).await?;
//! let results = connection.session().read(&["ns=2;s=Speed".into()]).await;
//! pool.release_connection(Some(&connection));
//! pool.shutdown().await;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::{ClientFactory, OpcUaClient, OpcUaSession};
use crate::error::{ConnectionError, OpcUaResult};
use crate::types::{ClientOptions, ConnectionCredential, IdentityToken, PoolKey};

/// Default number of connections per key.
pub const DEFAULT_MAX_CONNECTIONS_PER_KEY: usize = 3;

/// Default client name prefix.
pub const DEFAULT_CLIENT_NAME_PREFIX: &str = "uapool-opcua";

// =============================================================================
// PoolConfig
// =============================================================================

/// Pool tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of connections per key.
    pub max_connections_per_key: usize,
    /// Prefix of generated client names.
    pub client_name_prefix: String,
    /// Whether evicted connections get a best-effort close.
    pub close_evicted: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections_per_key: DEFAULT_MAX_CONNECTIONS_PER_KEY,
            client_name_prefix: DEFAULT_CLIENT_NAME_PREFIX.to_string(),
            close_evicted: true,
        }
    }
}

impl PoolConfig {
    /// Sets the per-key capacity (at least 1).
    pub fn with_max_connections_per_key(mut self, max: usize) -> Self {
        self.max_connections_per_key = max.max(1);
        self
    }

    /// Sets the client name prefix.
    pub fn with_client_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.client_name_prefix = prefix.into();
        self
    }

    /// Enables or disables closing evicted connections.
    pub fn with_close_evicted(mut self, close: bool) -> Self {
        self.close_evicted = close;
        self
    }
}

// =============================================================================
// PooledConnection
// =============================================================================

/// A connected client and its activated session.
pub struct PooledConnection {
    id: Uuid,
    key: PoolKey,
    client_name: String,
    created_at: DateTime<Utc>,
    client: Box<dyn OpcUaClient>,
    session: Arc<dyn OpcUaSession>,
    in_use: AtomicBool,
}

impl PooledConnection {
    /// Unique connection id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Key of the bucket owning this connection.
    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    /// Client name announced to the server.
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The session.
    pub fn session(&self) -> &Arc<dyn OpcUaSession> {
        &self.session
    }

    /// Returns `true` while the connection is handed out.
    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    fn mark_in_use(&self) {
        self.in_use.store(true, Ordering::Release);
    }

    fn mark_free(&self) {
        self.in_use.store(false, Ordering::Release);
    }

    /// Closes the session then disconnects the client, logging failures.
    async fn close_quietly(&self) {
        if let Err(e) = self.session.close().await {
            warn!(key = %self.key, client = %self.client_name, error = %e, "Failed to close session");
        }
        if let Err(e) = self.client.disconnect().await {
            warn!(key = %self.key, client = %self.client_name, error = %e, "Failed to disconnect client");
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("client_name", &self.client_name)
            .field("created_at", &self.created_at)
            .field("in_use", &self.is_in_use())
            .finish()
    }
}

// =============================================================================
// PoolStats
// =============================================================================

/// Pool counters.
#[derive(Debug, Default)]
pub struct PoolStats {
    created: AtomicU64,
    reused: AtomicU64,
    evicted: AtomicU64,
    forced_reuses: AtomicU64,
    creation_failures: AtomicU64,
}

impl PoolStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    fn record_reused(&self) {
        self.reused.fetch_add(1, Ordering::Relaxed);
    }

    fn record_evicted(&self, count: usize) {
        self.evicted.fetch_add(count as u64, Ordering::Relaxed);
    }

    fn record_forced_reuse(&self) {
        self.forced_reuses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_creation_failure(&self) {
        self.creation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Connections created.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Idle connections handed out again.
    pub fn reused(&self) -> u64 {
        self.reused.load(Ordering::Relaxed)
    }

    /// Connections dropped after a failed probe.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Busy connections handed out at capacity.
    pub fn forced_reuses(&self) -> u64 {
        self.forced_reuses.load(Ordering::Relaxed)
    }

    /// Failed connection attempts.
    pub fn creation_failures(&self) -> u64 {
        self.creation_failures.load(Ordering::Relaxed)
    }

    /// Returns a serializable copy of the counters.
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            created: self.created(),
            reused: self.reused(),
            evicted: self.evicted(),
            forced_reuses: self.forced_reuses(),
            creation_failures: self.creation_failures(),
        }
    }
}

/// Point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatsSnapshot {
    /// Connections created.
    pub created: u64,
    /// Idle connections handed out again.
    pub reused: u64,
    /// Connections evicted.
    pub evicted: u64,
    /// Busy connections handed out at capacity.
    pub forced_reuses: u64,
    /// Failed connection attempts.
    pub creation_failures: u64,
}

// =============================================================================
// ConnectionPool
// =============================================================================

#[derive(Default)]
struct Bucket {
    entries: Vec<Arc<PooledConnection>>,
    /// Creations in flight, counted against capacity.
    pending: usize,
}

enum Acquire {
    Reused(Arc<PooledConnection>),
    Forced(Arc<PooledConnection>),
    /// Carries the pool generation the slot was reserved in.
    Create(u64),
    Wait,
}

/// Keyed pool of OPC UA connections.
pub struct ConnectionPool {
    factory: Arc<dyn ClientFactory>,
    config: PoolConfig,
    buckets: Mutex<HashMap<PoolKey, Bucket>>,
    /// Bumped by every shutdown, under the bucket lock.
    generation: AtomicU64,
    slot_released: Notify,
    stats: PoolStats,
}

impl ConnectionPool {
    /// Creates a pool with default settings.
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self::with_config(factory, PoolConfig::default())
    }

    /// Creates a pool with the given settings.
    pub fn with_config(factory: Arc<dyn ClientFactory>, config: PoolConfig) -> Self {
        Self {
            factory,
            config,
            buckets: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            slot_released: Notify::new(),
            stats: PoolStats::new(),
        }
    }

    /// Returns the pool settings.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Returns the pool counters.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Number of live connections for a key.
    pub fn connection_count(&self, key: &PoolKey) -> usize {
        self.buckets
            .lock()
            .get(key)
            .map_or(0, |bucket| bucket.entries.len())
    }

    /// Number of keys with a bucket.
    pub fn key_count(&self) -> usize {
        self.buckets.lock().len()
    }

    /// Returns a connection for the credential, marked in use.
    ///
    /// Fails only when a new connection has to be built and building it
    /// fails; nothing is added to the pool in that case.
    pub async fn get_connection(
        &self,
        credential: &ConnectionCredential,
    ) -> OpcUaResult<Arc<PooledConnection>> {
        let key = PoolKey::from_credential(credential);
        let capacity = self.config.max_connections_per_key.max(1);

        loop {
            // Registered before the scan so a release between scan and await is not lost.
            let slot_released = self.slot_released.notified();

            let (decision, evicted) = {
                let mut buckets = self.buckets.lock();
                let bucket = buckets.entry(key.clone()).or_default();
                let (claimed, evicted) = claim_idle(bucket);

                let decision = if let Some(connection) = claimed {
                    Acquire::Reused(connection)
                } else if bucket.entries.len() + bucket.pending < capacity {
                    bucket.pending += 1;
                    Acquire::Create(self.generation.load(Ordering::Acquire))
                } else if let Some(oldest) = bucket.entries.first() {
                    oldest.mark_in_use();
                    Acquire::Forced(Arc::clone(oldest))
                } else {
                    Acquire::Wait
                };
                (decision, evicted)
            };

            self.dispose_evicted(evicted);

            match decision {
                Acquire::Reused(connection) => {
                    self.stats.record_reused();
                    debug!(key = %key, client = %connection.client_name, "Reusing pooled connection");
                    return Ok(connection);
                }
                Acquire::Forced(connection) => {
                    self.stats.record_forced_reuse();
                    warn!(
                        key = %key,
                        client = %connection.client_name,
                        capacity,
                        "Pool at capacity, sharing oldest connection"
                    );
                    return Ok(connection);
                }
                Acquire::Create(generation) => {
                    let reservation = SlotReservation::new(self, key.clone(), generation);
                    return match self.open_connection(credential, &key).await {
                        Ok(connection) => match reservation.commit(Arc::clone(&connection)) {
                            Ok(()) => Ok(connection),
                            Err(connection) => {
                                warn!(
                                    key = %key,
                                    client = %connection.client_name,
                                    "Pool shut down during connection setup, closing new connection"
                                );
                                connection.close_quietly().await;
                                Err(ConnectionError::PoolShutDown {
                                    endpoint: credential.endpoint_url.clone(),
                                }
                                .into())
                            }
                        },
                        Err(e) => {
                            self.stats.record_creation_failure();
                            drop(reservation);
                            Err(e)
                        }
                    };
                }
                Acquire::Wait => {
                    debug!(key = %key, "All slots are being created, waiting");
                    slot_released.await;
                }
            }
        }
    }

    /// Marks a connection as free. `None` is ignored.
    pub fn release_connection(&self, connection: Option<&Arc<PooledConnection>>) {
        if let Some(connection) = connection {
            connection.mark_free();
            debug!(key = %connection.key, client = %connection.client_name, "Connection released");
        }
    }

    /// Returns a guard that releases the connection when dropped.
    pub async fn acquire(&self, credential: &ConnectionCredential) -> OpcUaResult<ConnectionLease<'_>> {
        let connection = self.get_connection(credential).await?;
        Ok(ConnectionLease {
            pool: self,
            connection,
        })
    }

    /// Closes every connection and empties the pool.
    ///
    /// Close and disconnect failures are logged and otherwise ignored. The
    /// pool stays usable afterwards.
    pub async fn shutdown(&self) {
        let buckets = {
            let mut guard = self.buckets.lock();
            self.generation.fetch_add(1, Ordering::AcqRel);
            std::mem::take(&mut *guard)
        };
        let total: usize = buckets.values().map(|bucket| bucket.entries.len()).sum();

        for (key, bucket) in buckets {
            for connection in bucket.entries {
                debug!(key = %key, client = %connection.client_name, "Closing pooled connection");
                connection.close_quietly().await;
            }
        }

        info!(connections = total, "Connection pool shut down");
    }

    async fn open_connection(
        &self,
        credential: &ConnectionCredential,
        key: &PoolKey,
    ) -> OpcUaResult<Arc<PooledConnection>> {
        let options = ClientOptions::pooled(credential, &self.config.client_name_prefix)?;
        let identity = IdentityToken::from_credential(credential)?;
        let client = self.factory.create(&options)?;

        client.connect(&credential.endpoint_url).await?;

        let session = match client.create_session(identity).await {
            Ok(session) => session,
            Err(e) => {
                if let Err(disconnect_error) = client.disconnect().await {
                    debug!(error = %disconnect_error, "Disconnect after failed session creation failed");
                }
                return Err(e);
            }
        };

        self.stats.record_created();
        info!(
            key = %key,
            client = %options.client_name,
            policy = %options.security_policy,
            mode = %options.security_mode,
            "Created pooled connection"
        );

        Ok(Arc::new(PooledConnection {
            id: Uuid::new_v4(),
            key: key.clone(),
            client_name: options.client_name,
            created_at: Utc::now(),
            client,
            session,
            in_use: AtomicBool::new(true),
        }))
    }

    fn dispose_evicted(&self, evicted: Vec<Arc<PooledConnection>>) {
        if evicted.is_empty() {
            return;
        }
        self.stats.record_evicted(evicted.len());

        for connection in evicted {
            info!(key = %connection.key, client = %connection.client_name, "Evicted unhealthy connection");
            if !self.config.close_evicted {
                continue;
            }
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move { connection.close_quietly().await });
                }
                Err(_) => debug!("No runtime available, evicted connection dropped without close"),
            }
        }
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.config)
            .field("keys", &self.key_count())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

/// Claims the first healthy idle entry and removes unhealthy ones.
fn claim_idle(bucket: &mut Bucket) -> (Option<Arc<PooledConnection>>, Vec<Arc<PooledConnection>>) {
    let mut claimed = None;
    let mut evicted = Vec::new();

    for connection in &bucket.entries {
        if connection.is_in_use() || connection.session.is_reconnecting() {
            continue;
        }
        match connection.session.is_channel_valid() {
            Ok(true) => {
                connection.mark_in_use();
                claimed = Some(Arc::clone(connection));
                break;
            }
            Ok(false) => evicted.push(Arc::clone(connection)),
            Err(e) => {
                debug!(key = %connection.key, error = %e, "Channel probe failed");
                evicted.push(Arc::clone(connection));
            }
        }
    }

    if !evicted.is_empty() {
        bucket
            .entries
            .retain(|entry| !evicted.iter().any(|gone| Arc::ptr_eq(entry, gone)));
    }

    (claimed, evicted)
}

// =============================================================================
// SlotReservation
// =============================================================================

/// A capacity slot held while a connection is being built.
///
/// Dropping it without [`commit`](Self::commit) frees the slot, which also
/// covers a cancelled `get_connection` future.
struct SlotReservation<'a> {
    pool: &'a ConnectionPool,
    key: PoolKey,
    generation: u64,
    armed: bool,
}

impl<'a> SlotReservation<'a> {
    fn new(pool: &'a ConnectionPool, key: PoolKey, generation: u64) -> Self {
        Self {
            pool,
            key,
            generation,
            armed: true,
        }
    }

    /// Adds the connection to its bucket.
    ///
    /// Hands the connection back when a shutdown ran since the slot was
    /// reserved; the bucket it belonged to is gone by then.
    fn commit(mut self, connection: Arc<PooledConnection>) -> Result<(), Arc<PooledConnection>> {
        self.armed = false;
        let committed = {
            let mut buckets = self.pool.buckets.lock();
            if self.pool.generation.load(Ordering::Acquire) == self.generation {
                let bucket = buckets.entry(self.key.clone()).or_default();
                bucket.pending = bucket.pending.saturating_sub(1);
                bucket.entries.push(connection);
                Ok(())
            } else {
                Err(connection)
            }
        };
        self.pool.slot_released.notify_waiters();
        committed
    }
}

impl Drop for SlotReservation<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut buckets = self.pool.buckets.lock();
            let unused = match buckets.get_mut(&self.key) {
                Some(bucket) => {
                    bucket.pending = bucket.pending.saturating_sub(1);
                    bucket.entries.is_empty() && bucket.pending == 0
                }
                None => false,
            };
            if unused {
                buckets.remove(&self.key);
            }
        }
        self.pool.slot_released.notify_waiters();
    }
}

// =============================================================================
// ConnectionLease
// =============================================================================

/// A borrowed connection, released back to the pool on drop.
pub struct ConnectionLease<'a> {
    pool: &'a ConnectionPool,
    connection: Arc<PooledConnection>,
}

impl ConnectionLease<'_> {
    /// Returns the underlying connection.
    pub fn connection(&self) -> &Arc<PooledConnection> {
        &self.connection
    }
}

impl Deref for ConnectionLease<'_> {
    type Target = PooledConnection;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

impl Drop for ConnectionLease<'_> {
    fn drop(&mut self) {
        self.pool.release_connection(Some(&self.connection));
    }
}

impl fmt::Debug for ConnectionLease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionLease").field(&self.connection).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CallResult, ReadResult, StatusCode};
    use crate::codec::OpcUaValue;
    use crate::error::{ConnectionError, OpcUaError, OperationError};
    use crate::types::AuthenticationType;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counters {
        created: AtomicUsize,
        closed: AtomicUsize,
        disconnected: AtomicUsize,
    }

    struct TestSession {
        valid: AtomicBool,
        reconnecting: AtomicBool,
        probe_error: AtomicBool,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl OpcUaSession for TestSession {
        async fn read(&self, node_ids: &[String]) -> OpcUaResult<Vec<ReadResult>> {
            Ok(node_ids
                .iter()
                .map(|_| ReadResult::good(OpcUaValue::Int32(1)))
                .collect())
        }

        async fn write(&self, _node_id: &str, _value: OpcUaValue) -> OpcUaResult<StatusCode> {
            Ok(StatusCode::GOOD)
        }

        async fn call(&self, _: &str, _: &str, _: Vec<OpcUaValue>) -> OpcUaResult<CallResult> {
            Ok(CallResult::new(StatusCode::GOOD, Vec::new()))
        }

        async fn close(&self) -> OpcUaResult<()> {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
            Err(OperationError::close_failed("already closed").into())
        }

        fn is_channel_valid(&self) -> OpcUaResult<bool> {
            if self.probe_error.load(Ordering::SeqCst) {
                return Err(OperationError::channel_probe("secure channel gone").into());
            }
            Ok(self.valid.load(Ordering::SeqCst))
        }

        fn is_reconnecting(&self) -> bool {
            self.reconnecting.load(Ordering::SeqCst)
        }
    }

    struct TestClient {
        counters: Arc<Counters>,
        fail_connect: bool,
    }

    #[async_trait]
    impl OpcUaClient for TestClient {
        async fn connect(&self, endpoint_url: &str) -> OpcUaResult<()> {
            if self.fail_connect {
                return Err(ConnectionError::refused(endpoint_url, "connection refused").into());
            }
            Ok(())
        }

        async fn create_session(&self, _identity: IdentityToken) -> OpcUaResult<Arc<dyn OpcUaSession>> {
            Ok(Arc::new(TestSession {
                valid: AtomicBool::new(true),
                reconnecting: AtomicBool::new(false),
                probe_error: AtomicBool::new(false),
                counters: Arc::clone(&self.counters),
            }))
        }

        async fn disconnect(&self) -> OpcUaResult<()> {
            self.counters.disconnected.fetch_add(1, Ordering::SeqCst);
            Err(ConnectionError::NotConnected.into())
        }
    }

    #[derive(Default)]
    struct TestFactory {
        counters: Arc<Counters>,
        fail_connect: AtomicBool,
    }

    impl ClientFactory for TestFactory {
        fn create(&self, _options: &ClientOptions) -> OpcUaResult<Box<dyn OpcUaClient>> {
            self.counters.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(TestClient {
                counters: Arc::clone(&self.counters),
                fail_connect: self.fail_connect.load(Ordering::SeqCst),
            }))
        }
    }

    fn credential(user: &str) -> ConnectionCredential {
        ConnectionCredential::builder("opc.tcp://localhost:4840")
            .username_password(user, "secret")
            .build()
    }

    fn pool() -> (Arc<TestFactory>, ConnectionPool) {
        let factory = Arc::new(TestFactory::default());
        let pool = ConnectionPool::with_config(
            factory.clone(),
            PoolConfig::default().with_close_evicted(false),
        );
        (factory, pool)
    }

    #[tokio::test]
    async fn test_release_then_reuse_creates_once() {
        let (factory, pool) = pool();
        let cred = credential("alice");

        for _ in 0..5 {
            let conn = pool.get_connection(&cred).await.unwrap();
            assert!(conn.is_in_use());
            pool.release_connection(Some(&conn));
        }

        assert_eq!(factory.counters.created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.stats().reused(), 4);
        assert_eq!(pool.connection_count(&cred.pool_key()), 1);
    }

    #[tokio::test]
    async fn test_capacity_and_forced_reuse() {
        let (factory, pool) = pool();
        let cred = credential("alice");

        let first = pool.get_connection(&cred).await.unwrap();
        let _second = pool.get_connection(&cred).await.unwrap();
        let _third = pool.get_connection(&cred).await.unwrap();
        let fourth = pool.get_connection(&cred).await.unwrap();

        assert_eq!(factory.counters.created.load(Ordering::SeqCst), 3);
        assert_eq!(fourth.id(), first.id());
        assert!(fourth.is_in_use());
        assert_eq!(pool.stats().forced_reuses(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let (_factory, pool) = pool();
        let alice = pool.get_connection(&credential("alice")).await.unwrap();
        let bob = pool.get_connection(&credential("bob")).await.unwrap();

        assert_ne!(alice.key(), bob.key());
        assert_eq!(pool.key_count(), 2);

        let anonymous = ConnectionCredential::builder("opc.tcp://localhost:4840")
            .authentication_type(AuthenticationType::Anonymous)
            .build();
        let anon = pool.get_connection(&anonymous).await.unwrap();
        assert_ne!(anon.key(), alice.key());
    }

    #[tokio::test]
    async fn test_release_none_is_noop() {
        let (_factory, pool) = pool();
        pool.release_connection(None);
    }

    #[tokio::test]
    async fn test_create_failure_adds_nothing() {
        let (factory, pool) = pool();
        factory.fail_connect.store(true, Ordering::SeqCst);
        let cred = credential("alice");

        let err = pool.get_connection(&cred).await.unwrap_err();
        assert!(matches!(err, OpcUaError::Connection(_)));
        assert_eq!(pool.connection_count(&cred.pool_key()), 0);
        assert_eq!(pool.key_count(), 0);
        assert_eq!(pool.stats().creation_failures(), 1);

        factory.fail_connect.store(false, Ordering::SeqCst);
        assert!(pool.get_connection(&cred).await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_swallows_errors_and_empties() {
        let (factory, pool) = pool();
        let cred = credential("alice");
        let _a = pool.get_connection(&cred).await.unwrap();
        let _b = pool.get_connection(&credential("bob")).await.unwrap();

        pool.shutdown().await;

        assert_eq!(pool.key_count(), 0);
        assert_eq!(factory.counters.closed.load(Ordering::SeqCst), 2);
        assert_eq!(factory.counters.disconnected.load(Ordering::SeqCst), 2);

        let fresh = pool.get_connection(&cred).await.unwrap();
        assert_eq!(factory.counters.created.load(Ordering::SeqCst), 3);
        assert!(fresh.is_in_use());
    }

    #[tokio::test]
    async fn test_lease_releases_on_drop() {
        let (_factory, pool) = pool();
        let cred = credential("alice");
        let id = {
            let lease = pool.acquire(&cred).await.unwrap();
            assert!(lease.is_in_use());
            lease.id()
        };

        let again = pool.get_connection(&cred).await.unwrap();
        assert_eq!(again.id(), id);
    }

    #[test]
    fn test_pool_config_builder() {
        let config = PoolConfig::default()
            .with_max_connections_per_key(0)
            .with_client_name_prefix("plant");
        assert_eq!(config.max_connections_per_key, 1);
        assert_eq!(config.client_name_prefix, "plant");
        assert!(config.close_evicted);
    }
}
