// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client factory backed by the `opcua` crate.
//!
//! The `opcua` client API is synchronous, so every network call runs on
//! `tokio::task::spawn_blocking`. X509 identities are written into the PKI
//! directory as PEM files because the stack loads them from disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use uapool_opcua::client::RealClientFactory;
//! use uapool_opcua::pool::ConnectionPool;
//!
//! let factory = RealClientFactory::new("./pki");
//! let pool = ConnectionPool::new(Arc::new(factory));
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use opcua::client::prelude::{
    AttributeId, AttributeService, Client, ClientBuilder, EndpointDescription,
    IdentityToken as UaIdentityToken, MessageSecurityMode, MethodService, ReadValueId,
    SecurityPolicy as UaSecurityPolicy, Session, TimestampsToReturn, UserTokenPolicy, WriteValue,
};
use opcua::sync::RwLock as UaRwLock;

use crate::client::transport::{CallResult, ClientFactory, OpcUaClient, OpcUaSession, ReadResult, StatusCode};
use crate::codec::{DateTimeValue, OpcUaValue};
use crate::error::{ConnectionError, OpcUaError, OpcUaResult, OperationError};
use crate::types::{ClientOptions, IdentityToken, SecurityMode, SecurityPolicy};

/// Default PKI directory.
pub const DEFAULT_PKI_DIR: &str = "./pki";

// =============================================================================
// RealClientFactory
// =============================================================================

/// Builds clients on the `opcua` crate.
#[derive(Debug, Clone)]
pub struct RealClientFactory {
    pki_dir: PathBuf,
}

impl RealClientFactory {
    /// Creates a factory using the given PKI directory.
    pub fn new(pki_dir: impl Into<PathBuf>) -> Self {
        Self {
            pki_dir: pki_dir.into(),
        }
    }

    /// Returns the PKI directory.
    pub fn pki_dir(&self) -> &Path {
        &self.pki_dir
    }
}

impl Default for RealClientFactory {
    fn default() -> Self {
        Self::new(DEFAULT_PKI_DIR)
    }
}

impl ClientFactory for RealClientFactory {
    fn create(&self, options: &ClientOptions) -> OpcUaResult<Box<dyn OpcUaClient>> {
        let client = ClientBuilder::new()
            .application_name(options.client_name.as_str())
            .application_uri(format!("urn:{}", options.client_name))
            .product_uri(format!("urn:{}", options.client_name))
            .create_sample_keypair(true)
            .trust_server_certs(!options.reject_unauthorized)
            .pki_dir(self.pki_dir.clone())
            .session_retry_limit(options.strategy.max_retry as i32)
            .session_retry_interval(options.strategy.initial_delay.as_millis() as u32)
            .session_timeout(options.requested_session_timeout.as_millis() as u32)
            .client()
            .ok_or_else(|| ConnectionError::client_build("invalid client configuration"))?;

        debug!(client = %options.client_name, "Built OPC UA client");

        Ok(Box::new(RealClient {
            options: options.clone(),
            pki_dir: self.pki_dir.clone(),
            client: Arc::new(Mutex::new(client)),
            endpoint: Mutex::new(None),
            session: Mutex::new(None),
        }))
    }
}

// =============================================================================
// RealClient
// =============================================================================

struct RealClient {
    options: ClientOptions,
    pki_dir: PathBuf,
    client: Arc<Mutex<Client>>,
    endpoint: Mutex<Option<EndpointDescription>>,
    session: Mutex<Option<Arc<UaRwLock<Session>>>>,
}

#[async_trait]
impl OpcUaClient for RealClient {
    async fn connect(&self, endpoint_url: &str) -> OpcUaResult<()> {
        let client = Arc::clone(&self.client);
        let url = endpoint_url.to_string();
        let policy = ua_security_policy(self.options.security_policy);
        let mode = ua_security_mode(self.options.security_mode);
        let must_exist = self.options.endpoint_must_exist;

        info!(endpoint = %url, policy = %self.options.security_policy, "Connecting to OPC UA server");

        let endpoint = blocking(
            move || {
                let endpoints = client
                    .lock()
                    .get_server_endpoints_from_url(url.as_str())
                    .map_err(|status| ConnectionError::refused(&url, status.to_string()))?;

                let found = endpoints
                    .iter()
                    .find(|e| {
                        e.security_policy_uri.as_ref() == policy.to_uri() && e.security_mode == mode
                    })
                    .cloned();

                match found {
                    Some(endpoint) => Ok(endpoint),
                    None if must_exist => Err(ConnectionError::no_suitable_endpoint(format!(
                        "{:?}/{:?}",
                        policy, mode
                    ))
                    .into()),
                    None => Ok(EndpointDescription::from((
                        url.as_str(),
                        policy.to_uri(),
                        mode,
                        UserTokenPolicy::anonymous(),
                    ))),
                }
            },
            |message| ConnectionError::refused(endpoint_url, message).into(),
        )
        .await?;

        *self.endpoint.lock() = Some(endpoint);
        Ok(())
    }

    async fn create_session(&self, identity: IdentityToken) -> OpcUaResult<Arc<dyn OpcUaSession>> {
        let endpoint = self
            .endpoint
            .lock()
            .clone()
            .ok_or(ConnectionError::NotConnected)?;
        let endpoint_url = endpoint.endpoint_url.as_ref().to_string();
        let token = ua_identity_token(identity, &self.pki_dir, &self.options.client_name)?;
        let client = Arc::clone(&self.client);
        let url = endpoint_url.clone();

        let session = blocking(
            move || {
                client
                    .lock()
                    .connect_to_endpoint(endpoint, token)
                    .map_err(|status| ConnectionError::session_rejected(&url, status.to_string()).into())
            },
            |message| ConnectionError::session_rejected(&endpoint_url, message).into(),
        )
        .await?;

        *self.session.lock() = Some(Arc::clone(&session));
        info!(endpoint = %endpoint_url, client = %self.options.client_name, "OPC UA session activated");

        Ok(Arc::new(RealSession { session }))
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        let Some(session) = self.session.lock().take() else {
            return Ok(());
        };
        blocking(
            move || {
                let session = session.read();
                if session.is_connected() {
                    session.disconnect();
                }
                Ok(())
            },
            |message| ConnectionError::refused("disconnect", message).into(),
        )
        .await
    }
}

// =============================================================================
// RealSession
// =============================================================================

struct RealSession {
    session: Arc<UaRwLock<Session>>,
}

#[async_trait]
impl OpcUaSession for RealSession {
    async fn read(&self, node_ids: &[String]) -> OpcUaResult<Vec<ReadResult>> {
        let nodes = node_ids
            .iter()
            .map(|id| {
                Ok(ReadValueId {
                    node_id: parse_node_id(id)?,
                    attribute_id: AttributeId::Value as u32,
                    index_range: opcua::types::UAString::null(),
                    data_encoding: opcua::types::QualifiedName::null(),
                })
            })
            .collect::<OpcUaResult<Vec<_>>>()?;
        let session = Arc::clone(&self.session);

        blocking(
            move || {
                let values = session
                    .read()
                    .read(&nodes, TimestampsToReturn::Both, 0.0)
                    .map_err(|status| OperationError::read_failed(status.to_string()))?;

                Ok(values
                    .into_iter()
                    .map(|data_value| {
                        let status = StatusCode(data_value.status.map_or(0, |s| s.bits()));
                        match data_value.value {
                            Some(variant) => ReadResult {
                                status,
                                ..ReadResult::good(from_ua_variant(&variant))
                            },
                            None => ReadResult::bad(status),
                        }
                    })
                    .collect())
            },
            |message| OperationError::read_failed(message).into(),
        )
        .await
    }

    async fn write(&self, node_id: &str, value: OpcUaValue) -> OpcUaResult<StatusCode> {
        let write_value = WriteValue {
            node_id: parse_node_id(node_id)?,
            attribute_id: AttributeId::Value as u32,
            index_range: opcua::types::UAString::null(),
            value: opcua::types::DataValue::new_now(to_ua_variant(&value)),
        };
        let session = Arc::clone(&self.session);
        let target = node_id.to_string();

        blocking(
            move || {
                let results = session
                    .read()
                    .write(&[write_value])
                    .map_err(|status| OperationError::write_failed(&target, status.to_string()))?;
                Ok(results
                    .first()
                    .map_or(StatusCode(0x8000_0000), |s| StatusCode(s.bits())))
            },
            |message| OperationError::write_failed(node_id, message).into(),
        )
        .await
    }

    async fn call(
        &self,
        object_id: &str,
        method_id: &str,
        input_arguments: Vec<OpcUaValue>,
    ) -> OpcUaResult<CallResult> {
        let object = parse_node_id(object_id)?;
        let method = parse_node_id(method_id)?;
        let arguments: Vec<opcua::types::Variant> = input_arguments.iter().map(to_ua_variant).collect();
        let session = Arc::clone(&self.session);
        let target = method_id.to_string();

        blocking(
            move || {
                let result = session
                    .read()
                    .call((object, method, Some(arguments)))
                    .map_err(|status| OperationError::call_failed(&target, status.to_string()))?;
                let outputs = result
                    .output_arguments
                    .unwrap_or_default()
                    .iter()
                    .map(from_ua_variant)
                    .collect();
                Ok(CallResult::new(StatusCode(result.status_code.bits()), outputs))
            },
            |message| OperationError::call_failed(method_id, message).into(),
        )
        .await
    }

    async fn close(&self) -> OpcUaResult<()> {
        let session = Arc::clone(&self.session);
        blocking(
            move || {
                let session = session.read();
                if session.is_connected() {
                    session.disconnect();
                }
                Ok(())
            },
            |message| OperationError::close_failed(message).into(),
        )
        .await
    }

    fn is_channel_valid(&self) -> OpcUaResult<bool> {
        match self.session.try_read() {
            Some(session) => Ok(session.is_connected()),
            None => Err(OperationError::channel_probe("session lock unavailable").into()),
        }
    }

    fn is_reconnecting(&self) -> bool {
        // The stack holds the write lock while it re-establishes the channel.
        self.session.is_locked_exclusive()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Runs a blocking protocol call off the async runtime.
async fn blocking<T, F, E>(task: F, on_join_error: E) -> OpcUaResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> OpcUaResult<T> + Send + 'static,
    E: FnOnce(String) -> OpcUaError,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(result) => result,
        Err(e) => Err(on_join_error(format!("protocol task aborted: {e}"))),
    }
}

fn parse_node_id(node_id: &str) -> OpcUaResult<opcua::types::NodeId> {
    opcua::types::NodeId::from_str(node_id)
        .map_err(|_| OperationError::invalid_node_id(node_id).into())
}

fn ua_security_policy(policy: SecurityPolicy) -> UaSecurityPolicy {
    match policy {
        SecurityPolicy::None => UaSecurityPolicy::None,
        SecurityPolicy::Basic128Rsa15 => UaSecurityPolicy::Basic128Rsa15,
        SecurityPolicy::Basic256 => UaSecurityPolicy::Basic256,
        SecurityPolicy::Basic256Sha256 => UaSecurityPolicy::Basic256Sha256,
        SecurityPolicy::Aes128Sha256RsaOaep => UaSecurityPolicy::Aes128Sha256RsaOaep,
        SecurityPolicy::Aes256Sha256RsaPss => UaSecurityPolicy::Aes256Sha256RsaPss,
    }
}

fn ua_security_mode(mode: SecurityMode) -> MessageSecurityMode {
    match mode {
        SecurityMode::None => MessageSecurityMode::None,
        SecurityMode::Sign => MessageSecurityMode::Sign,
        SecurityMode::SignAndEncrypt => MessageSecurityMode::SignAndEncrypt,
    }
}

/// Converts the identity, writing X509 material into the PKI directory.
fn ua_identity_token(
    identity: IdentityToken,
    pki_dir: &Path,
    client_name: &str,
) -> OpcUaResult<UaIdentityToken> {
    match identity {
        IdentityToken::Anonymous => Ok(UaIdentityToken::Anonymous),
        IdentityToken::UserName { username, password } => {
            Ok(UaIdentityToken::UserName(username, password))
        }
        IdentityToken::X509 {
            certificate,
            private_key,
        } => {
            let dir = pki_dir.join("user");
            let cert_path = dir.join(format!("{client_name}-cert.pem"));
            let key_path = dir.join(format!("{client_name}-key.pem"));
            let write = |path: &Path, contents: &str| {
                std::fs::write(path, contents).map_err(|e| {
                    OpcUaError::from(ConnectionError::client_build(format!(
                        "cannot write {}: {e}",
                        path.display()
                    )))
                })
            };

            std::fs::create_dir_all(&dir).map_err(|e| {
                ConnectionError::client_build(format!("cannot create {}: {e}", dir.display()))
            })?;
            write(&cert_path, &certificate)?;
            write(&key_path, &private_key)?;

            Ok(UaIdentityToken::X509(cert_path, key_path))
        }
    }
}

fn from_ua_variant(variant: &opcua::types::Variant) -> OpcUaValue {
    use opcua::types::Variant;

    match variant {
        Variant::Empty => OpcUaValue::Null,
        Variant::Boolean(v) => OpcUaValue::Boolean(*v),
        Variant::SByte(v) => OpcUaValue::SByte(*v),
        Variant::Byte(v) => OpcUaValue::Byte(*v),
        Variant::Int16(v) => OpcUaValue::Int16(*v),
        Variant::UInt16(v) => OpcUaValue::UInt16(*v),
        Variant::Int32(v) => OpcUaValue::Int32(*v),
        Variant::UInt32(v) => OpcUaValue::UInt32(*v),
        Variant::Int64(v) => OpcUaValue::Int64(*v),
        Variant::UInt64(v) => OpcUaValue::UInt64(*v),
        Variant::Float(v) => OpcUaValue::Float(*v),
        Variant::Double(v) => OpcUaValue::Double(*v),
        Variant::String(v) => OpcUaValue::String(v.as_ref().to_string()),
        Variant::DateTime(v) => OpcUaValue::DateTime(DateTimeValue::Valid(v.as_chrono())),
        Variant::Guid(v) => OpcUaValue::Guid(v.to_string()),
        Variant::ByteString(v) => OpcUaValue::ByteString(v.value.clone().unwrap_or_default()),
        Variant::Array(array) => {
            OpcUaValue::Array(array.values.iter().map(from_ua_variant).collect())
        }
        other => OpcUaValue::String(format!("{other:?}")),
    }
}

fn to_ua_variant(value: &OpcUaValue) -> opcua::types::Variant {
    use opcua::types::Variant;

    match value {
        OpcUaValue::Null => Variant::Empty,
        OpcUaValue::Boolean(v) => Variant::Boolean(*v),
        OpcUaValue::SByte(v) => Variant::SByte(*v),
        OpcUaValue::Byte(v) => Variant::Byte(*v),
        OpcUaValue::Int16(v) => Variant::Int16(*v),
        OpcUaValue::UInt16(v) => Variant::UInt16(*v),
        OpcUaValue::Int32(v) => Variant::Int32(*v),
        OpcUaValue::UInt32(v) => Variant::UInt32(*v),
        OpcUaValue::Int64(v) => Variant::Int64(*v),
        OpcUaValue::UInt64(v) => Variant::UInt64(*v),
        OpcUaValue::Float(v) => Variant::Float(*v),
        OpcUaValue::Double(v) => Variant::Double(*v),
        OpcUaValue::String(v) => Variant::String(opcua::types::UAString::from(v.as_str())),
        OpcUaValue::DateTime(DateTimeValue::Valid(v)) => {
            Variant::DateTime(Box::new(opcua::types::DateTime::from(*v)))
        }
        OpcUaValue::DateTime(DateTimeValue::Invalid) => Variant::DateTime(Box::new(
            opcua::types::DateTime::null(),
        )),
        OpcUaValue::Guid(v) => match opcua::types::Guid::from_str(v) {
            Ok(guid) => Variant::Guid(Box::new(guid)),
            Err(_) => {
                warn!(guid = %v, "Unparseable GUID sent as string");
                Variant::String(opcua::types::UAString::from(v.as_str()))
            }
        },
        OpcUaValue::ByteString(v) => Variant::ByteString(opcua::types::ByteString::from(v.as_slice())),
        OpcUaValue::Array(items) => {
            let variants: Vec<Variant> = items.iter().map(to_ua_variant).collect();
            opcua::types::Array::new(opcua::types::VariantTypeId::Variant, variants)
                .map(|array| Variant::Array(Box::new(array)))
                .unwrap_or(Variant::Empty)
        }
    }
}
