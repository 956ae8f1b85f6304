// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Credential model and client construction options.
//!
//! A [`ConnectionCredential`] is the resolved credential record handed in by
//! the configuration layer. The pool derives a [`PoolKey`] from it and, when a
//! new connection is needed, a set of [`ClientOptions`] plus an
//! [`IdentityToken`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::error::{ConfigurationError, OpcUaError, OpcUaResult, ValidationError};

// =============================================================================
// AuthenticationType
// =============================================================================

/// How the client authenticates its session.
///
/// Deserializes through [`FromStr`], so an empty value means `anonymous`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthenticationType {
    /// No user identity.
    #[default]
    Anonymous,
    /// Username and password identity.
    UsernamePassword,
    /// X509 certificate identity.
    X509,
}

impl AuthenticationType {
    /// Returns the credential record name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::UsernamePassword => "usernamePassword",
            Self::X509 => "x509",
        }
    }
}

impl fmt::Display for AuthenticationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthenticationType {
    type Err = OpcUaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anonymous" | "" => Ok(Self::Anonymous),
            "usernamePassword" => Ok(Self::UsernamePassword),
            "x509" => Ok(Self::X509),
            other => Err(OpcUaError::configuration(
                ConfigurationError::UnknownAuthenticationType {
                    value: other.to_string(),
                },
            )),
        }
    }
}

impl<'de> Deserialize<'de> for AuthenticationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

// =============================================================================
// SecurityPolicy
// =============================================================================

/// OPC UA security policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SecurityPolicy {
    /// No security policy.
    #[default]
    None,
    /// Basic128Rsa15 (deprecated).
    Basic128Rsa15,
    /// Basic256 (deprecated).
    Basic256,
    /// Basic256Sha256.
    Basic256Sha256,
    /// Aes128_Sha256_RsaOaep.
    Aes128Sha256RsaOaep,
    /// Aes256_Sha256_RsaPss.
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    /// Resolves a credential policy name.
    ///
    /// Unrecognized names, including an empty string, resolve to `None`.
    pub fn from_name_lenient(name: &str) -> Self {
        match name {
            "Basic256Sha256" => Self::Basic256Sha256,
            "Basic256" => Self::Basic256,
            "Basic128Rsa15" => Self::Basic128Rsa15,
            "Aes128_Sha256_RsaOaep" => Self::Aes128Sha256RsaOaep,
            "Aes256_Sha256_RsaPss" => Self::Aes256Sha256RsaPss,
            _ => Self::None,
        }
    }

    /// Returns the OPC UA policy URI.
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            Self::Basic128Rsa15 => "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15",
            Self::Basic256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256",
            Self::Basic256Sha256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
            Self::Aes128Sha256RsaOaep => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep"
            }
            Self::Aes256Sha256RsaPss => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss"
            }
        }
    }

    /// Returns the credential record name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Basic128Rsa15 => "Basic128Rsa15",
            Self::Basic256 => "Basic256",
            Self::Basic256Sha256 => "Basic256Sha256",
            Self::Aes128Sha256RsaOaep => "Aes128_Sha256_RsaOaep",
            Self::Aes256Sha256RsaPss => "Aes256_Sha256_RsaPss",
        }
    }

    /// Returns `true` if this policy is deprecated.
    #[inline]
    pub const fn is_deprecated(&self) -> bool {
        matches!(self, Self::Basic128Rsa15 | Self::Basic256)
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// SecurityMode
// =============================================================================

/// OPC UA message security mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SecurityMode {
    /// No signing or encryption.
    #[default]
    None,
    /// Messages are signed.
    Sign,
    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl SecurityMode {
    /// Resolves a credential mode name.
    ///
    /// Accepts both `SignAndEncrypt` and the display form `Sign & Encrypt`.
    /// Anything else resolves to `None`.
    pub fn from_name_lenient(name: &str) -> Self {
        match name {
            "Sign" => Self::Sign,
            "SignAndEncrypt" | "Sign & Encrypt" => Self::SignAndEncrypt,
            _ => Self::None,
        }
    }

    /// Returns the mode name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// ConnectionCredential
// =============================================================================

/// An endpoint plus the authentication material used to reach it.
///
/// Policy and mode are kept as the raw record strings and resolved leniently
/// when a client is built, so an unknown value degrades to `None` instead of
/// rejecting the record.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCredential {
    /// Server endpoint URL (`opc.tcp://` or `opc.https://`).
    #[serde(alias = "endpoint_url")]
    pub endpoint_url: String,

    /// Security policy name.
    #[serde(default, alias = "security_policy", skip_serializing_if = "Option::is_none")]
    pub security_policy: Option<String>,

    /// Security mode name.
    #[serde(default, alias = "security_mode", skip_serializing_if = "Option::is_none")]
    pub security_mode: Option<String>,

    /// Authentication type.
    #[serde(default, alias = "authentication_type")]
    pub authentication_type: AuthenticationType,

    /// Username for `usernamePassword`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for `usernamePassword`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Certificate PEM text for `x509`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,

    /// Private key PEM text for `x509`.
    #[serde(default, alias = "private_key", skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

impl ConnectionCredential {
    /// Creates an anonymous credential for the endpoint.
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ..Default::default()
        }
    }

    /// Creates a builder for the endpoint.
    pub fn builder(endpoint_url: impl Into<String>) -> ConnectionCredentialBuilder {
        ConnectionCredentialBuilder::new(endpoint_url)
    }

    /// Returns the resolved security policy.
    pub fn security_policy(&self) -> SecurityPolicy {
        SecurityPolicy::from_name_lenient(self.security_policy.as_deref().unwrap_or("None"))
    }

    /// Returns the resolved security mode.
    pub fn security_mode(&self) -> SecurityMode {
        SecurityMode::from_name_lenient(self.security_mode.as_deref().unwrap_or("None"))
    }

    /// Returns the username, or an empty string.
    pub fn username_or_empty(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }

    /// Returns `true` if both certificate and private key are present.
    pub fn has_x509_material(&self) -> bool {
        non_empty(&self.certificate) && non_empty(&self.private_key)
    }

    /// Returns the pool key for this credential.
    pub fn pool_key(&self) -> PoolKey {
        PoolKey::from_credential(self)
    }
}

impl fmt::Debug for ConnectionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCredential")
            .field("endpoint_url", &self.endpoint_url)
            .field("security_policy", &self.security_policy)
            .field("security_mode", &self.security_mode)
            .field("authentication_type", &self.authentication_type)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("certificate", &self.certificate.as_ref().map(|_| "<pem>"))
            .field("private_key", &self.private_key.as_ref().map(|_| "***"))
            .finish()
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// Builder for [`ConnectionCredential`].
#[derive(Debug, Clone)]
pub struct ConnectionCredentialBuilder {
    credential: ConnectionCredential,
}

impl ConnectionCredentialBuilder {
    /// Creates a new builder.
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            credential: ConnectionCredential::new(endpoint_url),
        }
    }

    /// Sets the security policy name.
    pub fn security_policy(mut self, policy: impl Into<String>) -> Self {
        self.credential.security_policy = Some(policy.into());
        self
    }

    /// Sets the security mode name.
    pub fn security_mode(mut self, mode: impl Into<String>) -> Self {
        self.credential.security_mode = Some(mode.into());
        self
    }

    /// Uses username/password authentication.
    pub fn username_password(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credential.authentication_type = AuthenticationType::UsernamePassword;
        self.credential.username = Some(username.into());
        self.credential.password = Some(password.into());
        self
    }

    /// Uses X509 authentication with PEM text.
    pub fn x509(mut self, certificate: impl Into<String>, private_key: impl Into<String>) -> Self {
        self.credential.authentication_type = AuthenticationType::X509;
        self.credential.certificate = Some(certificate.into());
        self.credential.private_key = Some(private_key.into());
        self
    }

    /// Sets the authentication type without touching the material.
    pub fn authentication_type(mut self, auth: AuthenticationType) -> Self {
        self.credential.authentication_type = auth;
        self
    }

    /// Sets the username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.credential.username = Some(username.into());
        self
    }

    /// Sets the certificate PEM text.
    pub fn certificate(mut self, pem: impl Into<String>) -> Self {
        self.credential.certificate = Some(pem.into());
        self
    }

    /// Sets the private key PEM text.
    pub fn private_key(mut self, pem: impl Into<String>) -> Self {
        self.credential.private_key = Some(pem.into());
        self
    }

    /// Builds the credential.
    pub fn build(self) -> ConnectionCredential {
        self.credential
    }
}

// =============================================================================
// PoolKey
// =============================================================================

/// Bucket key of the connection pool: `endpoint|authType|username`.
///
/// Security policy and mode are not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PoolKey(String);

impl PoolKey {
    /// Derives the key from a credential.
    pub fn from_credential(credential: &ConnectionCredential) -> Self {
        Self(format!(
            "{}|{}|{}",
            credential.endpoint_url,
            credential.authentication_type,
            credential.username_or_empty()
        ))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// IdentityToken
// =============================================================================

/// User identity presented when a session is activated.
#[derive(Clone, PartialEq, Eq)]
pub enum IdentityToken {
    /// No user identity.
    Anonymous,
    /// Username and password.
    UserName {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// X509 certificate and private key, as PEM text.
    X509 {
        /// Certificate PEM.
        certificate: String,
        /// Private key PEM.
        private_key: String,
    },
}

impl IdentityToken {
    /// Builds the identity for a credential.
    ///
    /// Fails when an X509 credential lacks certificate or key.
    pub fn from_credential(credential: &ConnectionCredential) -> OpcUaResult<Self> {
        match credential.authentication_type {
            AuthenticationType::Anonymous => Ok(Self::Anonymous),
            AuthenticationType::UsernamePassword => Ok(Self::UserName {
                username: credential.username.clone().unwrap_or_default(),
                password: credential.password.clone().unwrap_or_default(),
            }),
            AuthenticationType::X509 => {
                if !credential.has_x509_material() {
                    return Err(ValidationError::IncompleteX509.into());
                }
                Ok(Self::X509 {
                    certificate: credential.certificate.clone().unwrap_or_default(),
                    private_key: credential.private_key.clone().unwrap_or_default(),
                })
            }
        }
    }

    /// Returns `true` for the anonymous identity.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::UserName { username, .. } => f
                .debug_struct("UserName")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Self::X509 { .. } => f.write_str("X509 { .. }"),
        }
    }
}

// =============================================================================
// ClientOptions
// =============================================================================

/// Reconnection budget handed to the protocol client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStrategy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum number of retries.
    pub max_retry: u32,
    /// Upper bound for the backoff delay.
    pub max_delay: Duration,
}

impl ConnectionStrategy {
    /// Budget for pooled connections.
    pub const POOLED: Self = Self {
        initial_delay: Duration::from_millis(1000),
        max_retry: 3,
        max_delay: Duration::from_millis(10_000),
    };

    /// Budget for one-shot credential probes.
    pub const CREDENTIAL_TEST: Self = Self {
        initial_delay: Duration::from_millis(1000),
        max_retry: 1,
        max_delay: Duration::from_millis(2000),
    };
}

/// Session timeout requested for pooled connections.
pub const POOLED_SESSION_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Session timeout requested for credential probes.
pub const CREDENTIAL_TEST_SESSION_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Options passed to a [`ClientFactory`](crate::client::ClientFactory).
#[derive(Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Application / client name announced to the server.
    pub client_name: String,
    /// Resolved security policy.
    pub security_policy: SecurityPolicy,
    /// Resolved security mode.
    pub security_mode: SecurityMode,
    /// Reconnection budget.
    pub strategy: ConnectionStrategy,
    /// Requested session timeout.
    pub requested_session_timeout: Duration,
    /// Whether the endpoint must appear in the server's endpoint list.
    pub endpoint_must_exist: bool,
    /// Whether untrusted server certificates are rejected.
    pub reject_unauthorized: bool,
    /// Client certificate PEM for X509 credentials.
    pub certificate: Option<String>,
    /// Client private key PEM for X509 credentials.
    pub private_key: Option<String>,
}

impl ClientOptions {
    /// Options for a pooled connection: `{prefix}-pool-{random}`.
    pub fn pooled(credential: &ConnectionCredential, prefix: &str) -> OpcUaResult<Self> {
        let name = format!("{}-pool-{}", prefix, random_suffix());
        Self::build(
            credential,
            name,
            ConnectionStrategy::POOLED,
            POOLED_SESSION_TIMEOUT,
        )
    }

    /// Options for a credential probe: `{prefix}-credential-test`.
    pub fn credential_test(credential: &ConnectionCredential, prefix: &str) -> OpcUaResult<Self> {
        Self::build(
            credential,
            format!("{}-credential-test", prefix),
            ConnectionStrategy::CREDENTIAL_TEST,
            CREDENTIAL_TEST_SESSION_TIMEOUT,
        )
    }

    fn build(
        credential: &ConnectionCredential,
        client_name: String,
        strategy: ConnectionStrategy,
        requested_session_timeout: Duration,
    ) -> OpcUaResult<Self> {
        let (certificate, private_key) = match credential.authentication_type {
            AuthenticationType::X509 => {
                if !credential.has_x509_material() {
                    return Err(ValidationError::IncompleteX509.into());
                }
                (credential.certificate.clone(), credential.private_key.clone())
            }
            _ => (None, None),
        };

        Ok(Self {
            client_name,
            security_policy: credential.security_policy(),
            security_mode: credential.security_mode(),
            strategy,
            requested_session_timeout,
            endpoint_must_exist: false,
            reject_unauthorized: false,
            certificate,
            private_key,
        })
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("client_name", &self.client_name)
            .field("security_policy", &self.security_policy)
            .field("security_mode", &self.security_mode)
            .field("strategy", &self.strategy)
            .field("requested_session_timeout", &self.requested_session_timeout)
            .field("endpoint_must_exist", &self.endpoint_must_exist)
            .field("reject_unauthorized", &self.reject_unauthorized)
            .field("has_certificate", &self.certificate.is_some())
            .finish()
    }
}

/// Eight random lowercase alphanumerics.
fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
