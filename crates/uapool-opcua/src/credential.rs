// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Credential validation and one-shot connection testing.
//!
//! Validation runs before any network attempt. [`test_connection`] opens a
//! throwaway client with the probe profile from
//! [`ClientOptions::credential_test`], so it never touches the pool.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::client::{ClientFactory, OpcUaClient};
use crate::error::{OpcUaResult, ValidationError};
use crate::types::{AuthenticationType, ClientOptions, ConnectionCredential, IdentityToken};

/// Accepted endpoint URL schemes.
pub const ENDPOINT_SCHEMES: [&str; 2] = ["opc.tcp://", "opc.https://"];

// =============================================================================
// Validation
// =============================================================================

/// Validates an endpoint URL.
pub fn validate_endpoint_url(url: &str) -> OpcUaResult<()> {
    if url.trim().is_empty() {
        return Err(ValidationError::EmptyEndpoint.into());
    }
    if !ENDPOINT_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
        return Err(ValidationError::invalid_scheme(url).into());
    }
    Ok(())
}

/// Validates a credential record.
///
/// The password of a `usernamePassword` credential may be empty.
pub fn validate_credential(credential: &ConnectionCredential) -> OpcUaResult<()> {
    validate_endpoint_url(&credential.endpoint_url)?;

    match credential.authentication_type {
        AuthenticationType::Anonymous => {}
        AuthenticationType::UsernamePassword => {
            if credential.username_or_empty().is_empty() {
                return Err(ValidationError::MissingUsername.into());
            }
        }
        AuthenticationType::X509 => {
            if !credential.has_x509_material() {
                return Err(ValidationError::IncompleteX509.into());
            }
        }
    }
    Ok(())
}

// =============================================================================
// Connection Test
// =============================================================================

/// Outcome of a connection test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CredentialTestStatus {
    /// The endpoint accepted a session.
    #[serde(rename = "OK")]
    Ok,
    /// Validation or connection failed.
    Error,
}

impl fmt::Display for CredentialTestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::Error => f.write_str("Error"),
        }
    }
}

/// Result returned by [`test_connection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialTestResult {
    /// Outcome.
    pub status: CredentialTestStatus,
    /// Human-readable message.
    pub message: String,
}

impl CredentialTestResult {
    /// Message reported on success.
    pub const SUCCESS_MESSAGE: &'static str = "Connection successful!";

    fn ok() -> Self {
        Self {
            status: CredentialTestStatus::Ok,
            message: Self::SUCCESS_MESSAGE.to_string(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: CredentialTestStatus::Error,
            message: message.into(),
        }
    }

    /// Returns `true` on success.
    pub fn is_ok(&self) -> bool {
        self.status == CredentialTestStatus::Ok
    }
}

/// Connects, opens a session and tears both down again.
///
/// Never fails: every problem is reported through the returned status.
pub async fn test_connection(
    factory: &dyn ClientFactory,
    credential: Option<&ConnectionCredential>,
    client_name_prefix: &str,
) -> CredentialTestResult {
    let Some(credential) = credential else {
        return CredentialTestResult::error(ValidationError::MissingCredential.to_string());
    };

    if let Err(e) = validate_credential(credential) {
        return CredentialTestResult::error(e.to_string());
    }

    let client = match ClientOptions::credential_test(credential, client_name_prefix)
        .and_then(|options| factory.create(&options))
    {
        Ok(client) => client,
        Err(e) => return CredentialTestResult::error(e.root_message()),
    };

    match probe(client.as_ref(), credential).await {
        Ok(()) => {
            info!(endpoint = %credential.endpoint_url, "Connection test succeeded");
            CredentialTestResult::ok()
        }
        Err(e) => {
            if let Err(disconnect_error) = client.disconnect().await {
                debug!(error = %disconnect_error, "Disconnect after failed connection test failed");
            }
            e.log("connection test");
            CredentialTestResult::error(e.root_message())
        }
    }
}

async fn probe(client: &dyn OpcUaClient, credential: &ConnectionCredential) -> OpcUaResult<()> {
    client.connect(&credential.endpoint_url).await?;
    let identity = IdentityToken::from_credential(credential)?;
    let session = client.create_session(identity).await?;
    session.close().await?;
    client.disconnect().await?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
