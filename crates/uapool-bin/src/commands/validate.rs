// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use std::io::Write;

use uapool_config::{AppConfig, ConfigLoader};

use super::Output;
use crate::cli::{Cli, ValidateArgs};
use crate::error::{BinError, BinResult};

const REDACTED: &str = "********";

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: &ValidateArgs, out: Output<'_>) -> BinResult<()> {
    let config_path = &cli.config;

    let config = ConfigLoader::new()
        .load(config_path)
        .map_err(|e| BinError::from(e).with_context("Configuration validation failed"))?;

    let warnings = collect_warnings(&config, &cli.credential);

    writeln!(out, "✓ Configuration is valid: {}", config_path.display())?;
    writeln!(out)?;
    writeln!(out, "Summary:")?;
    writeln!(out, "  Credentials: {}", config.credentials.len())?;
    for (name, credential) in &config.credentials {
        writeln!(
            out,
            "    {}: {} ({})",
            name, credential.endpoint_url, credential.authentication_type
        )?;
    }
    writeln!(
        out,
        "  Max connections per key: {}",
        config.pool.max_connections_per_key
    )?;
    writeln!(out, "  Output source: {}", config.output.source)?;

    if !warnings.is_empty() {
        writeln!(out)?;
        writeln!(out, "Warnings:")?;
        for warning in &warnings {
            writeln!(out, "  ⚠ {}", warning)?;
        }
    }

    if args.show_config {
        writeln!(out)?;
        writeln!(out, "Parsed configuration:")?;
        writeln!(out, "{}", serde_json::to_string_pretty(&redacted(config))?)?;
    }

    Ok(())
}

fn collect_warnings(config: &AppConfig, selected: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.credentials.is_empty() {
        warnings.push("No credentials configured".to_string());
    } else if !config.credentials.contains_key(selected) {
        warnings.push(format!("Selected credential '{}' is not configured", selected));
    }

    for (name, credential) in &config.credentials {
        if credential.security_policy() == uapool_opcua::SecurityPolicy::None
            && credential.authentication_type != uapool_opcua::AuthenticationType::Anonymous
        {
            warnings.push(format!(
                "Credential '{}' sends user identity without a security policy",
                name
            ));
        }
    }

    warnings
}

/// Masks passwords and private keys.
fn redacted(mut config: AppConfig) -> AppConfig {
    for credential in config.credentials.values_mut() {
        if credential.password.is_some() {
            credential.password = Some(REDACTED.to_string());
        }
        if credential.private_key.is_some() {
            credential.private_key = Some(REDACTED.to_string());
        }
    }
    config
}
