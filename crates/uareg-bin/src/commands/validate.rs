// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use uareg_config::UaregConfig;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    let config = uareg_config::load_config(config_path)
        .map_err(|e| BinError::config(config_path, e))?;
    let warnings = collect_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Service ID: {}", config.service.id);
            println!("  Service Name: {}", config.service.name);
            println!("  Application URI: {}", config.opcua.application_uri);
            println!("  PKI: {}", config.opcua.pki_dir.display());
            println!(
                "  Connection: {}",
                if config.opcua.use_reverse_proxy { "reverse proxy" } else { "direct" }
            );
            println!(
                "  Discovery refresh: {}",
                humantime::format_duration(config.discovery.refresh_interval)
            );

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", to_json(&config)?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "service_id": config.service.id,
                    "service_name": config.service.name,
                    "site_id": config.service.site_id,
                    "application_uri": config.opcua.application_uri,
                    "use_reverse_proxy": config.opcua.use_reverse_proxy,
                    "hard_delete_on_removal": config.registry.hard_delete_on_removal,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!("{}", to_json(&output)?);
        }
    }

    Ok(())
}

/// Returns non-fatal findings for a valid configuration.
fn collect_warnings(config: &UaregConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.service.site_id.is_none() {
        warnings.push("No site id configured, applications are keyed by gateway".to_string());
    }
    if config.discovery.activation_filter.is_none() {
        warnings.push("No activation filter, discovered endpoints are not auto-activated".to_string());
    }
    if config.registry.hard_delete_on_removal {
        warnings.push("Endpoints are deleted instead of deactivated when lost".to_string());
    }
    if let Some(parent) = config.opcua.pki_dir.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            warnings.push(format!("PKI parent directory does not exist: {}", parent.display()));
        }
    }

    warnings
}

fn to_json<T: serde::Serialize>(value: &T) -> BinResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|source| BinError::Output {
            what: "validation report",
            source,
        })
}

// =============================================================================
// Tests
// =============================================================================
