// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use tracing::info;

use crate::cli::{Cli, RunArgs};
use crate::error::{BinError, BinResult};
use crate::logging::init_logging;
use crate::runtime::{RuntimeBuilder, DEFAULT_SHUTDOWN_GRACE};

/// Executes the `run` command to start the registry.
///
/// Logging is installed after the configuration loads so the file's
/// `logging` section applies; CLI flags still take precedence.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let config =
        uareg_config::load_config(&cli.config).map_err(|e| BinError::config(&cli.config, e))?;

    init_logging(
        cli.effective_log_level(config.logging.level.as_str()),
        cli.effective_log_format(config.logging.format),
    )?;
    info!(config = %cli.config.display(), "Configuration loaded");

    let runtime = RuntimeBuilder::new()
        .config(config)
        .discovery(!args.no_discovery)
        .shutdown_grace(args.shutdown_grace.unwrap_or(DEFAULT_SHUTDOWN_GRACE))
        .build()?;

    runtime.run().await
}
