// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `run`: Start the registry service (default)
//! - `validate`: Validate configuration file
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// OPC UA registry service.
///
/// Keeps discovered OPC UA applications and endpoints registered as device
/// twins and brokers pooled sessions to shop floor servers.
#[derive(Parser, Debug)]
#[command(
    name = "uareg",
    author = "Sylvex <contact@sylvex.io>",
    version = crate::VERSION,
    about = "OPC UA application and endpoint registry",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "uareg.yaml",
        env = "UAREG_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json, compact); overrides the config file
    #[arg(long, env = "UAREG_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the registry service
    ///
    /// This is the default command when no subcommand is specified.
    Run(RunArgs),

    /// Validate the configuration file
    ///
    /// Parses and validates the configuration file without starting the service.
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Do not start the discoverer refresh loop
    #[arg(long)]
    pub no_discovery: bool,

    /// Grace period for closing sessions on shutdown
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub shutdown_grace: Option<std::time::Duration>,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<uareg_config::LogFormat> for LogFormat {
    fn from(format: uareg_config::LogFormat) -> Self {
        match format {
            uareg_config::LogFormat::Text => LogFormat::Text,
            uareg_config::LogFormat::Json => LogFormat::Json,
            uareg_config::LogFormat::Compact => LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Run` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Get the effective log level. Flags win over `configured`.
    pub fn effective_log_level<'a>(&'a self, configured: &'a str) -> &'a str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            self.log_level.as_deref().unwrap_or(configured)
        }
    }

    /// Get the effective log format. The flag wins over `configured`.
    pub fn effective_log_format(&self, configured: uareg_config::LogFormat) -> LogFormat {
        self.log_format.unwrap_or_else(|| configured.into())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let cli = Cli::parse_from(["uareg"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.effective_command(), Commands::Run(_)));
    }

    #[test]
    fn test_run_command() {
        let cli = Cli::parse_from(["uareg", "run", "--no-discovery", "--shutdown-grace", "2s"]);
        if let Some(Commands::Run(args)) = cli.command {
            assert!(args.no_discovery);
            assert_eq!(args.shutdown_grace, Some(std::time::Duration::from_secs(2)));
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["uareg", "validate", "--show-config", "-f", "json"]);
        if let Some(Commands::Validate(args)) = cli.command {
            assert!(args.show_config);
            assert_eq!(args.format, OutputFormat::Json);
        } else {
            panic!("Expected Validate command");
        }
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["uareg", "-c", "/etc/uareg/uareg.yaml"]);
        assert_eq!(cli.config, PathBuf::from("/etc/uareg/uareg.yaml"));
    }

    #[test]
    fn test_log_level_precedence() {
        let cli = Cli::parse_from(["uareg"]);
        assert_eq!(cli.effective_log_level("error"), "error");

        let cli = Cli::parse_from(["uareg", "-l", "trace"]);
        assert_eq!(cli.effective_log_level("error"), "trace");

        let cli = Cli::parse_from(["uareg", "-q", "-l", "trace"]);
        assert_eq!(cli.effective_log_level("error"), "warn");

        let cli = Cli::parse_from(["uareg", "-v"]);
        assert_eq!(cli.effective_log_level("error"), "debug");
    }

    #[test]
    fn test_log_format_precedence() {
        let cli = Cli::parse_from(["uareg"]);
        assert_eq!(
            cli.effective_log_format(uareg_config::LogFormat::Json),
            LogFormat::Json
        );
        let cli = Cli::parse_from(["uareg", "--log-format", "compact"]);
        assert_eq!(
            cli.effective_log_format(uareg_config::LogFormat::Json),
            LogFormat::Compact
        );
    }
}
