// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors surfaced by the `uareg` binary.
//!
//! Every failure ends the process with a sysexits-style code:
//!
//! | variant   | code | meaning                                        |
//! |-----------|------|------------------------------------------------|
//! | `Usage`   | 64   | unusable command line                          |
//! | `Config`  | 78   | configuration missing, malformed or invalid    |
//! | `Startup` | 70   | logging, PKI directory or client wiring failed |
//! | `Output`  | 74   | command output could not be written            |

use std::path::PathBuf;

use thiserror::Error;
use uareg_config::ConfigError;

/// Result type alias for uareg-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Failures of a `uareg` command.
#[derive(Debug, Error)]
pub enum BinError {
    /// The command line cannot be acted on.
    #[error("{0}")]
    Usage(String),

    /// The registry configuration was rejected.
    #[error("configuration {} rejected", path.display())]
    Config {
        /// Configuration file that was loaded.
        path: PathBuf,
        /// Loader or validation failure.
        #[source]
        source: ConfigError,
    },

    /// A component of the registry failed to start.
    #[error("startup failed: {0:#}")]
    Startup(anyhow::Error),

    /// Rendering command output failed.
    #[error("cannot render {what}")]
    Output {
        /// What was being rendered.
        what: &'static str,
        /// Serializer failure.
        #[source]
        source: serde_json::Error,
    },
}

impl BinError {
    /// Creates a usage error.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Wraps a configuration failure for `path`.
    pub fn config(path: impl Into<PathBuf>, source: ConfigError) -> Self {
        Self::Config {
            path: path.into(),
            source,
        }
    }

    /// Process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 64,
            Self::Startup(_) => 70,
            Self::Output { .. } => 74,
            Self::Config { .. } => 78,
        }
    }
}

impl From<anyhow::Error> for BinError {
    fn from(err: anyhow::Error) -> Self {
        Self::Startup(err)
    }
}

/// Prints `error` and its causes to stderr, then exits.
pub fn report_error_and_exit(error: BinError) -> ! {
    eprintln!("uareg: {error}");
    let mut source = std::error::Error::source(&error);
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
    std::process::exit(error.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_config_error_keeps_loader_cause() {
        let err = BinError::config(
            "/etc/uareg/uareg.yaml",
            ConfigError::invalid("registry.page_size", "must be greater than zero"),
        );

        assert_eq!(err.to_string(), "configuration /etc/uareg/uareg.yaml rejected");
        let cause = std::error::Error::source(&err).unwrap();
        assert!(cause.to_string().contains("registry.page_size"));
        assert_eq!(err.exit_code(), 78);
    }

    #[test]
    fn test_startup_error_renders_context_chain() {
        let err: BinError = Err::<(), _>(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
            .context("creating PKI directory /var/lib/uareg/pki")
            .unwrap_err()
            .into();

        assert!(err
            .to_string()
            .starts_with("startup failed: creating PKI directory /var/lib/uareg/pki: "));
        assert_eq!(err.exit_code(), 70);
    }

    #[test]
    fn test_usage_exit_code() {
        assert_eq!(BinError::usage("no configuration given").exit_code(), 64);
    }
}
