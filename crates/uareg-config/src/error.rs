// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors raised while loading registry configuration.
//!
//! The loader fails in one of four stages, each with its own variants:
//!
//! ```text
//! locate ──► FileNotFound / Read / UnsupportedFormat
//! parse  ──► Parse (file) / Document (string)
//! env    ──► EnvOverride (UAREG_* value unusable)
//! check  ──► Invalid (field path + reason)
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// A configuration document could not be turned into a valid `UaregConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No file at the given path.
    #[error("{} does not exist", path.display())]
    FileNotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("cannot read {}", path.display())]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The extension names no supported format.
    #[error("cannot infer the format of {} (expected .yaml, .yml, .toml or .json)", path.display())]
    UnsupportedFormat {
        /// File with the unknown extension.
        path: PathBuf,
    },

    /// A configuration file is malformed or has unknown fields.
    #[error("{}: {message}", path.display())]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// Deserializer message, with line information when available.
        message: String,
    },

    /// An in-memory document is malformed or has unknown fields.
    #[error("malformed configuration document: {0}")]
    Document(String),

    /// An environment override holds a value the loader cannot use.
    #[error("{name}={value:?} is not {expected}")]
    EnvOverride {
        /// Full variable name, prefix included.
        name: String,
        /// Value found in the environment.
        value: String,
        /// What the variable accepts.
        expected: &'static str,
    },

    /// A field failed validation after loading.
    #[error("{field} {reason}")]
    Invalid {
        /// Dotted path of the field, e.g. `registry.page_size`.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Rejects `field` with `reason`.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Reports a deserializer failure on an in-memory document.
    pub fn document(message: impl ToString) -> Self {
        Self::Document(message.to_string())
    }

    /// Attaches the file path to a document failure.
    pub(crate) fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Self::Document(message) => Self::Parse {
                path: path.into(),
                message,
            },
            other => other,
        }
    }

    /// Returns the dotted field path of a validation failure.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Invalid { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// A Result type with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_names_field() {
        let error = ConfigError::invalid("registry.page_size", "must be greater than zero");

        assert_eq!(error.field(), Some("registry.page_size"));
        assert_eq!(error.to_string(), "registry.page_size must be greater than zero");
    }

    #[test]
    fn test_document_error_gains_path_in_file() {
        let error = ConfigError::document("expected value at line 1 column 14").in_file("uareg.json");

        match &error {
            ConfigError::Parse { path, message } => {
                assert_eq!(path, &PathBuf::from("uareg.json"));
                assert_eq!(message, "expected value at line 1 column 14");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
        assert_eq!(error.field(), None);

        let invalid = ConfigError::invalid("service.id", "cannot be empty").in_file("uareg.json");
        assert!(matches!(invalid, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_env_override_message() {
        let error = ConfigError::EnvOverride {
            name: "UAREG_LOG_LEVEL".into(),
            value: "chatty".into(),
            expected: "a log level",
        };

        assert_eq!(error.to_string(), "UAREG_LOG_LEVEL=\"chatty\" is not a log level");
    }
}
