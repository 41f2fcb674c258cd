// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for the registry.
//!
//! Registry operations talk to an external twin store, to edge agents and to
//! remote OPC UA servers. Every failure that crosses those seams is expressed
//! as a [`RegistryError`], which separates:
//!
//! - **Resource errors** that drive control flow (`ResourceOutOfDate` feeds the
//!   optimistic-concurrency loops, `ConflictingResource` re-routes an add to an
//!   update)
//! - **Validation errors** raised before any I/O happens
//! - **External errors** from collaborators the registry does not own
//!
//! # Error Hierarchy
//!
//! ```text
//! RegistryError
//! ├── ResourceNotFound      - twin or registration missing (terminal)
//! ├── ResourceOutOfDate     - ETag mismatch (re-read and retry)
//! ├── ConflictingResource   - twin already exists on create
//! ├── ResourceInvalidState  - operation not allowed in current state
//! ├── Argument              - invalid caller input
//! ├── Store                 - twin store failure
//! ├── External              - edge agent, activation or OPC UA failure
//! └── Serialization         - twin property (de)serialization
//! ```
//!
//! # Examples
//!
//! ```
//! use uareg_core::error::RegistryError;
//!
//! let error = RegistryError::out_of_date("uat1234");
//! assert!(error.is_out_of_date());
//! assert_eq!(error.category(), "resource_out_of_date");
//! ```

use thiserror::Error;

// =============================================================================
// RegistryError
// =============================================================================

/// The root error type for registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The requested resource does not exist.
    #[error("Resource not found: {resource}")]
    ResourceNotFound {
        /// Resource identifier or description.
        resource: String,
    },

    /// The resource was modified concurrently (ETag mismatch).
    #[error("Resource out of date: {resource}")]
    ResourceOutOfDate {
        /// Resource identifier.
        resource: String,
    },

    /// The resource already exists.
    #[error("Conflicting resource: {resource}")]
    ConflictingResource {
        /// Resource identifier.
        resource: String,
    },

    /// The resource is in a state that does not permit the operation.
    #[error("Resource in invalid state: {message}")]
    ResourceInvalidState {
        /// Error message.
        message: String,
    },

    /// Invalid argument supplied by the caller.
    #[error("Invalid argument '{argument}': {message}")]
    Argument {
        /// Argument name.
        argument: String,
        /// Error message.
        message: String,
    },

    /// The twin store failed.
    #[error("Twin store error: {message}")]
    Store {
        /// Error message.
        message: String,
    },

    /// An external collaborator failed.
    #[error("External dependency '{dependency}' failed: {message}")]
    External {
        /// Name of the collaborator.
        dependency: String,
        /// Error message.
        message: String,
    },

    /// Twin property serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RegistryError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a resource not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            resource: resource.into(),
        }
    }

    /// Creates a resource out of date error.
    pub fn out_of_date(resource: impl Into<String>) -> Self {
        Self::ResourceOutOfDate {
            resource: resource.into(),
        }
    }

    /// Creates a conflicting resource error.
    pub fn conflict(resource: impl Into<String>) -> Self {
        Self::ConflictingResource {
            resource: resource.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::ResourceInvalidState {
            message: message.into(),
        }
    }

    /// Creates an argument error.
    pub fn argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Argument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    /// Creates a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Creates an external dependency error.
    pub fn external(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        Self::External {
            dependency: dependency.into(),
            message: message.into(),
        }
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` for an ETag mismatch.
    #[inline]
    pub fn is_out_of_date(&self) -> bool {
        matches!(self, Self::ResourceOutOfDate { .. })
    }

    /// Returns `true` if the resource was not found.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound { .. })
    }

    /// Returns `true` if the resource already exists.
    #[inline]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConflictingResource { .. })
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ResourceNotFound { .. } => "resource_not_found",
            Self::ResourceOutOfDate { .. } => "resource_out_of_date",
            Self::ConflictingResource { .. } => "conflicting_resource",
            Self::ResourceInvalidState { .. } => "resource_invalid_state",
            Self::Argument { .. } => "argument",
            Self::Store { .. } => "store",
            Self::External { .. } => "external",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Returns the HTTP status code an API layer would surface for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ResourceNotFound { .. } => 404,
            Self::ResourceOutOfDate { .. } => 412,
            Self::ConflictingResource { .. } => 409,
            Self::ResourceInvalidState { .. } => 409,
            Self::Argument { .. } => 400,
            Self::Serialization(_) => 400,
            Self::Store { .. } => 503,
            Self::External { .. } => 502,
        }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_methods() {
        assert!(RegistryError::out_of_date("a").is_out_of_date());
        assert!(RegistryError::not_found("a").is_not_found());
        assert!(RegistryError::conflict("a").is_conflict());
        assert!(!RegistryError::store("down").is_out_of_date());
    }

    #[test]
    fn test_display() {
        let error = RegistryError::argument("endpoint_id", "must not be empty");
        assert_eq!(
            error.to_string(),
            "Invalid argument 'endpoint_id': must not be empty"
        );

        let error = RegistryError::external("supervisor", "timed out");
        assert!(error.to_string().contains("supervisor"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(RegistryError::not_found("x").status_code(), 404);
        assert_eq!(RegistryError::out_of_date("x").status_code(), 412);
        assert_eq!(RegistryError::conflict("x").status_code(), 409);
        assert_eq!(RegistryError::argument("x", "y").status_code(), 400);
    }

    #[test]
    fn test_serialization_conversion() {
        let json_error = serde_json::from_str::<u32>("not a number").unwrap_err();
        let error: RegistryError = json_error.into();
        assert_eq!(error.category(), "serialization");
    }
}
