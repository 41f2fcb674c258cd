// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Shared enumerations for the registry.
//!
//! These values are persisted verbatim into twin tags and properties, so their
//! serialized spelling (`PascalCase`) is part of the stored record format and
//! of the query language used against the twin store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Security policy URI for unsecured communication.
pub const SECURITY_POLICY_NONE: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";

// =============================================================================
// SecurityMode
// =============================================================================

/// Message security mode of an endpoint.
///
/// `Best` is not a wire mode. On a registration it means "no explicit mode
/// requested"; in an activation filter it means "only the strongest mode".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SecurityMode {
    /// Use the strongest available mode.
    #[default]
    Best,
    /// Sign messages.
    Sign,
    /// Sign and encrypt messages.
    SignAndEncrypt,
    /// No message security.
    None,
}

impl SecurityMode {
    /// Returns the relative strength of the mode.
    ///
    /// `Best` ranks with `SignAndEncrypt`.
    #[inline]
    pub fn rank(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Sign => 1,
            Self::SignAndEncrypt | Self::Best => 2,
        }
    }

    /// Returns `true` if this mode is at least as strong as `filter`.
    ///
    /// # Examples
    ///
    /// ```
    /// use uareg_core::types::SecurityMode;
    ///
    /// assert!(SecurityMode::SignAndEncrypt.matches_filter(SecurityMode::Sign));
    /// assert!(!SecurityMode::None.matches_filter(SecurityMode::Best));
    /// assert!(SecurityMode::None.matches_filter(SecurityMode::None));
    /// ```
    #[inline]
    pub fn matches_filter(&self, filter: SecurityMode) -> bool {
        self.rank() >= filter.rank()
    }

    /// Returns the persisted name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Best => "Best",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
            Self::None => "None",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// CredentialType
// =============================================================================

/// Type of user credential presented when opening a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CredentialType {
    /// Anonymous.
    #[default]
    None,
    /// User name and password.
    UserName,
    /// X.509 certificate.
    X509Certificate,
    /// Issued JWT token.
    JwtToken,
}

impl CredentialType {
    /// Returns the persisted name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::UserName => "UserName",
            Self::X509Certificate => "X509Certificate",
            Self::JwtToken => "JwtToken",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ApplicationType
// =============================================================================

/// Kind of OPC UA application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ApplicationType {
    /// Server application.
    #[default]
    Server,
    /// Client application.
    Client,
    /// Both client and server.
    ClientAndServer,
    /// Discovery server.
    DiscoveryServer,
}

impl ApplicationType {
    /// Returns `true` if the application exposes a server.
    #[inline]
    pub fn is_server(&self) -> bool {
        !matches!(self, Self::Client)
    }

    /// Returns `true` if the application acts as a client.
    #[inline]
    pub fn is_client(&self) -> bool {
        matches!(self, Self::Client | Self::ClientAndServer)
    }

    /// Returns `true` for a discovery server.
    #[inline]
    pub fn is_discovery_server(&self) -> bool {
        matches!(self, Self::DiscoveryServer)
    }

    /// Returns the persisted name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "Server",
            Self::Client => "Client",
            Self::ClientAndServer => "ClientAndServer",
            Self::DiscoveryServer => "DiscoveryServer",
        }
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Endpoint state
// =============================================================================

/// Activation state of an endpoint registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EndpointActivationState {
    /// Not activated.
    #[default]
    Deactivated,
    /// Activated on its supervisor.
    Activated,
    /// Activated and the supervisor reports a live connection.
    ActivatedAndConnected,
}

impl EndpointActivationState {
    /// Returns `true` for any activated state.
    #[inline]
    pub fn is_activated(&self) -> bool {
        !matches!(self, Self::Deactivated)
    }
}

/// Connectivity state reported by the supervisor for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EndpointConnectivityState {
    /// Connection in progress.
    #[default]
    Connecting,
    /// Endpoint not reachable.
    NotReachable,
    /// Endpoint busy.
    Busy,
    /// Endpoint does not trust the client.
    NoTrust,
    /// Endpoint certificate invalid.
    CertificateInvalid,
    /// Connected and ready.
    Ready,
    /// Other error.
    Error,
}

impl EndpointConnectivityState {
    /// Returns the persisted name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "Connecting",
            Self::NotReachable => "NotReachable",
            Self::Busy => "Busy",
            Self::NoTrust => "NoTrust",
            Self::CertificateInvalid => "CertificateInvalid",
            Self::Ready => "Ready",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for EndpointConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// IdentityType
// =============================================================================

/// The `DeviceType` tag stamped on every registration twin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityType {
    /// OPC UA application.
    Application,
    /// OPC UA endpoint.
    Endpoint,
    /// Supervisor edge module.
    Supervisor,
    /// Publisher edge module.
    Publisher,
    /// Edge gateway device.
    Gateway,
}

impl IdentityType {
    /// Returns the persisted name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "Application",
            Self::Endpoint => "Endpoint",
            Self::Supervisor => "Supervisor",
            Self::Publisher => "Publisher",
            Self::Gateway => "Gateway",
        }
    }

    /// Parses a persisted name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Application" => Some(Self::Application),
            "Endpoint" => Some(Self::Endpoint),
            "Supervisor" => Some(Self::Supervisor),
            "Publisher" => Some(Self::Publisher),
            "Gateway" => Some(Self::Gateway),
            _ => None,
        }
    }

    /// Returns `true` if records of this type live on modules rather than devices.
    #[inline]
    pub fn is_module(&self) -> bool {
        matches!(self, Self::Supervisor | Self::Publisher)
    }
}

impl fmt::Display for IdentityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Log level an edge module can be switched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TraceLogLevel {
    /// Errors only.
    Error,
    /// Informational.
    #[default]
    Information,
    /// Debug output.
    Debug,
    /// Verbose output.
    Verbose,
}

// =============================================================================
// Tests
// =============================================================================
