// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Pool key for sessions.

use std::fmt;

use uareg_core::types::CredentialType;

use crate::types::{ServerEndpoint, UserIdentity};

/// Identifies sessions that are interchangeable.
///
/// Two targets that differ in url, identity, trust, certificates or edge
/// controller never share a session.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    url: String,
    identity: UserIdentity,
    is_trusted: Option<bool>,
    server_thumbprint: Option<Vec<u8>>,
    client_certificate: Option<Vec<u8>>,
    edge_controller: Option<String>,
}

impl SessionKey {
    /// Derives the key of a target.
    pub fn new(endpoint: &ServerEndpoint) -> Self {
        Self {
            url: endpoint.url.clone(),
            identity: endpoint.identity.clone(),
            is_trusted: endpoint.is_trusted,
            server_thumbprint: endpoint.server_thumbprint.clone(),
            client_certificate: endpoint.client_certificate.clone(),
            edge_controller: endpoint.edge_controller.clone(),
        }
    }

    /// Returns the url.
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the credential type.
    #[inline]
    pub fn credential_type(&self) -> CredentialType {
        self.identity.credential_type()
    }
}

impl From<&ServerEndpoint> for SessionKey {
    fn from(endpoint: &ServerEndpoint) -> Self {
        Self::new(endpoint)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("url", &self.url)
            .field("identity", &self.identity)
            .field("edge_controller", &self.edge_controller)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.identity.user(), &self.edge_controller) {
            (Some(user), Some(edge)) => write!(f, "{}@{} via {}", user, self.url, edge),
            (Some(user), None) => write!(f, "{}@{}", user, self.url),
            (None, Some(edge)) => write!(f, "{} via {}", self.url, edge),
            (None, None) => write!(f, "{}", self.url),
        }
    }
}
