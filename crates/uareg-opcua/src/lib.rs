// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client facade for the registry.
//!
//! This crate gives the registry one way to talk to shop floor servers:
//! a session-pooling client that opens sessions on demand, reuses them per
//! connection identity, and translates stack status codes into a small error
//! taxonomy that drives retry decisions.
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Status      - Bad status code, classified into an ErrorKind
//! ├── Connection  - No usable endpoint or connection failure
//! ├── Argument    - Invalid caller input
//! ├── Timeout     - Stack call exceeded its deadline
//! └── Stack       - Unexpected failure inside the protocol stack
//! ```
//!
//! Only transport-class kinds (`Connection`, `ServerBusy`, `Protocol`,
//! `Communication`, `Timeout`) are retried, and at most once per call.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uareg_opcua::client::{OpcUaServerClient, RealSessionFactory};
//! use uareg_opcua::nodes::NodeServices;
//! use uareg_opcua::types::{ClientSettings, ServerEndpoint};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ClientSettings::default();
//!     let factory = Arc::new(RealSessionFactory::new(settings.clone()));
//!     let client = Arc::new(OpcUaServerClient::new(factory, settings));
//!
//!     let services = NodeServices::new(client);
//!     let endpoint = ServerEndpoint::new("opc.tcp://plc1:4840");
//!     let value = services.read_value(&endpoint, "ns=2;s=Speed").await?;
//!     println!("Speed: {}", value.value);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod nodes;
pub mod types;

pub use error::{classify, is_retryable, status_code_name, ErrorKind, OpcUaError, OpcUaResult};

pub use types::{
    AttributeId, BrowseDirection, ClientSettings, DataValue, EndpointDescription, NodeClass,
    NodeId, NodeIdentifier, ServerEndpoint, UaValue, UserIdentity,
};

pub use client::{
    ClientStatsSnapshot, OpcUaServerClient, SessionFactory, SessionHandle, SessionKey,
    SessionPool, UaSession,
};

#[cfg(feature = "real-transport")]
pub use client::RealSessionFactory;

pub use nodes::{BrowseNodeRequest, BrowseNodeResult, NodeServices};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
