// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session-pooling OPC UA client.
//!
//! Callers hand a unit of work and a target endpoint to
//! [`OpcUaServerClient::execute_service`]. The client finds or opens a
//! session, runs the work, returns the session to the pool and retries once
//! on a fresh session when the failure is transport related.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     OpcUaServerClient                           │
//! │          (execute_service, retry once, error taxonomy)          │
//! └─────────────────────────────────────────────────────────────────┘
//!              │                                   │
//!              ▼                                   ▼
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │         SessionPool          │   │        SessionFactory        │
//! │  (idle sessions by key)      │   │ (discovery, open, keep-alive)│
//! └──────────────────────────────┘   └──────────────────────────────┘
//!              │                                   │
//!              ▼                                   ▼
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │         CleanupQueue         │   │          UaSession           │
//! │   (background close worker)  │   │  (browse/read/write/call)    │
//! └──────────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use uareg_opcua::client::OpcUaServerClient;
//! use uareg_opcua::types::{ReadRequest, ServerEndpoint, NodeId};
//!
//! let endpoint = ServerEndpoint::new("opc.tcp://plc1:4840");
//! let values = client
//!     .execute_service(&endpoint, |session| async move {
//!         session.read(&[ReadRequest::value(NodeId::string(2, "Speed"))]).await
//!     })
//!     .await?;
//! ```

mod cleanup;
pub mod connect;
pub mod mock;
mod pool;
mod server_client;
mod session_key;
mod transport;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use cleanup::{CleanupQueue, CleanupStats};
pub use pool::SessionPool;
pub use server_client::{ClientStatsSnapshot, OpcUaServerClient};
pub use session_key::SessionKey;
pub use transport::{
    KeepAliveHandler, SessionFactory, SessionHandle, SessionOptions, UaSession,
};

#[cfg(feature = "real-transport")]
pub use real_transport::RealSessionFactory;
