// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The twin store contract.

use async_trait::async_trait;
use serde_json::Value;

use super::{DeviceTwin, TwinQuery};
use crate::error::RegistryResult;

/// One page of a twin query.
#[derive(Debug, Clone, Default)]
pub struct TwinPage {
    /// Twins on this page.
    pub items: Vec<DeviceTwin>,
    /// Token for the next page, if any.
    pub continuation_token: Option<String>,
}

/// A device registry holding device and module twins.
///
/// Writes are guarded by the twin's `etag`. A stale etag fails with
/// [`RegistryError::ResourceOutOfDate`](crate::error::RegistryError::ResourceOutOfDate).
#[async_trait]
pub trait TwinStore: Send + Sync {
    /// Reads a twin.
    async fn get(&self, id: &str, module_id: Option<&str>) -> RegistryResult<DeviceTwin>;

    /// Creates a twin. With `force` an existing twin is replaced, without it
    /// an existing twin fails with `ConflictingResource`.
    async fn create_or_update(&self, twin: DeviceTwin, force: bool) -> RegistryResult<DeviceTwin>;

    /// Patches the named tags and properties of a twin.
    ///
    /// A patch without etag for a twin that does not exist creates it. With
    /// `force` the etag is not checked.
    async fn patch(&self, twin: DeviceTwin, force: bool) -> RegistryResult<DeviceTwin>;

    /// Deletes a twin, optionally only if its etag matches.
    async fn delete(
        &self,
        id: &str,
        module_id: Option<&str>,
        etag: Option<&str>,
    ) -> RegistryResult<()>;

    /// Runs one page of a query.
    async fn query(
        &self,
        query: &TwinQuery,
        continuation: Option<&str>,
        page_size: Option<usize>,
    ) -> RegistryResult<TwinPage>;

    /// Sets a desired property on a device or module twin. `null` clears it.
    async fn update_property(
        &self,
        device_id: &str,
        module_id: Option<&str>,
        property: &str,
        value: Value,
    ) -> RegistryResult<()>;

    /// Returns the primary access key of a device.
    async fn get_primary_key(&self, device_id: &str, module_id: Option<&str>)
        -> RegistryResult<String>;

    /// Runs a query to exhaustion, following continuation tokens.
    async fn query_all(&self, query: &TwinQuery) -> RegistryResult<Vec<DeviceTwin>> {
        let mut items = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let page = self.query(query, continuation.as_deref(), None).await?;
            items.extend(page.items);
            match page.continuation_token {
                Some(token) => continuation = Some(token),
                None => return Ok(items),
            }
        }
    }
}
