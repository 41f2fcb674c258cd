// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory twin store.
//!
//! Used for tests and for running the service without a cloud registry.
//! Records live in a `parking_lot::RwLock`-guarded ordered map, etags are a
//! monotonically increasing counter, and continuation tokens are page offsets.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::trace;

use super::{apply_patch, DeviceTwin, PropertyMap, TwinPage, TwinProperties, TwinQuery, TwinStore};
use crate::error::{RegistryError, RegistryResult};

/// Default page size when the caller does not pass one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

type TwinKey = (String, Option<String>);

fn key(id: &str, module_id: Option<&str>) -> TwinKey {
    (id.to_string(), module_id.map(str::to_string))
}

fn display_key(id: &str, module_id: Option<&str>) -> String {
    match module_id {
        Some(m) => format!("{id}/{m}"),
        None => id.to_string(),
    }
}

/// A thread-safe in-memory [`TwinStore`].
#[derive(Debug)]
pub struct MemoryTwinStore {
    twins: RwLock<BTreeMap<TwinKey, DeviceTwin>>,
    keys: RwLock<BTreeMap<TwinKey, String>>,
    version: AtomicU64,
    default_page_size: usize,
}

impl MemoryTwinStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates an empty store with a default page size.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            twins: RwLock::new(BTreeMap::new()),
            keys: RwLock::new(BTreeMap::new()),
            version: AtomicU64::new(0),
            default_page_size: page_size.max(1),
        }
    }

    /// Returns the number of stored twins.
    pub fn len(&self) -> usize {
        self.twins.read().len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.twins.read().is_empty()
    }

    /// Returns a stored twin without going through the async contract.
    pub fn snapshot(&self, id: &str, module_id: Option<&str>) -> Option<DeviceTwin> {
        self.twins.read().get(&key(id, module_id)).cloned()
    }

    /// Sets the connection state of a stored twin.
    pub fn set_connection_state(&self, id: &str, module_id: Option<&str>, connected: bool) {
        if let Some(twin) = self.twins.write().get_mut(&key(id, module_id)) {
            twin.connection_state = Some(if connected {
                super::CONNECTION_STATE_CONNECTED.to_string()
            } else {
                "Disconnected".to_string()
            });
        }
    }

    /// Applies reported properties as an edge agent would.
    pub fn report(&self, id: &str, module_id: Option<&str>, reported: PropertyMap) {
        if let Some(twin) = self.twins.write().get_mut(&key(id, module_id)) {
            let properties = twin.properties.get_or_insert_with(TwinProperties::default);
            apply_patch(properties.reported.get_or_insert_with(PropertyMap::new), &reported);
        }
    }

    fn next_etag(&self) -> String {
        format!("\"{}\"", self.version.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn normalized(mut twin: DeviceTwin) -> DeviceTwin {
        if let Some(tags) = twin.tags.as_mut() {
            tags.retain(|_, v| !v.is_null());
        }
        if let Some(properties) = twin.properties.as_mut() {
            for map in [properties.desired.as_mut(), properties.reported.as_mut()]
                .into_iter()
                .flatten()
            {
                map.retain(|_, v| !v.is_null());
            }
        }
        twin
    }
}

impl Default for MemoryTwinStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TwinStore for MemoryTwinStore {
    async fn get(&self, id: &str, module_id: Option<&str>) -> RegistryResult<DeviceTwin> {
        self.snapshot(id, module_id)
            .ok_or_else(|| RegistryError::not_found(display_key(id, module_id)))
    }

    async fn create_or_update(&self, twin: DeviceTwin, force: bool) -> RegistryResult<DeviceTwin> {
        let k = key(&twin.id, twin.module_id.as_deref());
        let mut twins = self.twins.write();
        let connection_state = match twins.get(&k) {
            Some(_) if !force => {
                return Err(RegistryError::conflict(display_key(&k.0, k.1.as_deref())));
            }
            Some(existing) => existing.connection_state.clone(),
            None => None,
        };
        let mut stored = Self::normalized(twin);
        stored.etag = Some(self.next_etag());
        stored.connection_state = connection_state;
        trace!(twin_id = %stored.id, "Twin created");
        twins.insert(k, stored.clone());
        Ok(stored)
    }

    async fn patch(&self, twin: DeviceTwin, force: bool) -> RegistryResult<DeviceTwin> {
        let k = key(&twin.id, twin.module_id.as_deref());
        let mut twins = self.twins.write();
        let Some(existing) = twins.get_mut(&k) else {
            if twin.etag.is_some() && !force {
                return Err(RegistryError::not_found(display_key(&k.0, k.1.as_deref())));
            }
            let mut stored = Self::normalized(twin);
            stored.etag = Some(self.next_etag());
            twins.insert(k, stored.clone());
            return Ok(stored);
        };

        if !force {
            if let Some(etag) = twin.etag.as_deref() {
                if existing.etag.as_deref() != Some(etag) {
                    return Err(RegistryError::out_of_date(display_key(&k.0, k.1.as_deref())));
                }
            }
        }

        if let Some(tags) = twin.tags.as_ref() {
            apply_patch(existing.tags.get_or_insert_with(PropertyMap::new), tags);
        }
        if let Some(properties) = twin.properties.as_ref() {
            let target = existing.properties.get_or_insert_with(TwinProperties::default);
            if let Some(desired) = properties.desired.as_ref() {
                apply_patch(target.desired.get_or_insert_with(PropertyMap::new), desired);
            }
            if let Some(reported) = properties.reported.as_ref() {
                apply_patch(target.reported.get_or_insert_with(PropertyMap::new), reported);
            }
        }
        existing.etag = Some(self.next_etag());
        trace!(twin_id = %existing.id, "Twin patched");
        Ok(existing.clone())
    }

    async fn delete(
        &self,
        id: &str,
        module_id: Option<&str>,
        etag: Option<&str>,
    ) -> RegistryResult<()> {
        let k = key(id, module_id);
        let mut twins = self.twins.write();
        let existing = twins
            .get(&k)
            .ok_or_else(|| RegistryError::not_found(display_key(id, module_id)))?;
        if let Some(etag) = etag {
            if existing.etag.as_deref() != Some(etag) {
                return Err(RegistryError::out_of_date(display_key(id, module_id)));
            }
        }
        twins.remove(&k);
        self.keys.write().remove(&k);
        Ok(())
    }

    async fn query(
        &self,
        query: &TwinQuery,
        continuation: Option<&str>,
        page_size: Option<usize>,
    ) -> RegistryResult<TwinPage> {
        let offset = match continuation {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| RegistryError::argument("continuationToken", "Invalid token"))?,
            None => 0,
        };
        let page_size = page_size.unwrap_or(self.default_page_size).max(1);
        let twins = self.twins.read();
        let mut matching = twins.values().filter(|t| query.matches(t)).skip(offset);
        let items: Vec<DeviceTwin> = matching.by_ref().take(page_size).cloned().collect();
        let continuation_token = if matching.next().is_some() {
            Some((offset + items.len()).to_string())
        } else {
            None
        };
        Ok(TwinPage {
            items,
            continuation_token,
        })
    }

    async fn update_property(
        &self,
        device_id: &str,
        module_id: Option<&str>,
        property: &str,
        value: Value,
    ) -> RegistryResult<()> {
        let k = key(device_id, module_id);
        let mut twins = self.twins.write();
        let twin = twins
            .get_mut(&k)
            .ok_or_else(|| RegistryError::not_found(display_key(device_id, module_id)))?;
        let patch: PropertyMap = [(property.to_string(), value)].into();
        let properties = twin.properties.get_or_insert_with(TwinProperties::default);
        apply_patch(properties.desired.get_or_insert_with(PropertyMap::new), &patch);
        twin.etag = Some(self.next_etag());
        Ok(())
    }

    async fn get_primary_key(
        &self,
        device_id: &str,
        module_id: Option<&str>,
    ) -> RegistryResult<String> {
        let k = key(device_id, module_id);
        if !self.twins.read().contains_key(&k) {
            return Err(RegistryError::not_found(display_key(device_id, module_id)));
        }
        let mut keys = self.keys.write();
        Ok(keys
            .entry(k)
            .or_insert_with(|| uuid::Uuid::new_v4().simple().to_string())
            .clone())
    }
}
