// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Edge module registries.
//!
//! One registry type serves supervisors, publishers and gateways; the kind
//! decides the device type tag and whether records live on module twins
//! (`<device>_module_<module>`) or device twins.

use std::sync::Arc;

use tracing::{debug, info};

use uareg_core::models::{
    EdgeModuleListModel, EdgeModuleModel, EdgeModuleQueryModel, EdgeModuleUpdateModel,
};
use uareg_core::registration::module::kind_device_type;
use uareg_core::registration::{identity, tag, ModuleRegistration};
use uareg_core::twin::{TwinQuery, TwinStore};
use uareg_core::types::IdentityType;
use uareg_core::{retry_on_out_of_date, RegistryError, RegistryResult};

/// Registry of one kind of edge module.
pub struct ModuleRegistry {
    store: Arc<dyn TwinStore>,
    kind: IdentityType,
}

impl ModuleRegistry {
    /// Creates a registry for `kind`.
    ///
    /// # Errors
    ///
    /// Returns an argument error for kinds that are not edge modules.
    pub fn new(store: Arc<dyn TwinStore>, kind: IdentityType) -> RegistryResult<Self> {
        match kind {
            IdentityType::Supervisor | IdentityType::Publisher | IdentityType::Gateway => {
                Ok(Self { store, kind })
            }
            other => Err(RegistryError::argument(
                "kind",
                format!("{other} is not an edge module kind"),
            )),
        }
    }

    /// Supervisor registry.
    pub fn supervisors(store: Arc<dyn TwinStore>) -> Self {
        Self {
            store,
            kind: IdentityType::Supervisor,
        }
    }

    /// Publisher registry.
    pub fn publishers(store: Arc<dyn TwinStore>) -> Self {
        Self {
            store,
            kind: IdentityType::Publisher,
        }
    }

    /// Gateway registry.
    pub fn gateways(store: Arc<dyn TwinStore>) -> Self {
        Self {
            store,
            kind: IdentityType::Gateway,
        }
    }

    /// Returns the kind of module served.
    #[inline]
    pub fn kind(&self) -> IdentityType {
        self.kind
    }

    fn base_query(&self) -> TwinQuery {
        let query = if self.kind.is_module() {
            TwinQuery::modules()
        } else {
            TwinQuery::devices()
        };
        query.tag_eq(tag::DEVICE_TYPE, kind_device_type(self.kind))
    }

    fn split_id(&self, id: &str) -> RegistryResult<(String, Option<String>)> {
        if id.is_empty() {
            return Err(RegistryError::argument("id", "Module id is required"));
        }
        if self.kind.is_module() {
            Ok(identity::parse_module_identity(id))
        } else {
            Ok((id.to_string(), None))
        }
    }

    async fn registration(
        &self,
        id: &str,
        only_server_state: bool,
    ) -> RegistryResult<ModuleRegistration> {
        let (device_id, module_id) = self.split_id(id)?;
        let twin = self.store.get(&device_id, module_id.as_deref()).await?;
        ModuleRegistration::from_twin(&twin, only_server_state)
            .filter(|r| r.kind == self.kind)
            .ok_or_else(|| RegistryError::not_found(format!("{id} is not a {}", self.kind)))
    }

    /// Reads a module.
    pub async fn get(&self, id: &str, only_server_state: bool) -> RegistryResult<EdgeModuleModel> {
        Ok(self
            .registration(id, only_server_state)
            .await?
            .to_service_model())
    }

    /// Updates site and log level of a module.
    ///
    /// An empty site id clears the site.
    pub async fn update(&self, id: &str, update: &EdgeModuleUpdateModel) -> RegistryResult<()> {
        let patched = retry_on_out_of_date(self.kind.as_str(), || async move {
            let current = self.registration(id, true).await?;
            let mut next = current.clone();
            if let Some(site_id) = &update.site_id {
                next.base.site_id = Some(site_id.clone()).filter(|s| !s.is_empty());
            }
            if let Some(log_level) = update.log_level {
                next.log_level = Some(log_level);
            }
            if next.base.site_id == current.base.site_id && next.log_level == current.log_level {
                return Ok(false);
            }
            self.store
                .patch(ModuleRegistration::patch(Some(&current), &next)?, false)
                .await?;
            Ok(true)
        })
        .await?;
        if patched {
            info!(kind = %self.kind, id = %id, "Module updated");
        } else {
            debug!(kind = %self.kind, id = %id, "Module update had no effect");
        }
        Ok(())
    }

    /// Lists one page of modules.
    pub async fn list(
        &self,
        continuation: Option<&str>,
        only_server_state: bool,
        page_size: Option<usize>,
    ) -> RegistryResult<EdgeModuleListModel> {
        let page = self
            .store
            .query(&self.base_query(), continuation, page_size)
            .await?;
        Ok(EdgeModuleListModel {
            items: page
                .items
                .iter()
                .filter_map(|t| ModuleRegistration::from_twin(t, only_server_state))
                .map(|r| r.to_service_model())
                .collect(),
            continuation_token: page.continuation_token,
        })
    }

    /// Queries modules by site and connection state.
    pub async fn query(
        &self,
        model: &EdgeModuleQueryModel,
        only_server_state: bool,
        page_size: Option<usize>,
    ) -> RegistryResult<EdgeModuleListModel> {
        let mut query = self
            .base_query()
            .tag_eq_opt(tag::SITE_ID, model.site_id.clone());
        if let Some(connected) = model.connected {
            query = query.connected(connected);
        }
        let page = self.store.query(&query, None, page_size).await?;
        Ok(EdgeModuleListModel {
            items: page
                .items
                .iter()
                .filter_map(|t| ModuleRegistration::from_twin(t, only_server_state))
                .map(|r| r.to_service_model())
                .collect(),
            continuation_token: page.continuation_token,
        })
    }

    /// Returns every connected module, across all pages.
    pub async fn connected(&self) -> RegistryResult<Vec<EdgeModuleModel>> {
        let twins = self
            .store
            .query_all(&self.base_query().connected(true))
            .await?;
        Ok(twins
            .iter()
            .filter_map(|t| ModuleRegistration::from_twin(t, false))
            .map(|r| r.to_service_model())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uareg_core::twin::MemoryTwinStore;
    use uareg_core::types::TraceLogLevel;

    async fn seed(store: &MemoryTwinStore, kind: IdentityType, device: &str, module: Option<&str>, site: &str) {
        let mut registration = ModuleRegistration::new(kind, device, module.map(str::to_string));
        registration.base.site_id = Some(site.into());
        store
            .create_or_update(ModuleRegistration::patch(None, &registration).unwrap(), true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_and_update_supervisor() {
        let store = Arc::new(MemoryTwinStore::new());
        seed(&store, IdentityType::Supervisor, "edge", Some("twin"), "site1").await;
        let registry = ModuleRegistry::supervisors(store.clone());

        let supervisor = registry.get("edge_module_twin", false).await.unwrap();
        assert_eq!(supervisor.id, "edge_module_twin");
        assert_eq!(supervisor.site_id.as_deref(), Some("site1"));

        registry
            .update(
                "edge_module_twin",
                &EdgeModuleUpdateModel {
                    site_id: Some("site2".into()),
                    log_level: Some(TraceLogLevel::Debug),
                },
            )
            .await
            .unwrap();
        let supervisor = registry.get("edge_module_twin", true).await.unwrap();
        assert_eq!(supervisor.site_id.as_deref(), Some("site2"));
        assert_eq!(supervisor.log_level, Some(TraceLogLevel::Debug));
    }

    #[tokio::test]
    async fn test_kind_mismatch_is_not_found() {
        let store = Arc::new(MemoryTwinStore::new());
        seed(&store, IdentityType::Publisher, "edge", Some("pub"), "site1").await;
        let registry = ModuleRegistry::supervisors(store.clone());
        assert!(registry.get("edge_module_pub", false).await.unwrap_err().is_not_found());
        assert!(ModuleRegistry::new(store, IdentityType::Endpoint).is_err());
    }

    #[tokio::test]
    async fn test_query_by_site_and_connection() {
        let store = Arc::new(MemoryTwinStore::new());
        seed(&store, IdentityType::Supervisor, "edge1", Some("twin"), "site1").await;
        seed(&store, IdentityType::Supervisor, "edge2", Some("twin"), "site2").await;
        seed(&store, IdentityType::Gateway, "edge1", None, "site1").await;
        store.set_connection_state("edge2", Some("twin"), true);
        let registry = ModuleRegistry::supervisors(store.clone());

        let all = registry.list(None, false, None).await.unwrap();
        assert_eq!(all.items.len(), 2);

        let site1 = registry
            .query(
                &EdgeModuleQueryModel {
                    site_id: Some("site1".into()),
                    connected: None,
                },
                false,
                None,
            )
            .await
            .unwrap();
        assert_eq!(site1.items.len(), 1);
        assert_eq!(site1.items[0].id, "edge1_module_twin");

        let connected = registry.connected().await.unwrap();
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].id, "edge2_module_twin");
        assert_eq!(connected[0].connected, Some(true));

        let gateways = ModuleRegistry::gateways(store).list(None, false, None).await.unwrap();
        assert_eq!(gateways.items.len(), 1);
        assert_eq!(gateways.items[0].id, "edge1");
    }
}
