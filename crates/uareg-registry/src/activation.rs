// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Endpoint activation on supervisors.
//!
//! Activation hands a supervisor the access secret of an endpoint twin so it
//! can start connecting to the endpoint. The call itself goes to the
//! supervisor through an [`EndpointActivator`]; the secret is also recorded
//! as a desired property (named after the endpoint twin id) on the
//! supervisor's module twin.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use uareg_core::models::EndpointRegistrationModel;
use uareg_core::registration::identity;
use uareg_core::registration::{device_type, tag};
use uareg_core::twin::TwinStore;
use uareg_core::{RegistryError, RegistryResult};

/// Calls down to the supervisor owning an endpoint.
#[async_trait]
pub trait EndpointActivator: Send + Sync {
    /// Activates the endpoint on its supervisor using the twin secret.
    async fn activate_endpoint(
        &self,
        registration: &EndpointRegistrationModel,
        secret: &str,
    ) -> RegistryResult<()>;

    /// Deactivates the endpoint on its supervisor.
    async fn deactivate_endpoint(&self, registration: &EndpointRegistrationModel)
        -> RegistryResult<()>;
}

/// Writes or clears the endpoint secret on the supervisor twin.
///
/// Without supervisor there is nothing to record.
pub async fn set_supervisor_secret(
    store: &dyn TwinStore,
    supervisor_id: Option<&str>,
    endpoint_id: &str,
    secret: Option<&str>,
) -> RegistryResult<()> {
    if endpoint_id.is_empty() {
        return Err(RegistryError::argument("endpointId", "Endpoint id is required"));
    }
    let Some(supervisor_id) = supervisor_id.filter(|s| !s.is_empty()) else {
        return Ok(());
    };
    let (device_id, module_id) = identity::parse_module_identity(supervisor_id);
    let value = secret.map_or(Value::Null, |s| Value::String(s.to_string()));
    store
        .update_property(&device_id, module_id.as_deref(), endpoint_id, value)
        .await?;
    if secret.is_some() {
        info!(endpoint_id = %endpoint_id, supervisor_id = %supervisor_id, "Endpoint activated on supervisor");
    } else {
        info!(endpoint_id = %endpoint_id, supervisor_id = %supervisor_id, "Endpoint deactivated on supervisor");
    }
    Ok(())
}

// =============================================================================
// SupervisorTwinActivator
// =============================================================================

/// Activator that accepts an activation only while the owning supervisor
/// module twin exists and is connected.
///
/// Used when the service runs against a store the supervisors report into
/// directly; the supervisor picks the secret up from its twin.
pub struct SupervisorTwinActivator {
    store: Arc<dyn TwinStore>,
}

impl SupervisorTwinActivator {
    /// Creates the activator.
    pub fn new(store: Arc<dyn TwinStore>) -> Self {
        Self { store }
    }

    fn supervisor_of(registration: &EndpointRegistrationModel) -> RegistryResult<&str> {
        registration
            .supervisor_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                RegistryError::argument(
                    "supervisorId",
                    format!("Endpoint {} has no supervisor", registration.id),
                )
            })
    }
}

#[async_trait]
impl EndpointActivator for SupervisorTwinActivator {
    async fn activate_endpoint(
        &self,
        registration: &EndpointRegistrationModel,
        _secret: &str,
    ) -> RegistryResult<()> {
        let supervisor_id = Self::supervisor_of(registration)?;
        let (device_id, module_id) = identity::parse_module_identity(supervisor_id);
        let twin = self.store.get(&device_id, module_id.as_deref()).await?;
        if twin.tag_str(tag::DEVICE_TYPE) != Some(device_type::SUPERVISOR) {
            return Err(RegistryError::not_found(format!(
                "{supervisor_id} is not a supervisor"
            )));
        }
        if !twin.is_connected() {
            return Err(RegistryError::external(
                "supervisor",
                format!("Supervisor {supervisor_id} is not connected"),
            ));
        }
        debug!(endpoint_id = %registration.id, supervisor_id = %supervisor_id, "Supervisor accepted activation");
        Ok(())
    }

    async fn deactivate_endpoint(
        &self,
        registration: &EndpointRegistrationModel,
    ) -> RegistryResult<()> {
        let supervisor_id = Self::supervisor_of(registration)?;
        debug!(endpoint_id = %registration.id, supervisor_id = %supervisor_id, "Supervisor released endpoint");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uareg_core::registration::ModuleRegistration;
    use uareg_core::types::IdentityType;
    use uareg_core::twin::MemoryTwinStore;

    async fn supervisor(store: &MemoryTwinStore, connected: bool) {
        let module = ModuleRegistration::new(IdentityType::Supervisor, "edge", Some("twin".into()));
        let twin = ModuleRegistration::patch(None, &module).unwrap();
        store.create_or_update(twin, true).await.unwrap();
        store.set_connection_state("edge", Some("twin"), connected);
    }

    fn registration() -> EndpointRegistrationModel {
        EndpointRegistrationModel {
            id: "uat1".into(),
            supervisor_id: Some("edge_module_twin".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_secret_written_and_cleared() {
        let store = MemoryTwinStore::new();
        supervisor(&store, true).await;

        set_supervisor_secret(&store, Some("edge_module_twin"), "uat1", Some("key"))
            .await
            .unwrap();
        let twin = store.snapshot("edge", Some("twin")).unwrap();
        assert_eq!(twin.desired().unwrap()["uat1"], Value::String("key".into()));

        set_supervisor_secret(&store, Some("edge_module_twin"), "uat1", None)
            .await
            .unwrap();
        let twin = store.snapshot("edge", Some("twin")).unwrap();
        assert!(twin.desired().unwrap().get("uat1").is_none());
    }

    #[tokio::test]
    async fn test_no_supervisor_is_a_no_op() {
        let store = MemoryTwinStore::new();
        set_supervisor_secret(&store, None, "uat1", Some("key")).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_twin_activator_requires_connected_supervisor() {
        let store = Arc::new(MemoryTwinStore::new());
        let activator = SupervisorTwinActivator::new(store.clone());
        assert!(activator
            .activate_endpoint(&registration(), "key")
            .await
            .unwrap_err()
            .is_not_found());

        supervisor(&store, false).await;
        assert!(matches!(
            activator.activate_endpoint(&registration(), "key").await,
            Err(RegistryError::External { .. })
        ));

        store.set_connection_state("edge", Some("twin"), true);
        activator.activate_endpoint(&registration(), "key").await.unwrap();
        activator.deactivate_endpoint(&registration()).await.unwrap();
    }
}
