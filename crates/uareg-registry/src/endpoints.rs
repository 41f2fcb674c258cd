// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Endpoint registry.
//!
//! Owns the endpoint twins of all applications. Besides the query and
//! activation API it merges discovery results into the persisted endpoint
//! set.
//!
//! # Discovery reconciliation
//!
//! ```text
//! found ──┐                         remove ─► owned? ─► hard delete | soft disable
//!         ├─ diff(logical key) ───► same   ─► owned or disabled? ─► patch if changed
//! existing┘                         add    ─► create, notify new + enabled
//! ```
//!
//! Each item is processed on its own: a failure is logged, counted as
//! unchanged and the sweep continues. New and re-found endpoints that match
//! the activation filter are activated on a best-effort basis.
//!
//! # Activation
//!
//! Activation is two-phase: the supervisor is asked to activate, then the
//! secret is written to the supervisor twin and the endpoint is flagged. If
//! either phase fails the supervisor side is rolled back and the error is
//! returned. Deactivation always clears the supervisor side and only fails
//! if the endpoint flag cannot be updated.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use uareg_core::models::{
    DiscoveryResultModel, EndpointActivationFilterModel, EndpointInfoListModel,
    EndpointInfoModel, EndpointRegistrationQueryModel, RegistryOperationContext,
};
use uareg_core::registration::endpoint::{
    ACTIVATED, ENDPOINT_URL_LC, SECURITY_MODE, SECURITY_POLICY, STATE,
};
use uareg_core::registration::{device_type, tag, twin_device_type, EndpointRegistration};
use uareg_core::twin::{DeviceTwin, FieldPath, Predicate, TwinQuery, TwinStore};
use uareg_core::types::EndpointActivationState;
use uareg_core::{RegistryError, RegistryResult};

use crate::activation::{set_supervisor_secret, EndpointActivator};
use crate::events::{EndpointEvent, EndpointEventBroker};
use crate::reconcile::{self, ReconcileReport};

// =============================================================================
// Query construction
// =============================================================================

/// Builds the twin query for an endpoint query model.
///
/// Absent filter fields are omitted. Asking for an endpoint state implies
/// activated and connected unless either is explicitly `false`.
pub fn endpoint_query(model: &EndpointRegistrationQueryModel) -> TwinQuery {
    let mut query = TwinQuery::devices().tag_eq(tag::DEVICE_TYPE, device_type::ENDPOINT);
    if !model.include_not_seen_since.unwrap_or(false) {
        query = query.tag_not_defined(tag::NOT_SEEN_SINCE);
    }
    if let Some(url) = &model.url {
        query = query.tag_eq(ENDPOINT_URL_LC, url.to_lowercase());
    }
    query = query
        .tag_eq_opt(tag::APPLICATION_ID, model.application_id.clone())
        .tag_eq_opt(tag::SUPERVISOR_ID, model.supervisor_id.clone())
        .tag_eq_opt(tag::DISCOVERER_ID, model.discoverer_id.clone())
        .tag_eq_opt(tag::SITE_OR_GATEWAY_ID, model.site_or_gateway_id.clone())
        .tag_eq_opt(tag::THUMBPRINT, model.certificate.clone());
    if let Some(mode) = model.security_mode {
        query = query.desired_eq(SECURITY_MODE, mode.as_str());
    }
    if let Some(policy) = &model.security_policy {
        query = query.desired_eq(SECURITY_POLICY, policy.clone());
    }

    let mut activated = model.activated;
    let mut connected = model.connected;
    if let Some(state) = model.endpoint_state {
        if connected != Some(false) && activated != Some(false) {
            query = query.reported_eq(STATE, state.as_str());
            activated = Some(true);
            connected = Some(true);
        }
    }
    match activated {
        Some(true) => query = query.tag_eq(ACTIVATED, true),
        Some(false) => {
            query = query.and(Predicate::Not(Box::new(Predicate::Eq(
                FieldPath::Tag(ACTIVATED.to_string()),
                true.into(),
            ))))
        }
        None => {}
    }
    if let Some(connected) = connected {
        query = query.connected(connected);
    }
    query
}

fn application_endpoints_query(application_id: &str, include_deleted: bool) -> TwinQuery {
    let query = TwinQuery::devices()
        .tag_eq(tag::APPLICATION_ID, application_id)
        .tag_eq(tag::DEVICE_TYPE, device_type::ENDPOINT);
    if include_deleted {
        query
    } else {
        query.tag_not_defined(tag::NOT_SEEN_SINCE)
    }
}

fn endpoint_registration(twin: &DeviceTwin, only_server_state: bool) -> Option<EndpointRegistration> {
    (twin_device_type(twin) == Some(device_type::ENDPOINT))
        .then(|| EndpointRegistration::from_twin(twin, only_server_state))
}

// =============================================================================
// Ownership
// =============================================================================

/// The agent a discovery sweep reports for.
///
/// A supervisor-driven sweep owns the endpoints recorded with its supervisor
/// id, a discoverer-driven sweep those recorded with its discoverer id.
#[derive(Debug, Clone, Copy)]
struct Owner<'a> {
    discoverer_id: Option<&'a str>,
    supervisor_id: Option<&'a str>,
}

impl Owner<'_> {
    fn recorded<'r>(&self, registration: &'r EndpointRegistration) -> Option<&'r str> {
        if self.supervisor_id.is_some() {
            registration.base.supervisor_id.as_deref()
        } else {
            registration.base.discoverer_id.as_deref()
        }
    }

    fn reporting(&self) -> Option<&str> {
        self.supervisor_id.or(self.discoverer_id)
    }

    fn owns(&self, registration: &EndpointRegistration) -> bool {
        self.recorded(registration) == self.reporting()
    }

    fn may_update(&self, registration: &EndpointRegistration) -> bool {
        registration.base.disabled()
            || self.recorded(registration).is_none()
            || self.owns(registration)
    }
}

// =============================================================================
// EndpointRegistry
// =============================================================================

/// Endpoint registry over a twin store.
pub struct EndpointRegistry {
    store: Arc<dyn TwinStore>,
    activator: Arc<dyn EndpointActivator>,
    broker: Arc<EndpointEventBroker>,
}

impl EndpointRegistry {
    /// Creates the registry.
    pub fn new(
        store: Arc<dyn TwinStore>,
        activator: Arc<dyn EndpointActivator>,
        broker: Arc<EndpointEventBroker>,
    ) -> Self {
        Self {
            store,
            activator,
            broker,
        }
    }

    /// Returns the event broker.
    pub fn broker(&self) -> &Arc<EndpointEventBroker> {
        &self.broker
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Reads an endpoint.
    pub async fn get_endpoint(
        &self,
        endpoint_id: &str,
        only_server_state: bool,
    ) -> RegistryResult<EndpointInfoModel> {
        if endpoint_id.is_empty() {
            return Err(RegistryError::argument("endpointId", "Endpoint id is required"));
        }
        let twin = self.store.get(endpoint_id, None).await?;
        endpoint_registration(&twin, only_server_state)
            .map(|r| r.to_service_model())
            .ok_or_else(|| {
                RegistryError::not_found(format!("{endpoint_id} is not a registered endpoint"))
            })
    }

    /// Lists one page of enabled endpoints.
    pub async fn list_endpoints(
        &self,
        continuation: Option<&str>,
        only_server_state: bool,
        page_size: Option<usize>,
    ) -> RegistryResult<EndpointInfoListModel> {
        let query = TwinQuery::devices()
            .tag_eq(tag::DEVICE_TYPE, device_type::ENDPOINT)
            .tag_not_defined(tag::NOT_SEEN_SINCE);
        let page = self.store.query(&query, continuation, page_size).await?;
        Ok(EndpointInfoListModel {
            items: page
                .items
                .iter()
                .filter_map(|t| endpoint_registration(t, only_server_state))
                .map(|r| r.to_service_model())
                .collect(),
            continuation_token: page.continuation_token,
        })
    }

    /// Queries endpoints.
    pub async fn query_endpoints(
        &self,
        model: &EndpointRegistrationQueryModel,
        only_server_state: bool,
        page_size: Option<usize>,
    ) -> RegistryResult<EndpointInfoListModel> {
        let query = endpoint_query(model);
        debug!(query = %query, "Querying endpoints");
        let page = self.store.query(&query, None, page_size).await?;
        Ok(EndpointInfoListModel {
            items: page
                .items
                .iter()
                .filter_map(|t| endpoint_registration(t, only_server_state))
                .map(|r| r.to_service_model())
                .collect(),
            continuation_token: page.continuation_token,
        })
    }

    /// Returns the endpoints of an application.
    ///
    /// With `filter_inactive` only activated endpoints with a live twin are
    /// returned.
    pub async fn get_application_endpoints(
        &self,
        application_id: &str,
        include_deleted: bool,
        filter_inactive: bool,
    ) -> RegistryResult<Vec<EndpointInfoModel>> {
        let endpoints = self.endpoints_of(application_id, include_deleted).await?;
        Ok(endpoints
            .iter()
            .filter(|e| !filter_inactive || (e.base.connected && e.is_activated()))
            .map(EndpointRegistration::to_service_model)
            .collect())
    }

    async fn endpoints_of(
        &self,
        application_id: &str,
        include_deleted: bool,
    ) -> RegistryResult<Vec<EndpointRegistration>> {
        let twins = self
            .store
            .query_all(&application_endpoints_query(application_id, include_deleted))
            .await?;
        Ok(twins
            .iter()
            .filter_map(|t| endpoint_registration(t, false))
            .collect())
    }

    // =========================================================================
    // Activation
    // =========================================================================

    /// Activates an endpoint on its supervisor.
    pub async fn activate_endpoint(
        &self,
        endpoint_id: &str,
        context: Option<RegistryOperationContext>,
    ) -> RegistryResult<()> {
        let context = RegistryOperationContext::validated(context);
        let registration = self.registration_for_activation(endpoint_id).await?;
        if registration.base.disabled() {
            return Err(RegistryError::invalid_state(format!(
                "{endpoint_id} is disabled and cannot be activated"
            )));
        }
        if !registration.is_activated() {
            self.activate(&registration, &context).await?;
        }
        Ok(())
    }

    /// Deactivates an endpoint on its supervisor.
    pub async fn deactivate_endpoint(
        &self,
        endpoint_id: &str,
        context: Option<RegistryOperationContext>,
    ) -> RegistryResult<()> {
        let context = RegistryOperationContext::validated(context);
        let registration = self.registration_for_activation(endpoint_id).await?;
        if registration.is_activated() {
            self.deactivate(&registration, &context, true).await?;
        }
        Ok(())
    }

    async fn registration_for_activation(
        &self,
        endpoint_id: &str,
    ) -> RegistryResult<EndpointRegistration> {
        if endpoint_id.is_empty() {
            return Err(RegistryError::argument("endpointId", "Endpoint id is required"));
        }
        let twin = self.store.get(endpoint_id, None).await?;
        if twin.id != endpoint_id {
            return Err(RegistryError::argument(
                "endpointId",
                "Id must be same as the endpoint twin",
            ));
        }
        let registration = endpoint_registration(&twin, true).ok_or_else(|| {
            RegistryError::not_found(format!("{endpoint_id} is not an endpoint registration"))
        })?;
        if registration.base.supervisor_id.as_deref().map_or(true, str::is_empty) {
            return Err(RegistryError::argument(
                "endpointId",
                format!("Twin {endpoint_id} is not registered with a supervisor"),
            ));
        }
        Ok(registration)
    }

    async fn activate(
        &self,
        registration: &EndpointRegistration,
        context: &RegistryOperationContext,
    ) -> RegistryResult<()> {
        let endpoint_id = registration
            .device_id()
            .ok_or_else(|| RegistryError::argument("endpointId", "Endpoint has no id"))?;
        let supervisor_id = registration.base.supervisor_id.as_deref();
        let secret = self.store.get_primary_key(&endpoint_id, None).await?;
        let mut endpoint = registration.to_service_model();

        let activated: RegistryResult<()> = async {
            self.activator
                .activate_endpoint(&endpoint.registration, &secret)
                .await?;
            set_supervisor_secret(self.store.as_ref(), supervisor_id, &endpoint_id, Some(&secret))
                .await?;
            if !registration.is_activated() {
                let mut update = registration.clone();
                update.activated = Some(true);
                let patch = EndpointRegistration::patch(Some(registration), &update)?;
                self.store.patch(patch, true).await?;
            }
            Ok(())
        }
        .await;

        if let Err(e) = activated {
            if let Err(undo) = self.activator.deactivate_endpoint(&endpoint.registration).await {
                debug!(endpoint_id = %endpoint_id, error = %undo, "Rollback of supervisor activation failed");
            }
            if let Err(undo) =
                set_supervisor_secret(self.store.as_ref(), supervisor_id, &endpoint_id, None).await
            {
                debug!(endpoint_id = %endpoint_id, error = %undo, "Rollback of supervisor secret failed");
            }
            error!(endpoint_id = %endpoint_id, error = %e, "Failed to activate endpoint");
            return Err(e);
        }

        endpoint.activation_state = Some(if registration.base.connected {
            EndpointActivationState::ActivatedAndConnected
        } else {
            EndpointActivationState::Activated
        });
        self.broker
            .notify(context, &EndpointEvent::Activated(endpoint))
            .await;
        Ok(())
    }

    /// Deactivates on the supervisor and, with `persist`, clears the flag.
    async fn deactivate(
        &self,
        registration: &EndpointRegistration,
        context: &RegistryOperationContext,
        persist: bool,
    ) -> RegistryResult<()> {
        let endpoint_id = registration
            .device_id()
            .ok_or_else(|| RegistryError::argument("endpointId", "Endpoint has no id"))?;
        let mut endpoint = registration.to_service_model();

        if let Err(e) = set_supervisor_secret(
            self.store.as_ref(),
            registration.base.supervisor_id.as_deref(),
            &endpoint_id,
            None,
        )
        .await
        {
            warn!(endpoint_id = %endpoint_id, error = %e, "Failed to clear supervisor secret");
        }
        if let Err(e) = self.activator.deactivate_endpoint(&endpoint.registration).await {
            warn!(endpoint_id = %endpoint_id, error = %e, "Supervisor deactivation failed");
        }

        if persist && registration.is_activated() {
            let mut update = registration.clone();
            update.activated = Some(false);
            let patched = match EndpointRegistration::patch(Some(registration), &update) {
                Ok(patch) => self.store.patch(patch, true).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = patched {
                error!(endpoint_id = %endpoint_id, error = %e, "Failed to deactivate endpoint");
                return Err(e);
            }
        }

        endpoint.activation_state = Some(EndpointActivationState::Deactivated);
        endpoint.endpoint_state = None;
        self.broker
            .notify(context, &EndpointEvent::Deactivated(endpoint))
            .await;
        Ok(())
    }

    /// Activates a freshly written endpoint when it matches the filter.
    ///
    /// Failures are logged and leave the endpoint for manual activation.
    async fn auto_activate(
        &self,
        filter: Option<&EndpointActivationFilterModel>,
        registration: &EndpointRegistration,
        context: &RegistryOperationContext,
    ) -> bool {
        let Some(filter) = filter else {
            return false;
        };
        if !filter.matches(registration.security_mode, registration.security_policy.as_deref()) {
            return false;
        }
        let endpoint_id = registration.device_id().unwrap_or_default();
        if registration.base.supervisor_id.as_deref().map_or(true, str::is_empty) {
            debug!(endpoint_id = %endpoint_id, "No supervisor, skipping activation filter");
            return false;
        }
        match self.activate(registration, context).await {
            Ok(()) => true,
            Err(e) => {
                info!(
                    endpoint_id = %endpoint_id,
                    error = %e,
                    "Failed activating endpoint based off filter, manual activation required"
                );
                false
            }
        }
    }

    // =========================================================================
    // Discovery reconciliation
    // =========================================================================

    /// Merges a discovery result into the endpoints of an application.
    ///
    /// `found` are the endpoints the agent reported. Existing endpoints are
    /// those of `application_id`; without it every found endpoint is new.
    /// Unfound endpoints owned by the reporting agent are soft-disabled, or
    /// deleted with `hard_delete`. A register-only result never removes.
    pub async fn process_discovery_events(
        &self,
        found: Vec<EndpointInfoModel>,
        result: &DiscoveryResultModel,
        discoverer_id: Option<&str>,
        supervisor_id: Option<&str>,
        application_id: Option<&str>,
        hard_delete: bool,
    ) -> RegistryResult<ReconcileReport> {
        let context = RegistryOperationContext::validated(result.context.clone());
        let owner = Owner {
            discoverer_id: discoverer_id.filter(|d| !d.is_empty()),
            supervisor_id: supervisor_id.filter(|s| !s.is_empty()),
        };
        let found: Vec<EndpointRegistration> = found
            .iter()
            .map(|model| {
                let mut registration = EndpointRegistration::from_service_model(model, Some(false));
                if registration.base.discoverer_id.is_none() {
                    registration.base.discoverer_id = owner.discoverer_id.map(str::to_string);
                }
                registration
            })
            .collect();
        let existing = match application_id.filter(|a| !a.is_empty()) {
            Some(application_id) => self.endpoints_of(application_id, true).await?,
            None => Vec::new(),
        };

        let diff = reconcile::diff(existing, found, EndpointRegistration::logical_key);
        let filter = result.activation_filter();
        let mut report = ReconcileReport::default();

        if !result.is_register_only() {
            for item in &diff.remove {
                if !owner.owns(item) {
                    report.unchanged += 1;
                    continue;
                }
                match self.remove_endpoint(item, hard_delete, &context).await {
                    Ok(true) => report.removed += 1,
                    Ok(false) => report.unchanged += 1,
                    Err(e) => {
                        report.unchanged += 1;
                        error!(endpoint_id = ?item.device_id(), error = %e, "Exception during discovery removal");
                    }
                }
            }
        }

        for (exists, found) in diff.unchanged {
            if !owner.may_update(&exists) {
                report.unchanged += 1;
                continue;
            }
            match self.update_endpoint(&exists, found, filter, &context).await {
                Ok(true) => report.updated += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    report.unchanged += 1;
                    error!(endpoint_id = ?exists.device_id(), error = %e, "Exception during discovery update");
                }
            }
        }

        for item in diff.add {
            match self.add_endpoint(&item, filter, &context).await {
                Ok(()) => report.added += 1,
                Err(e) => {
                    report.unchanged += 1;
                    error!(endpoint_id = ?item.device_id(), error = %e, "Exception during discovery addition");
                }
            }
        }

        if report.has_structural_changes() {
            info!(
                application_id = ?application_id,
                added = report.added,
                updated = report.updated,
                removed = report.removed,
                unchanged = report.unchanged,
                "Processed endpoint discovery results"
            );
        }
        Ok(report)
    }

    async fn remove_endpoint(
        &self,
        item: &EndpointRegistration,
        hard_delete: bool,
        context: &RegistryOperationContext,
    ) -> RegistryResult<bool> {
        let endpoint_id = item
            .device_id()
            .ok_or_else(|| RegistryError::argument("endpointId", "Endpoint has no id"))?;
        if hard_delete {
            let twin = self.store.get(&endpoint_id, None).await?;
            let stored = EndpointRegistration::from_twin(&twin, false);
            if stored.is_activated() {
                if let Err(e) = self.deactivate(&stored, context, false).await {
                    warn!(endpoint_id = %endpoint_id, error = %e, "Failed to deactivate removed endpoint");
                }
            } else if let Err(e) = set_supervisor_secret(
                self.store.as_ref(),
                stored.base.supervisor_id.as_deref(),
                &endpoint_id,
                None,
            )
            .await
            {
                warn!(endpoint_id = %endpoint_id, error = %e, "Failed to clear supervisor secret");
            }
            self.store.delete(&endpoint_id, None, None).await?;
            self.broker
                .notify(
                    context,
                    &EndpointEvent::Deleted {
                        endpoint_id,
                        endpoint: item.to_service_model(),
                    },
                )
                .await;
            return Ok(true);
        }
        if item.base.disabled() {
            return Ok(false);
        }
        let mut update = item.clone();
        update.base.is_disabled = Some(true);
        update.base.not_seen_since = Some(Utc::now());
        self.store
            .patch(EndpointRegistration::patch(Some(item), &update)?, true)
            .await?;
        self.broker
            .notify(context, &EndpointEvent::Disabled(update.to_service_model()))
            .await;
        Ok(true)
    }

    async fn update_endpoint(
        &self,
        exists: &EndpointRegistration,
        found: EndpointRegistration,
        filter: Option<&EndpointActivationFilterModel>,
        context: &RegistryOperationContext,
    ) -> RegistryResult<bool> {
        let mut candidate = found;
        candidate.state = exists.state;
        if candidate.activated.is_none() {
            candidate.activated = exists.activated;
        }
        if exists.full_equals(&candidate) {
            return Ok(false);
        }
        let stored = self
            .store
            .patch(EndpointRegistration::patch(Some(exists), &candidate)?, true)
            .await?;
        let registration = EndpointRegistration::from_twin(&stored, true);
        let endpoint = registration.to_service_model();
        self.broker
            .notify(context, &EndpointEvent::Updated(endpoint.clone()))
            .await;
        if exists.base.disabled() {
            self.broker
                .notify(context, &EndpointEvent::Enabled(endpoint))
                .await;
        }
        if !registration.is_activated() {
            self.auto_activate(filter, &registration, context).await;
        }
        Ok(true)
    }

    async fn add_endpoint(
        &self,
        item: &EndpointRegistration,
        filter: Option<&EndpointActivationFilterModel>,
        context: &RegistryOperationContext,
    ) -> RegistryResult<()> {
        let stored = self
            .store
            .create_or_update(EndpointRegistration::patch(None, item)?, true)
            .await?;
        let registration = EndpointRegistration::from_twin(&stored, true);
        let endpoint = registration.to_service_model();
        self.broker
            .notify(context, &EndpointEvent::New(endpoint.clone()))
            .await;
        self.broker
            .notify(context, &EndpointEvent::Enabled(endpoint))
            .await;
        if !registration.is_activated() {
            self.auto_activate(filter, &registration, context).await;
        }
        Ok(())
    }

    // =========================================================================
    // Application lifecycle
    // =========================================================================

    /// Re-enables the disabled endpoints of an application and re-activates
    /// the ones that were activated before.
    pub async fn on_application_enabled(
        &self,
        context: &RegistryOperationContext,
        application_id: &str,
    ) -> RegistryResult<()> {
        for registration in self.endpoints_of(application_id, true).await? {
            if !registration.base.disabled() {
                continue;
            }
            let mut update = registration.clone();
            update.base.is_disabled = Some(false);
            update.base.not_seen_since = None;
            let enabled = match EndpointRegistration::patch(Some(&registration), &update) {
                Ok(patch) => self.store.patch(patch, false).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = enabled {
                error!(endpoint_id = ?registration.device_id(), error = %e, "Failed re-enabling endpoint");
                continue;
            }
            self.broker
                .notify(context, &EndpointEvent::Enabled(update.to_service_model()))
                .await;

            if !registration.is_activated() {
                continue;
            }
            if let Err(e) = self.activate(&update, context).await {
                error!(endpoint_id = ?registration.device_id(), error = %e, "Failed activating re-enabled endpoint");
            }
        }
        Ok(())
    }

    /// Deactivates and soft-disables the endpoints of an application.
    ///
    /// The activation flag is kept so that enabling the application again
    /// re-activates the endpoints.
    pub async fn on_application_disabled(
        &self,
        context: &RegistryOperationContext,
        application_id: &str,
    ) -> RegistryResult<()> {
        for registration in self.endpoints_of(application_id, true).await? {
            if registration.is_activated() {
                if let Err(e) = self.deactivate(&registration, context, false).await {
                    error!(endpoint_id = ?registration.device_id(), error = %e, "Failed deactivating disabled endpoint");
                }
            }
            if registration.base.disabled() {
                continue;
            }
            let mut update = registration.clone();
            update.base.is_disabled = Some(true);
            update.base.not_seen_since = Some(Utc::now());
            let disabled = match EndpointRegistration::patch(Some(&registration), &update) {
                Ok(patch) => self.store.patch(patch, false).await.map(|_| ()),
                Err(e) => Err(e),
            };
            match disabled {
                Ok(()) => {
                    self.broker
                        .notify(context, &EndpointEvent::Disabled(update.to_service_model()))
                        .await
                }
                Err(e) => {
                    error!(endpoint_id = ?registration.device_id(), error = %e, "Failed disabling endpoint")
                }
            }
        }
        Ok(())
    }

    /// Deactivates and deletes every endpoint of an application.
    ///
    /// Stops at the first endpoint that cannot be deleted.
    pub async fn on_application_deleted(
        &self,
        context: &RegistryOperationContext,
        application_id: &str,
    ) -> RegistryResult<()> {
        for registration in self.endpoints_of(application_id, true).await? {
            let Some(endpoint_id) = registration.device_id() else {
                continue;
            };
            if registration.is_activated() {
                if let Err(e) = self.deactivate(&registration, context, false).await {
                    error!(endpoint_id = %endpoint_id, error = %e, "Failed deactivating deleted endpoint");
                }
            }
            self.store.delete(&endpoint_id, None, None).await?;
            self.broker
                .notify(
                    context,
                    &EndpointEvent::Deleted {
                        endpoint_id,
                        endpoint: registration.to_service_model(),
                    },
                )
                .await;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use uareg_core::models::{EndpointModel, EndpointRegistrationModel};
    use uareg_core::twin::MemoryTwinStore;
    use uareg_core::types::SecurityMode;

    use crate::events::EndpointRegistryListener;

    const APP: &str = "uaa0001";

    #[derive(Default)]
    struct Activator {
        fail: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl EndpointActivator for Activator {
        async fn activate_endpoint(
            &self,
            _registration: &EndpointRegistrationModel,
            _secret: &str,
        ) -> RegistryResult<()> {
            self.calls.lock().push("activate");
            if self.fail {
                return Err(RegistryError::external("supervisor", "offline"));
            }
            Ok(())
        }

        async fn deactivate_endpoint(
            &self,
            _registration: &EndpointRegistrationModel,
        ) -> RegistryResult<()> {
            self.calls.lock().push("deactivate");
            Ok(())
        }
    }

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    #[async_trait]
    impl EndpointRegistryListener for Events {
        async fn on_endpoint_new(
            &self,
            _c: &RegistryOperationContext,
            _e: &EndpointInfoModel,
        ) -> RegistryResult<()> {
            self.0.lock().push("new".into());
            Ok(())
        }
        async fn on_endpoint_updated(
            &self,
            _c: &RegistryOperationContext,
            _e: &EndpointInfoModel,
        ) -> RegistryResult<()> {
            self.0.lock().push("updated".into());
            Ok(())
        }
        async fn on_endpoint_enabled(
            &self,
            _c: &RegistryOperationContext,
            _e: &EndpointInfoModel,
        ) -> RegistryResult<()> {
            self.0.lock().push("enabled".into());
            Ok(())
        }
        async fn on_endpoint_disabled(
            &self,
            _c: &RegistryOperationContext,
            _e: &EndpointInfoModel,
        ) -> RegistryResult<()> {
            self.0.lock().push("disabled".into());
            Ok(())
        }
        async fn on_endpoint_activated(
            &self,
            _c: &RegistryOperationContext,
            _e: &EndpointInfoModel,
        ) -> RegistryResult<()> {
            self.0.lock().push("activated".into());
            Ok(())
        }
        async fn on_endpoint_deactivated(
            &self,
            _c: &RegistryOperationContext,
            _e: &EndpointInfoModel,
        ) -> RegistryResult<()> {
            self.0.lock().push("deactivated".into());
            Ok(())
        }
        async fn on_endpoint_deleted(
            &self,
            _c: &RegistryOperationContext,
            _id: &str,
            _e: &EndpointInfoModel,
        ) -> RegistryResult<()> {
            self.0.lock().push("deleted".into());
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<MemoryTwinStore>,
        activator: Arc<Activator>,
        events: Arc<Events>,
        registry: EndpointRegistry,
    }

    fn fixture(fail_activation: bool) -> Fixture {
        let store = Arc::new(MemoryTwinStore::new());
        let activator = Arc::new(Activator {
            fail: fail_activation,
            ..Default::default()
        });
        let events = Arc::new(Events::default());
        let broker = Arc::new(EndpointEventBroker::new());
        broker.register(events.clone());
        let registry = EndpointRegistry::new(store.clone(), activator.clone(), broker);
        Fixture {
            store,
            activator,
            events,
            registry,
        }
    }

    fn endpoint(url: &str, supervisor: &str) -> EndpointInfoModel {
        EndpointInfoModel {
            application_id: APP.into(),
            registration: EndpointRegistrationModel {
                endpoint_url: Some(url.into()),
                supervisor_id: Some(supervisor.into()),
                endpoint: EndpointModel::new(url).with_security(SecurityMode::SignAndEncrypt, "Basic256"),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn seed(f: &Fixture, model: &EndpointInfoModel) -> String {
        let registration = EndpointRegistration::from_service_model(model, Some(false));
        let twin = EndpointRegistration::patch(None, &registration).unwrap();
        f.store.create_or_update(twin, true).await.unwrap().id
    }

    async fn supervisor_twin(f: &Fixture) {
        f.store.create_or_update(DeviceTwin::new("s1"), true).await.unwrap();
    }

    fn sweep() -> DiscoveryResultModel {
        DiscoveryResultModel::default()
    }

    #[tokio::test]
    async fn test_unfound_owned_endpoint_is_soft_disabled() {
        let f = fixture(false);
        let id = seed(&f, &endpoint("opc.tcp://plc1:4840", "s1")).await;

        let report = f
            .registry
            .process_discovery_events(vec![], &sweep(), None, Some("s1"), Some(APP), false)
            .await
            .unwrap();

        assert_eq!(report.removed, 1);
        let twin = f.store.snapshot(&id, None).unwrap();
        assert_eq!(twin.tag_bool(tag::IS_DISABLED), Some(true));
        assert!(twin.tag(tag::NOT_SEEN_SINCE).is_some());
        assert_eq!(*f.events.0.lock(), vec!["disabled".to_string()]);
    }

    #[tokio::test]
    async fn test_endpoint_of_other_supervisor_is_untouched() {
        let f = fixture(false);
        let id = seed(&f, &endpoint("opc.tcp://plc1:4840", "s2")).await;
        let before = f.store.snapshot(&id, None).unwrap();

        let report = f
            .registry
            .process_discovery_events(vec![], &sweep(), None, Some("s1"), Some(APP), false)
            .await
            .unwrap();

        assert_eq!(report.unchanged, 1);
        assert_eq!(report.removed, 0);
        assert_eq!(f.store.snapshot(&id, None).unwrap(), before);
        assert!(f.events.0.lock().is_empty());
    }

    #[tokio::test]
    async fn test_refound_endpoint_is_patched_in_place() {
        let f = fixture(false);
        let id = seed(&f, &endpoint("opc.tcp://plc1:4840", "s1")).await;
        let mut found = endpoint("opc.tcp://PLC1:4840", "s1");
        found.registration.security_level = Some(7);

        let report = f
            .registry
            .process_discovery_events(vec![found], &sweep(), None, Some("s1"), Some(APP), false)
            .await
            .unwrap();

        assert_eq!(report, ReconcileReport { updated: 1, ..Default::default() });
        assert_eq!(f.store.len(), 1);
        let twin = f.store.snapshot(&id, None).unwrap();
        assert_eq!(twin.tag("SecurityLevel"), Some(&serde_json::json!(7)));
        assert_eq!(*f.events.0.lock(), vec!["updated".to_string()]);

        let again = f
            .registry
            .process_discovery_events(
                vec![{
                    let mut e = endpoint("opc.tcp://PLC1:4840", "s1");
                    e.registration.security_level = Some(7);
                    e
                }],
                &sweep(),
                None,
                Some("s1"),
                Some(APP),
                false,
            )
            .await
            .unwrap();
        assert_eq!(again.unchanged, 1);
    }

    #[tokio::test]
    async fn test_new_endpoint_with_filter_is_activated() {
        let f = fixture(false);
        supervisor_twin(&f).await;
        let result = DiscoveryResultModel {
            discovery_config: Some(uareg_core::models::DiscoveryConfigModel {
                activation_filter: Some(EndpointActivationFilterModel::default()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let report = f
            .registry
            .process_discovery_events(
                vec![endpoint("opc.tcp://plc1:4840", "s1")],
                &result,
                None,
                Some("s1"),
                None,
                false,
            )
            .await
            .unwrap();

        assert_eq!(report.added, 1);
        let endpoints = f.registry.get_application_endpoints(APP, false, false).await.unwrap();
        assert_eq!(endpoints[0].activation_state, Some(EndpointActivationState::Activated));
        assert_eq!(
            *f.events.0.lock(),
            vec!["new".to_string(), "enabled".to_string(), "activated".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_auto_activation_does_not_fail_sweep() {
        let f = fixture(true);
        let result = DiscoveryResultModel {
            discovery_config: Some(uareg_core::models::DiscoveryConfigModel {
                activation_filter: Some(EndpointActivationFilterModel::default()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let report = f
            .registry
            .process_discovery_events(
                vec![endpoint("opc.tcp://plc1:4840", "s1")],
                &result,
                None,
                Some("s1"),
                None,
                false,
            )
            .await
            .unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(*f.activator.calls.lock(), vec!["activate", "deactivate"]);
        let endpoints = f.registry.get_application_endpoints(APP, false, false).await.unwrap();
        assert_eq!(endpoints[0].activation_state, Some(EndpointActivationState::Deactivated));
    }

    #[tokio::test]
    async fn test_explicit_activation_rolls_back_and_fails() {
        let f = fixture(true);
        let id = seed(&f, &endpoint("opc.tcp://plc1:4840", "s1")).await;

        let error = f.registry.activate_endpoint(&id, None).await.unwrap_err();
        assert!(matches!(error, RegistryError::External { .. }));
        assert_eq!(*f.activator.calls.lock(), vec!["activate", "deactivate"]);
        assert!(!f.registry.get_endpoint(&id, true).await.unwrap().activation_state.unwrap().is_activated());
    }

    #[tokio::test]
    async fn test_activate_then_deactivate() {
        let f = fixture(false);
        supervisor_twin(&f).await;
        let id = seed(&f, &endpoint("opc.tcp://plc1:4840", "s1")).await;

        f.registry.activate_endpoint(&id, None).await.unwrap();
        assert_eq!(f.store.snapshot(&id, None).unwrap().tag_bool(ACTIVATED), Some(true));
        let secret = f.store.get_primary_key(&id, None).await.unwrap();
        let supervisor = f.store.snapshot("s1", None).unwrap();
        assert_eq!(supervisor.desired().unwrap()[&id], serde_json::json!(secret));

        f.registry.deactivate_endpoint(&id, None).await.unwrap();
        assert_eq!(f.store.snapshot(&id, None).unwrap().tag_bool(ACTIVATED), Some(false));
        let supervisor = f.store.snapshot("s1", None).unwrap();
        assert!(supervisor.desired().unwrap().get(&id).is_none());
        assert_eq!(
            *f.events.0.lock(),
            vec!["activated".to_string(), "deactivated".to_string()]
        );
    }

    #[tokio::test]
    async fn test_activation_requires_supervisor_and_enabled() {
        let f = fixture(false);
        let id = seed(&f, &endpoint("opc.tcp://plc1:4840", "")).await;
        assert!(matches!(
            f.registry.activate_endpoint(&id, None).await,
            Err(RegistryError::Argument { .. })
        ));

        let f = fixture(false);
        let id = seed(&f, &endpoint("opc.tcp://plc1:4840", "s1")).await;
        f.registry
            .process_discovery_events(vec![], &sweep(), None, Some("s1"), Some(APP), false)
            .await
            .unwrap();
        assert!(matches!(
            f.registry.activate_endpoint(&id, None).await,
            Err(RegistryError::ResourceInvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_hard_delete_removes_twin() {
        let f = fixture(false);
        let id = seed(&f, &endpoint("opc.tcp://plc1:4840", "s1")).await;

        let report = f
            .registry
            .process_discovery_events(vec![], &sweep(), None, Some("s1"), Some(APP), true)
            .await
            .unwrap();

        assert_eq!(report.removed, 1);
        assert!(f.store.snapshot(&id, None).is_none());
        assert_eq!(*f.events.0.lock(), vec!["deleted".to_string()]);
    }

    #[tokio::test]
    async fn test_hard_delete_without_supervisor_twin() {
        let f = fixture(false);
        let id = seed(&f, &endpoint("opc.tcp://plc1:4840", "s1")).await;
        assert!(f.store.snapshot("s1", None).is_none());

        let report = f
            .registry
            .process_discovery_events(vec![], &sweep(), None, Some("s1"), Some(APP), true)
            .await
            .unwrap();

        assert_eq!(report.removed, 1);
        assert_eq!(report.unchanged, 0);
        assert!(f.store.snapshot(&id, None).is_none());
        assert!(f.activator.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_hard_delete_deactivates_activated_endpoint() {
        let f = fixture(false);
        supervisor_twin(&f).await;
        let id = seed(&f, &endpoint("opc.tcp://plc1:4840", "s1")).await;
        f.registry.activate_endpoint(&id, None).await.unwrap();
        f.events.0.lock().clear();

        let report = f
            .registry
            .process_discovery_events(vec![], &sweep(), None, Some("s1"), Some(APP), true)
            .await
            .unwrap();

        assert_eq!(report.removed, 1);
        assert!(f.store.snapshot(&id, None).is_none());
        assert_eq!(*f.activator.calls.lock(), vec!["activate", "deactivate"]);
        let supervisor = f.store.snapshot("s1", None).unwrap();
        assert!(supervisor.desired().unwrap().get(&id).is_none());
        assert_eq!(
            *f.events.0.lock(),
            vec!["deactivated".to_string(), "deleted".to_string()]
        );
    }

    #[tokio::test]
    async fn test_application_disable_and_enable_round_trip() {
        let f = fixture(false);
        supervisor_twin(&f).await;
        let id = seed(&f, &endpoint("opc.tcp://plc1:4840", "s1")).await;
        f.registry.activate_endpoint(&id, None).await.unwrap();
        let context = RegistryOperationContext::now(None);

        f.registry.on_application_disabled(&context, APP).await.unwrap();
        let twin = f.store.snapshot(&id, None).unwrap();
        assert_eq!(twin.tag_bool(tag::IS_DISABLED), Some(true));
        assert_eq!(twin.tag_bool(ACTIVATED), Some(true));

        f.registry.on_application_enabled(&context, APP).await.unwrap();
        let twin = f.store.snapshot(&id, None).unwrap();
        assert!(twin.tag(tag::IS_DISABLED).is_none());
        assert!(twin.tag(tag::NOT_SEEN_SINCE).is_none());
        assert_eq!(
            *f.activator.calls.lock(),
            vec!["activate", "deactivate", "activate"]
        );
    }

    #[test]
    fn test_endpoint_query_rendering() {
        let query = endpoint_query(&EndpointRegistrationQueryModel {
            url: Some("OPC.TCP://Host:4840".into()),
            security_mode: Some(SecurityMode::Sign),
            activated: Some(false),
            ..Default::default()
        });
        assert_eq!(
            query.to_sql(),
            "SELECT * FROM devices WHERE tags.DeviceType = 'Endpoint' \
             AND NOT IS_DEFINED(tags.NotSeenSince) \
             AND tags.EndpointUrlLC = 'opc.tcp://host:4840' \
             AND properties.desired.SecurityMode = 'Sign' \
             AND NOT tags.Activated = true"
        );

        let state = endpoint_query(&EndpointRegistrationQueryModel {
            endpoint_state: Some(uareg_core::types::EndpointConnectivityState::Ready),
            include_not_seen_since: Some(true),
            ..Default::default()
        });
        assert_eq!(
            state.to_sql(),
            "SELECT * FROM devices WHERE tags.DeviceType = 'Endpoint' \
             AND properties.reported.State = 'Ready' \
             AND tags.Activated = true \
             AND connectionState = 'Connected'"
        );
    }
}
