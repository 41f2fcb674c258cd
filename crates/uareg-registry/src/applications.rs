// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application registry.
//!
//! Applications are registered explicitly or found by discoverers. Every
//! mutation is an etag-guarded read-modify-write cycle that is retried when
//! the store reports the record as out of date.
//!
//! Disabling an application disables its endpoints; enabling it re-enables
//! them; unregistering it deletes them. The endpoint side of these
//! transitions is delegated to the [`EndpointRegistry`].

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};

use uareg_core::models::{
    ApplicationInfoListModel, ApplicationInfoModel, ApplicationRegistrationModel,
    ApplicationRegistrationQueryModel, ApplicationRegistrationRequestModel,
    ApplicationRegistrationUpdateModel, ApplicationSiteListModel, DiscoveryEventModel,
    DiscoveryResultModel, EndpointInfoModel, RegistryOperationContext,
};
use uareg_core::registration::application::{
    capability_key, APPLICATION_NAME, APPLICATION_TYPE, APPLICATION_URI_LC, CAPABILITIES,
    DISCOVERY_PROFILE_URI, GATEWAY_SERVER_URI, LOCALIZED_NAMES, PRODUCT_URI,
};
use uareg_core::registration::{device_type, tag, twin_device_type, ApplicationRegistration};
use uareg_core::twin::{FieldPath, Predicate, TwinQuery, TwinStore};
use uareg_core::types::ApplicationType;
use uareg_core::{retry_on_out_of_date, RegistryError, RegistryResult};

use crate::endpoints::EndpointRegistry;
use crate::events::{ApplicationEvent, ApplicationEventBroker};
use crate::reconcile::{self, ReconcileReport};

/// Default number of sites per page.
pub const DEFAULT_SITE_PAGE_SIZE: usize = 100;

// =============================================================================
// Query construction
// =============================================================================

fn type_predicate(application_type: ApplicationType) -> Predicate {
    let eq = |t: ApplicationType| {
        Predicate::Eq(FieldPath::Tag(APPLICATION_TYPE.to_string()), t.as_str().into())
    };
    match application_type {
        ApplicationType::Client => Predicate::Or(vec![
            eq(ApplicationType::Client),
            eq(ApplicationType::ClientAndServer),
        ]),
        ApplicationType::Server => Predicate::Or(vec![
            eq(ApplicationType::Server),
            eq(ApplicationType::ClientAndServer),
            eq(ApplicationType::DiscoveryServer),
        ]),
        other => eq(other),
    }
}

/// Builds the twin query for an application query model.
///
/// A name is matched in the requested locale when one is given, otherwise
/// against the default name. A locale without name matches every
/// application carrying a name in that locale.
pub fn application_query(model: &ApplicationRegistrationQueryModel) -> TwinQuery {
    let mut query = TwinQuery::devices().tag_eq(tag::DEVICE_TYPE, device_type::APPLICATION);
    if !model.include_not_seen_since.unwrap_or(false) {
        query = query.tag_not_defined(tag::NOT_SEEN_SINCE);
    }
    match (&model.locale, &model.application_name) {
        (Some(locale), Some(name)) => {
            query = query.tag_eq(&format!("{LOCALIZED_NAMES}.{locale}"), name.clone());
        }
        (Some(locale), None) => {
            query = query.and(Predicate::IsDefined(FieldPath::Tag(format!(
                "{LOCALIZED_NAMES}.{locale}"
            ))));
        }
        (None, Some(name)) => query = query.tag_eq(APPLICATION_NAME, name.clone()),
        (None, None) => {}
    }
    query = query
        .tag_eq_opt(tag::DISCOVERER_ID, model.discoverer_id.clone())
        .tag_eq_opt(PRODUCT_URI, model.product_uri.clone())
        .tag_eq_opt(GATEWAY_SERVER_URI, model.gateway_server_uri.clone())
        .tag_eq_opt(DISCOVERY_PROFILE_URI, model.discovery_profile_uri.clone())
        .tag_eq_opt(APPLICATION_URI_LC, model.application_uri.as_ref().map(|u| u.to_lowercase()));
    if let Some(application_type) = model.application_type {
        query = query.and(type_predicate(application_type));
    }
    if let Some(capability) = &model.capability {
        query = query.tag_eq(&format!("{CAPABILITIES}.{}", capability_key(capability)), true);
    }
    query.tag_eq_opt(tag::SITE_OR_GATEWAY_ID, model.site_or_gateway_id.clone())
}

fn all_applications() -> TwinQuery {
    TwinQuery::devices().tag_eq(tag::DEVICE_TYPE, device_type::APPLICATION)
}

fn stamp_updated(registration: &mut ApplicationRegistration, context: &RegistryOperationContext) {
    registration.update_authority_id = context.authority_id.clone();
    registration.update_time = Some(context.time);
}

// =============================================================================
// ApplicationRegistry
// =============================================================================

/// Application registry over a twin store.
pub struct ApplicationRegistry {
    store: Arc<dyn TwinStore>,
    endpoints: Arc<EndpointRegistry>,
    broker: Arc<ApplicationEventBroker>,
    hard_delete_endpoints: bool,
}

impl ApplicationRegistry {
    /// Creates the registry.
    pub fn new(
        store: Arc<dyn TwinStore>,
        endpoints: Arc<EndpointRegistry>,
        broker: Arc<ApplicationEventBroker>,
    ) -> Self {
        Self {
            store,
            endpoints,
            broker,
            hard_delete_endpoints: false,
        }
    }

    /// Deletes endpoints discovery no longer reports instead of disabling them.
    pub fn with_hard_delete(mut self, enabled: bool) -> Self {
        self.hard_delete_endpoints = enabled;
        self
    }

    /// Returns the endpoint registry.
    pub fn endpoints(&self) -> &Arc<EndpointRegistry> {
        &self.endpoints
    }

    /// Returns the event broker.
    pub fn broker(&self) -> &Arc<ApplicationEventBroker> {
        &self.broker
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Registers an application and returns its id.
    ///
    /// Fails with `ConflictingResource` if the application exists.
    pub async fn register_application(
        &self,
        request: ApplicationRegistrationRequestModel,
    ) -> RegistryResult<String> {
        let application_uri = request
            .application_uri
            .filter(|u| !u.is_empty())
            .ok_or_else(|| RegistryError::argument("applicationUri", "Application uri missing"))?;
        let context = RegistryOperationContext::validated(request.context);
        let model = ApplicationInfoModel {
            application_type: request.application_type.unwrap_or_default(),
            application_uri,
            product_uri: request.product_uri,
            application_name: request.application_name,
            locale: request.locale,
            localized_names: request.localized_names,
            capabilities: request.capabilities,
            discovery_urls: request.discovery_urls,
            discovery_profile_uri: request.discovery_profile_uri,
            gateway_server_uri: request.gateway_server_uri,
            site_id: request.site_id,
            created: Some(context.clone()),
            ..Default::default()
        };

        let registration = ApplicationRegistration::from_service_model(&model, None, None);
        let stored = self
            .store
            .create_or_update(ApplicationRegistration::patch(None, &registration)?, false)
            .await?;
        let application = ApplicationRegistration::from_twin(&stored).to_service_model();
        info!(application_id = %application.application_id, uri = %application.application_uri, "Application registered");

        self.broker
            .notify(&context, &ApplicationEvent::New(application.clone()))
            .await;
        self.handle_enabled(&context, &application).await?;
        Ok(application.application_id)
    }

    /// Applies a partial update to an application.
    pub async fn update_application(
        &self,
        application_id: &str,
        request: ApplicationRegistrationUpdateModel,
    ) -> RegistryResult<()> {
        let context = RegistryOperationContext::validated(request.context.clone());
        let (registration, _) = self
            .update_registration(application_id, |current| {
                let mut next = current.clone();
                if let Some(product_uri) = &request.product_uri {
                    next.product_uri = Some(product_uri.clone());
                }
                if let Some(name) = &request.application_name {
                    next.application_name = Some(name.clone());
                }
                if let Some(locale) = &request.locale {
                    next.locale = Some(locale.clone());
                }
                if let Some(names) = &request.localized_names {
                    next.localized_names = Some(names.clone());
                }
                if let Some(certificate) = &request.certificate {
                    next.base.certificate = Some(certificate.clone());
                }
                if let Some(capabilities) = &request.capabilities {
                    next.capabilities = Some(capabilities.clone());
                }
                if let Some(urls) = &request.discovery_urls {
                    next.discovery_urls = Some(urls.clone());
                }
                if let Some(uri) = &request.discovery_profile_uri {
                    next.discovery_profile_uri = Some(uri.clone());
                }
                if let Some(uri) = &request.gateway_server_uri {
                    next.gateway_server_uri = Some(uri.clone());
                }
                stamp_updated(&mut next, &context);
                Some(next)
            })
            .await?;
        self.broker
            .notify(
                &context,
                &ApplicationEvent::Updated(registration.to_service_model()),
            )
            .await;
        Ok(())
    }

    /// Disables an application and its endpoints.
    pub async fn disable_application(
        &self,
        application_id: &str,
        context: Option<RegistryOperationContext>,
    ) -> RegistryResult<()> {
        let context = RegistryOperationContext::validated(context);
        let (registration, disabled) = self.disable_registration(application_id, &context).await?;
        if disabled {
            self.handle_disabled(&context, &registration.to_service_model())
                .await?;
        }
        Ok(())
    }

    /// Enables a disabled application and its endpoints.
    pub async fn enable_application(
        &self,
        application_id: &str,
        context: Option<RegistryOperationContext>,
    ) -> RegistryResult<()> {
        let context = RegistryOperationContext::validated(context);
        let (registration, enabled) = self
            .update_registration(application_id, |current| {
                current.base.disabled().then(|| {
                    let mut next = current.clone();
                    next.base.is_disabled = Some(false);
                    next.base.not_seen_since = None;
                    stamp_updated(&mut next, &context);
                    next
                })
            })
            .await?;
        if enabled {
            self.handle_enabled(&context, &registration.to_service_model())
                .await?;
        }
        Ok(())
    }

    /// Deletes an application and all of its endpoints.
    pub async fn unregister_application(
        &self,
        application_id: &str,
        context: Option<RegistryOperationContext>,
    ) -> RegistryResult<()> {
        let context = RegistryOperationContext::validated(context);
        self.endpoints
            .on_application_deleted(&context, application_id)
            .await?;
        let Some(application) = self.delete_registration(application_id, |_| true).await? else {
            return Ok(());
        };
        info!(application_id = %application_id, "Application unregistered");
        self.broker
            .notify(
                &context,
                &ApplicationEvent::Deleted {
                    application_id: application_id.to_string(),
                    application,
                },
            )
            .await;
        Ok(())
    }

    /// Deletes applications that have been disabled for longer than
    /// `not_seen_for`, together with their endpoints.
    ///
    /// Failures are logged per application. Returns the number purged.
    pub async fn purge_disabled_applications(
        &self,
        not_seen_for: Duration,
        context: Option<RegistryOperationContext>,
    ) -> RegistryResult<usize> {
        let context = RegistryOperationContext::validated(context);
        let not_seen_for = chrono::Duration::from_std(not_seen_for)
            .map_err(|e| RegistryError::argument("notSeenFor", e.to_string()))?;
        let cutoff = Utc::now() - not_seen_for;

        let query = all_applications().and(Predicate::IsDefined(FieldPath::Tag(
            tag::NOT_SEEN_SINCE.to_string(),
        )));
        let candidates: Vec<ApplicationInfoModel> = self
            .store
            .query_all(&query)
            .await?
            .iter()
            .map(|t| ApplicationRegistration::from_twin(t).to_service_model())
            .filter(|a| a.not_seen_since.is_some_and(|seen| seen < cutoff))
            .collect();

        let mut purged = 0;
        for candidate in candidates {
            let application_id = candidate.application_id.clone();
            let result: RegistryResult<Option<ApplicationInfoModel>> = async {
                self.endpoints
                    .on_application_deleted(&context, &application_id)
                    .await?;
                self.delete_registration(&application_id, |current| {
                    current
                        .base
                        .not_seen_since
                        .is_some_and(|seen| seen < cutoff)
                })
                .await
            }
            .await;
            match result {
                Ok(Some(application)) => {
                    purged += 1;
                    self.broker
                        .notify(
                            &context,
                            &ApplicationEvent::Deleted {
                                application_id,
                                application,
                            },
                        )
                        .await;
                }
                Ok(None) => {}
                Err(e) => {
                    error!(application_id = %application_id, error = %e, "Exception purging application, continuing");
                }
            }
        }
        if purged > 0 {
            info!(purged = purged, "Purged disabled applications");
        }
        Ok(purged)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Reads an application with its endpoints.
    ///
    /// Deleted endpoints are included only when the application itself is
    /// disabled.
    pub async fn get_application(
        &self,
        application_id: &str,
        filter_inactive: bool,
    ) -> RegistryResult<ApplicationRegistrationModel> {
        let application = self.registration(application_id).await?.to_service_model();
        let endpoints = self
            .endpoints
            .get_application_endpoints(
                application_id,
                application.not_seen_since.is_some(),
                filter_inactive,
            )
            .await?;
        Ok(ApplicationRegistrationModel {
            application,
            endpoints: endpoints.into_iter().map(|e| e.registration).collect(),
        })
    }

    /// Lists one page of applications, including disabled ones.
    pub async fn list_applications(
        &self,
        continuation: Option<&str>,
        page_size: Option<usize>,
    ) -> RegistryResult<ApplicationInfoListModel> {
        let page = self
            .store
            .query(&all_applications(), continuation, page_size)
            .await?;
        Ok(ApplicationInfoListModel {
            items: page
                .items
                .iter()
                .map(|t| ApplicationRegistration::from_twin(t).to_service_model())
                .collect(),
            continuation_token: page.continuation_token,
        })
    }

    /// Queries applications.
    pub async fn query_applications(
        &self,
        model: &ApplicationRegistrationQueryModel,
        page_size: Option<usize>,
    ) -> RegistryResult<ApplicationInfoListModel> {
        let query = application_query(model);
        debug!(query = %query, "Querying applications");
        let page = self.store.query(&query, None, page_size).await?;
        Ok(ApplicationInfoListModel {
            items: page
                .items
                .iter()
                .map(|t| ApplicationRegistration::from_twin(t).to_service_model())
                .collect(),
            continuation_token: page.continuation_token,
        })
    }

    /// Lists the distinct sites applications are registered in.
    ///
    /// The continuation token is the offset into the sorted site list.
    pub async fn list_sites(
        &self,
        continuation: Option<&str>,
        page_size: Option<usize>,
    ) -> RegistryResult<ApplicationSiteListModel> {
        let offset = match continuation {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| RegistryError::argument("continuationToken", "Invalid token"))?,
            None => 0,
        };
        let page_size = page_size.unwrap_or(DEFAULT_SITE_PAGE_SIZE).max(1);
        let sites: BTreeSet<String> = self
            .store
            .query_all(&all_applications())
            .await?
            .iter()
            .filter_map(|t| t.tag_str(tag::SITE_OR_GATEWAY_ID))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let total = sites.len();
        let page: Vec<String> = sites.into_iter().skip(offset).take(page_size).collect();
        let next = offset + page.len();
        Ok(ApplicationSiteListModel {
            sites: page,
            continuation_token: (next < total).then(|| next.to_string()),
        })
    }

    // =========================================================================
    // Discovery reconciliation
    // =========================================================================

    /// Merges the applications and endpoints one discoverer found in a site.
    ///
    /// Existing applications are those of the site or of the discoverer.
    /// Unfound applications owned by the discoverer are disabled together
    /// with their endpoints unless the result is register-only. New
    /// applications are created; when one already exists under the same id
    /// it is updated instead. Found applications are updated when owned by
    /// the discoverer, unowned, or disabled, and their endpoints merged.
    pub async fn process_discovery_events(
        &self,
        site_id: &str,
        discoverer_id: &str,
        result: &DiscoveryResultModel,
        events: Vec<DiscoveryEventModel>,
    ) -> RegistryResult<ReconcileReport> {
        if site_id.is_empty() {
            return Err(RegistryError::argument("siteId", "Site id is required"));
        }
        if discoverer_id.is_empty() {
            return Err(RegistryError::argument("discovererId", "Discoverer id is required"));
        }
        let context = RegistryOperationContext::validated(result.context.clone());

        let query = all_applications().and(Predicate::Or(vec![
            Predicate::Eq(FieldPath::Tag(tag::SITE_ID.to_string()), site_id.into()),
            Predicate::Eq(FieldPath::Tag(tag::DISCOVERER_ID.to_string()), discoverer_id.into()),
        ]));
        let existing: Vec<ApplicationRegistration> = self
            .store
            .query_all(&query)
            .await?
            .iter()
            .filter(|t| twin_device_type(t) == Some(device_type::APPLICATION))
            .map(ApplicationRegistration::from_twin)
            .collect();

        let mut found = Vec::with_capacity(events.len());
        let mut endpoints: HashMap<String, Vec<EndpointInfoModel>> = HashMap::new();
        for event in events {
            let mut application = event.application;
            application.application_id = String::new();
            application.site_id = Some(site_id.to_string());
            application.discoverer_id = Some(discoverer_id.to_string());
            application.not_seen_since = None;
            let registration = ApplicationRegistration::from_service_model(&application, Some(false), None);
            let Some(application_id) = registration.id() else {
                debug!(index = event.index, "Skipping discovery event without application uri");
                continue;
            };
            let mut endpoint = event.registration;
            endpoint.site_id = Some(site_id.to_string());
            endpoint.discoverer_id = Some(discoverer_id.to_string());
            endpoints
                .entry(application_id.clone())
                .or_default()
                .push(EndpointInfoModel {
                    application_id,
                    registration: endpoint,
                    ..Default::default()
                });
            found.push(registration);
        }

        let diff = reconcile::diff(existing, found, ApplicationRegistration::logical_key);
        let mut report = ReconcileReport::default();

        if !result.is_register_only() {
            for item in &diff.remove {
                if item.base.discoverer_id.as_deref() != Some(discoverer_id) {
                    report.unchanged += 1;
                    continue;
                }
                match self.remove_discovered(item, &context).await {
                    Ok(true) => report.removed += 1,
                    Ok(false) => report.unchanged += 1,
                    Err(e) => {
                        report.unchanged += 1;
                        error!(application_id = ?item.device_id(), error = %e, "Exception during application disabling");
                    }
                }
            }
        }

        let mut unchanged = diff.unchanged;
        for item in diff.add {
            match self
                .add_discovered(&item, result, discoverer_id, &endpoints, &context)
                .await
            {
                Ok(()) => report.added += 1,
                Err(e) if e.is_conflict() => {
                    let existing = match item.id() {
                        Some(id) => self.registration(&id).await,
                        None => Err(RegistryError::argument("applicationUri", "Application uri missing")),
                    };
                    match existing {
                        Ok(existing) => unchanged.push((existing, item)),
                        Err(e) => {
                            report.unchanged += 1;
                            error!(error = %e, "Exception reading conflicting application");
                        }
                    }
                }
                Err(e) => {
                    report.unchanged += 1;
                    error!(application_id = ?item.id(), error = %e, "Exception adding application from discovery");
                }
            }
        }

        for (exists, found) in unchanged {
            let owned = exists.base.disabled()
                || exists.base.discoverer_id.is_none()
                || exists.base.discoverer_id.as_deref() == Some(discoverer_id);
            if !owned {
                report.unchanged += 1;
                continue;
            }
            match self
                .update_discovered(&exists, found, result, discoverer_id, &endpoints, &context)
                .await
            {
                Ok(true) => report.updated += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    report.unchanged += 1;
                    error!(application_id = ?exists.device_id(), error = %e, "Exception during application update");
                }
            }
        }

        info!(
            discoverer_id = %discoverer_id,
            site_id = %site_id,
            added = report.added,
            updated = report.updated,
            removed = report.removed,
            unchanged = report.unchanged,
            "Processed discovery results"
        );
        Ok(report)
    }

    async fn remove_discovered(
        &self,
        item: &ApplicationRegistration,
        context: &RegistryOperationContext,
    ) -> RegistryResult<bool> {
        let application_id = item
            .device_id()
            .ok_or_else(|| RegistryError::argument("applicationId", "Application has no id"))?;
        let (registration, disabled) = self.disable_registration(&application_id, context).await?;
        if disabled {
            self.handle_disabled(context, &registration.to_service_model())
                .await?;
        }
        Ok(disabled)
    }

    async fn add_discovered(
        &self,
        item: &ApplicationRegistration,
        result: &DiscoveryResultModel,
        discoverer_id: &str,
        endpoints: &HashMap<String, Vec<EndpointInfoModel>>,
        context: &RegistryOperationContext,
    ) -> RegistryResult<()> {
        let mut registration = item.clone();
        registration.create_authority_id = context.authority_id.clone();
        registration.create_time = Some(context.time);
        let stored = self
            .store
            .create_or_update(ApplicationRegistration::patch(None, &registration)?, false)
            .await?;
        let application = ApplicationRegistration::from_twin(&stored).to_service_model();
        self.broker
            .notify(context, &ApplicationEvent::New(application.clone()))
            .await;
        self.handle_enabled(context, &application).await?;

        let found = endpoints
            .get(&application.application_id)
            .cloned()
            .unwrap_or_default();
        self.endpoints
            .process_discovery_events(
                found,
                result,
                Some(discoverer_id),
                None,
                None,
                self.hard_delete_endpoints,
            )
            .await?;
        Ok(())
    }

    async fn update_discovered(
        &self,
        exists: &ApplicationRegistration,
        found: ApplicationRegistration,
        result: &DiscoveryResultModel,
        discoverer_id: &str,
        endpoints: &HashMap<String, Vec<EndpointInfoModel>>,
        context: &RegistryOperationContext,
    ) -> RegistryResult<bool> {
        let application_id = exists
            .device_id()
            .ok_or_else(|| RegistryError::argument("applicationId", "Application has no id"))?;
        let was_disabled = exists.base.disabled();
        let (registration, patched) = self
            .update_registration(&application_id, |current| {
                let mut next = found.clone();
                next.base.device_id = current.base.device_id.clone();
                next.base.etag = current.base.etag.clone();
                next.base.is_disabled = Some(false);
                next.base.not_seen_since = None;
                next.create_authority_id = current.create_authority_id.clone();
                next.create_time = current.create_time;
                next.update_authority_id = current.update_authority_id.clone();
                next.update_time = current.update_time;
                if current.full_equals(&next) {
                    return None;
                }
                stamp_updated(&mut next, context);
                Some(next)
            })
            .await?;
        let application = registration.to_service_model();
        if was_disabled && patched {
            self.handle_enabled(context, &application).await?;
        }

        let found = endpoints.get(&application_id).cloned().unwrap_or_default();
        self.endpoints
            .process_discovery_events(
                found,
                result,
                Some(discoverer_id),
                None,
                Some(&application_id),
                self.hard_delete_endpoints,
            )
            .await?;

        if patched {
            self.broker
                .notify(context, &ApplicationEvent::Updated(application))
                .await;
        }
        Ok(patched)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn handle_enabled(
        &self,
        context: &RegistryOperationContext,
        application: &ApplicationInfoModel,
    ) -> RegistryResult<()> {
        self.endpoints
            .on_application_enabled(context, &application.application_id)
            .await?;
        self.broker
            .notify(context, &ApplicationEvent::Enabled(application.clone()))
            .await;
        Ok(())
    }

    async fn handle_disabled(
        &self,
        context: &RegistryOperationContext,
        application: &ApplicationInfoModel,
    ) -> RegistryResult<()> {
        self.endpoints
            .on_application_disabled(context, &application.application_id)
            .await?;
        self.broker
            .notify(context, &ApplicationEvent::Disabled(application.clone()))
            .await;
        Ok(())
    }

    async fn disable_registration(
        &self,
        application_id: &str,
        context: &RegistryOperationContext,
    ) -> RegistryResult<(ApplicationRegistration, bool)> {
        self.update_registration(application_id, |current| {
            (!current.base.disabled()).then(|| {
                let mut next = current.clone();
                next.base.is_disabled = Some(true);
                next.base.not_seen_since = Some(Utc::now());
                stamp_updated(&mut next, context);
                next
            })
        })
        .await
    }

    /// Reads an application registration.
    async fn registration(&self, application_id: &str) -> RegistryResult<ApplicationRegistration> {
        if application_id.is_empty() {
            return Err(RegistryError::argument("applicationId", "Application id is required"));
        }
        let twin = self.store.get(application_id, None).await?;
        if twin.id != application_id {
            return Err(RegistryError::argument(
                "applicationId",
                "Id must be same as application to patch",
            ));
        }
        if twin_device_type(&twin) != Some(device_type::APPLICATION) {
            return Err(RegistryError::not_found(format!(
                "{application_id} is not an application registration"
            )));
        }
        Ok(ApplicationRegistration::from_twin(&twin))
    }

    /// Runs an optimistic update cycle.
    ///
    /// `updater` returns the new registration, or `None` to leave the record
    /// alone. Returns the resulting registration and whether it was patched.
    async fn update_registration<F>(
        &self,
        application_id: &str,
        updater: F,
    ) -> RegistryResult<(ApplicationRegistration, bool)>
    where
        F: Fn(&ApplicationRegistration) -> Option<ApplicationRegistration>,
    {
        let updater = &updater;
        retry_on_out_of_date("application", || async move {
            let current = self.registration(application_id).await?;
            let Some(update) = updater(&current) else {
                return Ok((current, false));
            };
            let twin = ApplicationRegistration::patch(Some(&current), &update)?;
            let stored = self.store.patch(twin, false).await?;
            Ok((ApplicationRegistration::from_twin(&stored), true))
        })
        .await
    }

    /// Deletes an application if `precondition` holds for it.
    ///
    /// Returns `None` if the record is gone or the precondition failed.
    async fn delete_registration<F>(
        &self,
        application_id: &str,
        precondition: F,
    ) -> RegistryResult<Option<ApplicationInfoModel>>
    where
        F: Fn(&ApplicationRegistration) -> bool,
    {
        let precondition = &precondition;
        retry_on_out_of_date("application", || async move {
            let current = match self.registration(application_id).await {
                Ok(current) => current,
                Err(e) if e.is_not_found() => return Ok(None),
                Err(e) => return Err(e),
            };
            if !precondition(&current) {
                return Ok(None);
            }
            self.store
                .delete(application_id, None, current.base.etag.as_deref())
                .await?;
            Ok(Some(current.to_service_model()))
        })
        .await
    }
}

// =============================================================================
// Tests
// =============================================================================
