// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Service-facing models.
//!
//! These are the shapes callers of the registry exchange. The twin record
//! projections they are persisted as live in [`crate::registration`].

pub mod application;
pub mod discovery;
pub mod endpoint;
pub mod module;

pub use application::{
    ApplicationInfoListModel, ApplicationInfoModel, ApplicationRegistrationModel,
    ApplicationRegistrationQueryModel, ApplicationRegistrationRequestModel,
    ApplicationRegistrationUpdateModel, ApplicationSiteListModel,
};
pub use discovery::{
    DiscoveryConfigModel, DiscoveryEventModel, DiscoveryMode, DiscoveryRequestModel,
    DiscoveryResultModel, EndpointActivationFilterModel, RegistryOperationContext,
};
pub use endpoint::{
    AuthenticationMethodModel, CredentialModel, EndpointInfoListModel, EndpointInfoModel,
    EndpointModel, EndpointRegistrationModel, EndpointRegistrationQueryModel,
};
pub use module::{EdgeModuleListModel, EdgeModuleModel, EdgeModuleQueryModel, EdgeModuleUpdateModel};
