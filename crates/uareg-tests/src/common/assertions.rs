// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Custom Test Assertions
//!
//! Domain-specific assertion helpers with informative failure messages.

use uareg_core::models::{ApplicationInfoModel, EndpointInfoModel};
use uareg_core::types::EndpointActivationState;
use uareg_opcua::ClientStatsSnapshot;
use uareg_registry::ReconcileReport;

// =============================================================================
// Reconcile Assertions
// =============================================================================

/// Asserts the counters of a reconcile report.
#[track_caller]
pub fn assert_report(
    report: &ReconcileReport,
    added: usize,
    updated: usize,
    removed: usize,
    unchanged: usize,
) {
    let expected = ReconcileReport {
        added,
        updated,
        removed,
        unchanged,
    };
    assert_eq!(*report, expected, "unexpected reconcile report");
}

// =============================================================================
// Registration Assertions
// =============================================================================

/// Assertion extensions for endpoint registrations.
pub trait EndpointAssertions {
    /// Assert that the endpoint is activated.
    fn assert_activated(&self);

    /// Assert that the endpoint is not activated.
    fn assert_deactivated(&self);

    /// Assert that the endpoint is soft-deleted.
    fn assert_not_seen(&self);
}

impl EndpointAssertions for EndpointInfoModel {
    #[track_caller]
    fn assert_activated(&self) {
        assert!(
            self.activation_state.map_or(false, |s| s.is_activated()),
            "expected {} to be activated, got {:?}",
            self.registration.id,
            self.activation_state
        );
    }

    #[track_caller]
    fn assert_deactivated(&self) {
        assert!(
            matches!(
                self.activation_state,
                None | Some(EndpointActivationState::Deactivated)
            ),
            "expected {} to be deactivated, got {:?}",
            self.registration.id,
            self.activation_state
        );
    }

    #[track_caller]
    fn assert_not_seen(&self) {
        assert!(
            self.not_seen_since.is_some(),
            "expected {} to be soft-deleted",
            self.registration.id
        );
    }
}

/// Assertion extensions for application registrations.
pub trait ApplicationAssertions {
    /// Assert that the application is enabled.
    fn assert_enabled(&self);

    /// Assert that the application is soft-deleted.
    fn assert_disabled(&self);
}

impl ApplicationAssertions for ApplicationInfoModel {
    #[track_caller]
    fn assert_enabled(&self) {
        assert!(
            self.not_seen_since.is_none(),
            "expected {} to be enabled",
            self.application_uri
        );
    }

    #[track_caller]
    fn assert_disabled(&self) {
        assert!(
            self.not_seen_since.is_some(),
            "expected {} to be disabled",
            self.application_uri
        );
    }
}

// =============================================================================
// Client Assertions
// =============================================================================

/// Asserts session creation and reuse counters.
#[track_caller]
pub fn assert_sessions(stats: &ClientStatsSnapshot, created: u64, reused: u64) {
    assert_eq!(
        (stats.sessions_created, stats.sessions_reused),
        (created, reused),
        "unexpected (created, reused) session counters: {stats:?}"
    );
}
