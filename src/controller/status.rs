// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status write-back for zones and entries.
//!
//! Each reconcile computes the desired status, diffs it against the observed
//! status carried by the projected object and writes only on change, so that
//! re-entry without change is a no-op and no update storms occur. In `slave`
//! mode all writes are suppressed and a higher-level controller owns status.
//!
//! Two status shapes exist. A resource is in **plain mode** when its current
//! status contains no conditions other than the `DNSServer` condition type:
//! `state`/`message` are then set directly. Otherwise a single `DNSServer`
//! condition is reconciled and the operator-owned fields are left alone.

use crate::cache::StoreObject;
use crate::controller::Controller;
use crate::crd::Condition;
use crate::constants::{
    REASON_SERVER_ACTIVE, REASON_VALIDATION_FAILED, SERVER_CONDITION_TYPE, STATE_INVALID, STATE_OK,
};
use crate::projection::{Entry, Zone};
use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tracing::debug;

/// The verdict a reconcile wants reflected in status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    /// `Ok` or `Invalid`.
    pub state: &'static str,
    /// Human-readable explanation, empty when valid.
    pub message: String,
}

impl Verdict {
    /// A passing verdict.
    #[must_use]
    pub fn ok() -> Self {
        Verdict {
            state: STATE_OK,
            message: String::new(),
        }
    }

    /// A failing verdict with a message.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Verdict {
            state: STATE_INVALID,
            message: message.into(),
        }
    }
}

/// Create a new condition with the current timestamp.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Whether a condition differs from the stored one in type, status or
/// message. `reason` and `lastTransitionTime` move with the condition and
/// are not compared.
#[must_use]
pub fn condition_changed(existing: Option<&Condition>, new_condition: &Condition) -> bool {
    match existing {
        Some(current) => {
            current.r#type != new_condition.r#type
                || current.status != new_condition.status
                || current.message != new_condition.message
        }
        None => true,
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// A status is plain when it has no conditions other than the server
/// condition type.
#[must_use]
pub fn is_plain(conditions: &[Condition]) -> bool {
    conditions.iter().all(|c| c.r#type == SERVER_CONDITION_TYPE)
}

/// Reconcile the single `DNSServer` condition into a condition list,
/// returning the new list, or `None` when nothing changed.
fn reconcile_server_condition(existing: &[Condition], verdict: &Verdict) -> Option<Vec<Condition>> {
    let (status, reason) = if verdict.state == STATE_OK {
        ("True", REASON_SERVER_ACTIVE)
    } else {
        ("False", REASON_VALIDATION_FAILED)
    };
    let desired = create_condition(SERVER_CONDITION_TYPE, status, reason, &verdict.message);
    let current = find_condition(existing, SERVER_CONDITION_TYPE);
    if !condition_changed(current, &desired) {
        return None;
    }
    let mut conditions: Vec<Condition> = existing
        .iter()
        .filter(|c| c.r#type != SERVER_CONDITION_TYPE)
        .cloned()
        .collect();
    conditions.push(desired);
    Some(conditions)
}

/// Write an entry's status: verdict plus the computed root zone and
/// effective FQDNs. No-op when nothing changed or in slave mode.
pub async fn write_entry_status(
    ctrl: &Controller,
    entry: &Entry,
    verdict: &Verdict,
    root_zone: &str,
    dns_names: &[String],
) -> Result<()> {
    if ctrl.opts.slave {
        return Ok(());
    }
    let observed = &entry.status;

    if is_plain(&observed.conditions) {
        let unchanged = observed.state == verdict.state
            && observed.message == verdict.message
            && observed.root_zone == root_zone
            && observed.dns_names == dns_names;
        if unchanged {
            return Ok(());
        }
        debug!(entry = %entry.key(), state = verdict.state, "updating entry status");
        ctrl.entry_source
            .patch_status(
                &entry.namespace,
                &entry.name,
                json!({
                    "state": verdict.state,
                    "message": verdict.message,
                    "rootZone": root_zone,
                    "dnsNames": dns_names,
                }),
            )
            .await?;
        return Ok(());
    }

    let conditions = reconcile_server_condition(&observed.conditions, verdict);
    let names_changed = observed.root_zone != root_zone || observed.dns_names != dns_names;
    if conditions.is_none() && !names_changed {
        return Ok(());
    }
    let conditions = conditions.unwrap_or_else(|| observed.conditions.clone());
    debug!(entry = %entry.key(), state = verdict.state, "updating entry condition");
    ctrl.entry_source
        .patch_status(
            &entry.namespace,
            &entry.name,
            json!({
                "conditions": conditions,
                "rootZone": root_zone,
                "dnsNames": dns_names,
            }),
        )
        .await?;
    Ok(())
}

/// Write a zone's status. Returns whether a write happened, so callers can
/// cascade to dependents on meaningful change. No-op in slave mode.
pub async fn write_zone_status(ctrl: &Controller, zone: &Zone, verdict: &Verdict) -> Result<bool> {
    if ctrl.opts.slave {
        return Ok(false);
    }
    let Some(source) = &ctrl.zone_source else {
        return Ok(false);
    };
    let observed = &zone.status;
    let observed_class = observed.observed.as_ref().map(|o| o.class.clone()).unwrap_or_default();
    let observed_runtime = observed
        .observed
        .as_ref()
        .map(|o| o.runtime.clone())
        .unwrap_or_default();
    let desired_class = zone.class.clone().unwrap_or_default();
    let desired_runtime = zone.runtime.clone().unwrap_or_default();
    let observed_changed = zone.parent_ref.is_empty()
        && (observed_class != desired_class || observed_runtime != desired_runtime);
    let observed_patch = json!({ "class": desired_class, "runtime": desired_runtime });

    if is_plain(&observed.conditions) {
        let unchanged =
            observed.state == verdict.state && observed.message == verdict.message && !observed_changed;
        if unchanged {
            return Ok(false);
        }
        debug!(zone = %zone.key(), state = verdict.state, "updating zone status");
        let mut patch = json!({
            "state": verdict.state,
            "message": verdict.message,
        });
        if zone.parent_ref.is_empty() {
            patch["observed"] = observed_patch;
        }
        source.patch_status(&zone.namespace, &zone.name, patch).await?;
        return Ok(true);
    }

    let conditions = reconcile_server_condition(&observed.conditions, verdict);
    if conditions.is_none() && !observed_changed {
        return Ok(false);
    }
    let conditions = conditions.unwrap_or_else(|| observed.conditions.clone());
    debug!(zone = %zone.key(), state = verdict.state, "updating zone condition");
    let mut patch = json!({ "conditions": conditions });
    if zone.parent_ref.is_empty() {
        patch["observed"] = observed_patch;
    }
    source.patch_status(&zone.namespace, &zone.name, patch).await?;
    Ok(true)
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
