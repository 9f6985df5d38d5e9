// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-key reconciliation of `HostedZone` objects.
//!
//! A zone reconcile determines whether the configured zone object is the
//! root of this zone's ancestor chain, writes the validation verdict into
//! status and cascades to every dependent entry and nested zone. Deleted
//! zones cascade as well, so dependents re-evaluate their (now broken)
//! chains.

use crate::cache::ObjectKey;
use crate::controller::status::{write_zone_status, Verdict};
use crate::controller::Controller;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Reconcile one zone by key.
pub async fn reconcile_zone(ctrl: &Arc<Controller>, key: &ObjectKey) -> Result<()> {
    if ctrl.opts.zone_ref.is_none() {
        debug!(zone = %key, "unexpected zone reconciliation without a zone object");
        return Ok(());
    }

    let Some(zone) = ctrl.zones.get(key) else {
        info!(zone = %key, "hosted zone has been deleted");
        ctrl.trigger_entries_for_zone(key);
        ctrl.trigger_nested_zones(key);
        return Ok(());
    };

    let ancestry = ctrl.responsible_for_zone(&zone, None);

    if ancestry.root.is_none() {
        // parent chain broken: report, and let dependents see the failure
        let changed =
            write_zone_status(ctrl, &zone, &Verdict::invalid("no root zone found")).await?;
        if changed {
            ctrl.trigger_entries_for_zone(key);
        }
        return Ok(());
    }

    if !ancestry.responsible {
        info!(
            zone = %key,
            root = ancestry.root.as_deref().unwrap_or(""),
            "not responsible for root zone"
        );
        return Ok(());
    }

    debug!(zone = %key, "responsible");

    let verdict = if zone.valid {
        Verdict::ok()
    } else {
        Verdict::invalid(zone.message.clone())
    };
    write_zone_status(ctrl, &zone, &verdict).await?;

    ctrl.trigger_entries_for_zone(key);
    ctrl.trigger_nested_zones(key);
    Ok(())
}

#[cfg(test)]
#[path = "reconcile_zones_tests.rs"]
mod reconcile_zones_tests;
