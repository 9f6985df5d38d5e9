// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-key reconciliation of `CoreDNSEntry` objects.
//!
//! An entry reconcile resolves the entry's root zone through the `parentRef`
//! chain, decides whether this server is responsible for it, computes the
//! effective FQDNs (relative names multiplied through every ancestor's
//! domains) and writes the result back into status.

use crate::cache::ObjectKey;
use crate::constants::{STATE_OK, STATE_READY};
use crate::controller::status::{write_entry_status, Verdict};
use crate::controller::Controller;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Reconcile one entry by key.
///
/// A missing entry is a deletion: the cache has already dropped it from
/// every index, nothing else to do.
pub async fn reconcile_entry(ctrl: &Arc<Controller>, key: &ObjectKey) -> Result<()> {
    let Some(entry) = ctrl.entries.get(key) else {
        info!(entry = %key, "entry has been deleted");
        return Ok(());
    };

    if !entry.valid {
        return write_entry_status(ctrl, &entry, &Verdict::invalid(entry.message.clone()), "", &[])
            .await;
    }

    if entry.zone_ref.is_empty() {
        // Legacy entries are honoured only without a governing zone object
        // and only inside the observed namespaces.
        if ctrl.opts.zone_ref.is_some() {
            return Ok(());
        }
        if !ctrl.opts.namespaces.is_empty() && !ctrl.opts.namespaces.contains(&entry.namespace) {
            return Ok(());
        }
        return write_entry_status(ctrl, &entry, &Verdict::ok(), "", &entry.dns_names).await;
    }

    let Some(zone_ref) = &ctrl.opts.zone_ref else {
        return Ok(());
    };
    if zone_ref.namespace != entry.namespace {
        return Ok(());
    }

    let referenced = ObjectKey::new(&key.namespace, &entry.zone_ref);
    let Some(zone) = ctrl.zones.get(&referenced) else {
        return write_entry_status(ctrl, &entry, &Verdict::invalid("no root zone found"), "", &[])
            .await;
    };

    let mut names = entry.dns_names.clone();
    let ancestry = ctrl.responsible_for_zone(&zone, Some(&mut names));
    debug!(
        entry = %key,
        responsible = ancestry.responsible,
        root = ancestry.root.as_deref().unwrap_or(""),
        "resolved zone ancestry"
    );

    let Some(root) = ancestry.root else {
        return write_entry_status(ctrl, &entry, &Verdict::invalid("no root zone found"), "", &[])
            .await;
    };

    if !ancestry.responsible {
        // The entry belongs to a different root. If it used to be ours,
        // record the hand-over; otherwise it is simply not our business.
        if !entry.status.root_zone.is_empty() && entry.status.root_zone == zone_ref.name {
            return write_entry_status(ctrl, &entry, &Verdict::invalid("responsibility lost"), "", &[])
                .await;
        }
        return Ok(());
    }

    let root_key = ObjectKey::new(&entry.namespace, &root);
    let root_state = ctrl
        .zones
        .get(&root_key)
        .map(|z| z.state().to_string())
        .unwrap_or_default();
    if root_state != STATE_READY && root_state != STATE_OK {
        let message = ctrl
            .zones
            .get(&root_key)
            .map(|z| z.status.message.clone())
            .unwrap_or_default();
        debug!(entry = %key, zone = %root, state = %root_state, "root zone not ready");
        return write_entry_status(
            ctrl,
            &entry,
            &Verdict::invalid(format!("zone failure: {message}")),
            &root,
            &names,
        )
        .await;
    }

    write_entry_status(ctrl, &entry, &Verdict::ok(), &root, &names).await
}

#[cfg(test)]
#[path = "reconcile_entries_tests.rs"]
mod reconcile_entries_tests;
