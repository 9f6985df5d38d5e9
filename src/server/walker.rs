// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The zone walker.
//!
//! Starting from the zone owning the served apex, the walker descends label
//! by label towards the query name. At every step it checks for a delegation
//! point (an entry with a non-empty NS list owned by the current zone) and
//! for a nested zone (a zone whose parent is the current zone). In
//! transitive mode the walk continues into nested zones; otherwise the
//! nested zone is handed back as a delegation. A direct NS query for a
//! nested apex is answered at the parent even in transitive mode, so the
//! delegation NS set stays observable.
//!
//! Nested zone domains are relative to the parent apex: a zone `child.`
//! under `example.org.` covers `child.example.org.`. The lookups here run on
//! those relative names; the returned `apex` values are absolute.

use crate::cache::ObjectKey;
use crate::controller::Controller;
use crate::projection::{join_label, split_labels, trim_zone, Entry, Zone};
use hickory_proto::rr::RecordType;
use std::sync::Arc;
use tracing::debug;

/// Where the walk ended up.
#[derive(Clone, Debug)]
pub enum ZoneWalk {
    /// The chosen zone answers authoritatively. `apex` is the absolute apex
    /// the query name is relative to.
    Authoritative {
        /// The answering zone.
        zone: Arc<Zone>,
        /// Absolute apex of the answering zone.
        apex: String,
    },
    /// An NS entry set inside the zone delegates this subtree.
    Delegated {
        /// The entries carrying the delegation NS records.
        entries: Vec<Arc<Entry>>,
        /// Absolute name of the delegation point.
        apex: String,
    },
    /// A nested zone owns the subtree but the walk does not descend
    /// (non-transitive mode, or a direct NS query for the nested apex).
    Nested {
        /// The nested zone; its published name servers form the authority.
        zone: Arc<Zone>,
        /// Absolute apex of the nested zone.
        apex: String,
    },
}

/// Walk from `base` (serving `base_apex`) towards `qname`.
///
/// `qname` and `base_apex` are normalised (lower-case, trailing dot);
/// `qname` must lie within `base_apex`.
pub fn find_zone(
    ctrl: &Controller,
    base: Arc<Zone>,
    base_apex: &str,
    qname: &str,
    transitive: bool,
    qtype: RecordType,
) -> ZoneWalk {
    let mut zone = base;
    let mut zone_apex = base_apex.to_string();
    let mut cur = base_apex.to_string();
    let mut rel = ".".to_string();

    let sub = trim_zone(qname, base_apex).unwrap_or_default();
    let mut labels = split_labels(&sub);
    labels.reverse(); // apex side first

    for label in labels {
        cur = join_label(label, &cur);
        rel = join_label(label, &rel);

        let delegation: Vec<Arc<Entry>> = ctrl
            .entry_dns_index_exact(&rel)
            .into_iter()
            .filter(|e| {
                e.zone_ref == zone.name && e.namespace == zone.namespace && !e.ns.is_empty()
            })
            .collect();
        if !delegation.is_empty() {
            debug!(name = %cur, rel = %rel, "found delegation point");
            return ZoneWalk::Delegated {
                entries: delegation,
                apex: cur,
            };
        }

        let nested = ctrl
            .zone_domain_index(&rel)
            .into_iter()
            .find(|z| z.parent_ref == zone.name && z.namespace == zone.namespace);
        if let Some(nested) = nested {
            debug!(name = %cur, rel = %rel, zone = %nested.name, "found nested zone");
            if !transitive || (qtype == RecordType::NS && qname == cur) {
                return ZoneWalk::Nested {
                    zone: nested,
                    apex: cur,
                };
            }
            zone = nested;
            zone_apex = cur.clone();
            rel = ".".to_string();
        }
    }

    ZoneWalk::Authoritative {
        zone,
        apex: zone_apex,
    }
}

/// Find the deepest zone under `base` that covers `qname`, for SOA
/// synthesis. Ascends from the full qname towards the root, looking for a
/// zone domain at each level whose ancestry leads to `base`.
///
/// Both absolute zone domains (roots) and relative ones (nested zones) are
/// considered: each suffix of the qname is tried verbatim and relative to
/// the base apex.
pub fn find_matching_zone(
    ctrl: &Controller,
    base: &Arc<Zone>,
    base_apex: &str,
    qname: &str,
) -> Option<Arc<Zone>> {
    let mut current = qname.to_string();
    let label_count = split_labels(qname).len();
    for _ in 0..=label_count {
        let mut candidates = ctrl.zone_domain_index(&current);
        if let Some(rel) = relative_to(&current, base_apex) {
            candidates.extend(ctrl.zone_domain_index(&rel));
        }
        if let Some(zone) = find_nested(ctrl, &candidates, base) {
            return Some(zone);
        }
        match current.split_once('.') {
            Some((_, rest)) if !rest.is_empty() => current = rest.to_string(),
            _ => break,
        }
    }
    None
}

/// The given absolute name expressed relative to the apex (`child.` for
/// `child.example.org.` under `example.org.`), when it lies below it.
fn relative_to(name: &str, apex: &str) -> Option<String> {
    let sub = trim_zone(name, apex)?;
    if sub.is_empty() {
        None
    } else {
        Some(format!("{sub}."))
    }
}

/// From the candidate zones, the one whose parent chain reaches `base`.
fn find_nested(ctrl: &Controller, zones: &[Arc<Zone>], base: &Arc<Zone>) -> Option<Arc<Zone>> {
    for candidate in zones {
        let mut zone = Some(Arc::clone(candidate));
        let mut hops = 0usize;
        while let Some(z) = zone {
            if (z.name == base.name && z.namespace == base.namespace) || z.parent_ref == base.name {
                return Some(Arc::clone(candidate));
            }
            hops += 1;
            if z.parent_ref.is_empty() || hops > 32 {
                zone = None;
            } else {
                zone = ctrl.get_zone(&ObjectKey::new(&z.namespace, &z.parent_ref));
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "walker_tests.rs"]
mod walker_tests;
