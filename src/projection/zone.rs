// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Projection of raw `HostedZone` resources into cached zones.

use crate::cache::{ObjectKey, StoreObject};
use crate::crd::{HostedZone, HostedZoneStatus};
use crate::projection::normalize_name;
use kube::ResourceExt;
use std::collections::BTreeSet;

/// A stripped-down `HostedZone` carrying only what the serving path needs.
#[derive(Clone, Debug, Default)]
pub struct Zone {
    /// Observed resource version.
    pub version: String,
    /// Object name.
    pub name: String,
    /// Object namespace.
    pub namespace: String,
    /// Validation verdict.
    pub valid: bool,
    /// Validation failure message, empty when valid.
    pub message: String,
    /// Normalised domain names. Absolute for root zones, relative to the
    /// parent apex for nested zones.
    pub domain_names: Vec<String>,
    /// SOA mailbox in DNS form (`admin\.user.example.org.`), empty when the
    /// e-mail failed validation.
    pub email: String,
    /// SOA refresh seconds.
    pub refresh: i32,
    /// SOA retry seconds.
    pub retry: i32,
    /// SOA expire seconds.
    pub expire: i32,
    /// SOA minimum TTL seconds.
    pub minimum_ttl: i32,
    /// Name of the parent zone, empty for roots.
    pub parent_ref: String,
    /// Realm class, root zones only.
    pub class: Option<String>,
    /// Deployment runtime, root zones only.
    pub runtime: Option<String>,
    /// Published name servers, normalised.
    pub name_servers: Vec<String>,
    /// Observed status, kept for write-on-change diffing.
    pub status: HostedZoneStatus,
}

/// Configuration slice the zone projection depends on.
#[derive(Clone, Copy, Debug)]
pub struct ZoneContext {
    /// Whether the running mode supports nested zones at all.
    pub nested_allowed: bool,
}

/// Project a raw `HostedZone` into a cached [`Zone`].
///
/// The admin e-mail is rewritten into SOA mailbox form: dots in the local
/// part are backslash-escaped and the `@` becomes a label separator
/// (`admin.user@example.org` -> `admin\.user.example.org.`).
#[must_use]
pub fn project_zone(raw: &HostedZone, ctx: &ZoneContext) -> Zone {
    let spec = &raw.spec;
    let status = raw.status.clone().unwrap_or_default();

    let mut zone = Zone {
        version: raw.resource_version().unwrap_or_default(),
        name: raw.name_any(),
        namespace: raw.namespace().unwrap_or_default(),
        domain_names: spec.domain_names.iter().map(|n| normalize_name(n)).collect(),
        refresh: spec.refresh,
        retry: spec.retry,
        expire: spec.expire,
        minimum_ttl: spec.minimum_ttl,
        parent_ref: spec.parent_ref.clone(),
        class: spec.class.clone(),
        runtime: spec.runtime.clone(),
        name_servers: status.name_servers.iter().map(|n| normalize_name(n)).collect(),
        status,
        ..Zone::default()
    };

    let mut err: Option<String> = None;

    if spec.email.is_empty() {
        err = Some("email address required".to_string());
    } else {
        match rewrite_mailbox(&spec.email) {
            Some(mbox) => zone.email = mbox,
            None => err = Some(format!("invalid email address {:?}", spec.email)),
        }
    }

    if spec.domain_names.is_empty() {
        err = Some("at least one domain name is required".to_string());
    }

    if !ctx.nested_allowed && !spec.parent_ref.is_empty() {
        err = Some("nested zones not supported in non-transitive mode".to_string());
    }

    match err {
        Some(message) => {
            zone.valid = false;
            zone.message = message;
        }
        None => zone.valid = true,
    }
    zone
}

/// Rewrite an e-mail address into SOA mailbox form. Returns `None` for
/// structurally invalid addresses.
fn rewrite_mailbox(email: &str) -> Option<String> {
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || domain.contains(char::is_whitespace) {
        return None;
    }
    let escaped = local.replace('.', "\\.");
    Some(normalize_name(&format!("{escaped}.{domain}")))
}

impl Zone {
    /// The first (primary) domain of this zone, or the root when none is
    /// configured.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.domain_names.first().map_or(".", String::as_str)
    }

    /// Observed zone state, written by this server or a higher-level operator.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.status.state
    }

    /// Semantic equivalence: the name-server set, the SOA parameters and the
    /// state string. Version and the rest of the status are ignored.
    #[must_use]
    pub fn equivalent(&self, other: &Zone) -> bool {
        let ns_a: BTreeSet<&String> = self.name_servers.iter().collect();
        let ns_b: BTreeSet<&String> = other.name_servers.iter().collect();
        ns_a == ns_b
            && self.domain_names == other.domain_names
            && self.email == other.email
            && self.refresh == other.refresh
            && self.retry == other.retry
            && self.expire == other.expire
            && self.minimum_ttl == other.minimum_ttl
            && self.parent_ref == other.parent_ref
            && self.status.state == other.status.state
    }
}

impl StoreObject for Zone {
    fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    fn resource_version(&self) -> &str {
        &self.version
    }

    fn equivalent(&self, other: &Self) -> bool {
        Zone::equivalent(self, other)
    }
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod zone_tests;
