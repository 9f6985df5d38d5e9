// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Projection of raw `CoreDNSEntry` resources into cached entries.

use crate::cache::{ObjectKey, StoreObject};
use crate::config::Mode;
use crate::crd::{CoreDNSEntry, CoreDNSEntryStatus};
use crate::projection::normalize_name;
use kube::ResourceExt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A validated SRV record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SrvRecord {
    /// `TCP` or `UDP`.
    pub protocol: String,
    /// Record priority.
    pub priority: u16,
    /// Record weight.
    pub weight: u16,
    /// Target port.
    pub port: u16,
    /// Normalised target host.
    pub host: String,
}

/// A stripped-down `CoreDNSEntry` carrying only what the serving path needs.
///
/// Entries failing validation are still constructed (`valid = false`) so that
/// dependent zones observe them and status can report the failure; their
/// record accessors yield nothing.
#[derive(Clone, Debug, Default)]
pub struct Entry {
    /// Observed resource version.
    pub version: String,
    /// Object name.
    pub name: String,
    /// Object namespace.
    pub namespace: String,
    /// Name of the referenced `HostedZone`, empty for legacy entries.
    pub zone_ref: String,
    /// Validation verdict.
    pub valid: bool,
    /// Validation failure message, empty when valid.
    pub message: String,
    /// Record TTL override; 0 defers to the server default.
    pub ttl: u32,
    /// Normalised DNS names (relative for zone-anchored entries).
    pub dns_names: Vec<String>,
    /// Validated IPv4 addresses.
    pub a: Vec<Ipv4Addr>,
    /// Validated IPv6 addresses.
    pub aaaa: Vec<Ipv6Addr>,
    /// Normalised CNAME target, empty when absent.
    pub cname: String,
    /// TXT strings.
    pub txt: Vec<String>,
    /// Normalised name-server hosts; non-empty marks a delegation point.
    pub ns: Vec<String>,
    /// Named SRV service, when present.
    pub service_name: String,
    /// Validated SRV records.
    pub srv: Vec<SrvRecord>,
    /// Observed status, kept for write-on-change diffing.
    pub status: CoreDNSEntryStatus,
}

/// Configuration slice the entry projection depends on.
#[derive(Clone, Copy, Debug)]
pub struct EntryContext<'a> {
    /// Operating mode.
    pub mode: Mode,
    /// First served apex, lower-cased FQDN.
    pub apex: &'a str,
}

impl<'a> EntryContext<'a> {
    /// Suffix for names of non-anchored entries, in legacy subdomain mode.
    fn base(&self, namespace: &str, zone_anchored: bool) -> Option<String> {
        if self.mode == Mode::Subdomains && !zone_anchored {
            Some(format!("{namespace}.{}", self.apex))
        } else {
            None
        }
    }
}

/// Project a raw `CoreDNSEntry` into a cached [`Entry`].
///
/// Pure: no status is written here; the verdict travels in the returned
/// object and the reconciler owns the write-back.
#[must_use]
pub fn project_entry(raw: &CoreDNSEntry, ctx: &EntryContext<'_>) -> Entry {
    let namespace = raw.namespace().unwrap_or_default();
    let spec = &raw.spec;
    let zone_anchored = !spec.zone_ref.is_empty();
    let base = ctx.base(&namespace, zone_anchored);

    let mut entry = Entry {
        version: raw.resource_version().unwrap_or_default(),
        name: raw.name_any(),
        namespace,
        zone_ref: spec.zone_ref.clone(),
        ttl: spec.ttl.unwrap_or(0),
        status: raw.status.clone().unwrap_or_default(),
        ..Entry::default()
    };

    // Failed checks overwrite earlier ones; the last failure in declaration
    // order ends up in the message.
    let mut err: Option<String> = None;

    for n in &spec.dns_names {
        entry.dns_names.push(suffixed(n, base.as_deref()));
    }

    for literal in &spec.a {
        match literal.parse::<Ipv4Addr>() {
            Ok(ip) => entry.a.push(ip),
            Err(_) => err = Some(format!("invalid ipv4 address {literal:?}")),
        }
    }
    for literal in &spec.aaaa {
        match literal.parse::<Ipv6Addr>() {
            Ok(ip) => entry.aaaa.push(ip),
            Err(_) => err = Some(format!("invalid ipv6 address {literal:?}")),
        }
    }

    if !spec.cname.is_empty() {
        entry.cname = suffixed(&spec.cname, base.as_deref());
    }
    for n in &spec.ns {
        entry.ns.push(suffixed(n, base.as_deref()));
    }
    entry.txt = spec.txt.clone();

    if let Some(srv) = &spec.srv {
        entry.service_name = srv.service.clone();
        if !srv.records.is_empty() && srv.service.is_empty() {
            err = Some("service name required for SRV record".to_string());
        }
        for (i, r) in srv.records.iter().enumerate() {
            if r.protocol != "TCP" && r.protocol != "UDP" {
                err = Some(format!("invalid protocol {:?} for SRV record {i}", r.protocol));
                continue;
            }
            let port = match u16::try_from(r.port) {
                Ok(p) if p > 0 => p,
                _ => {
                    err = Some(format!("invalid port for SRV record {i}"));
                    continue;
                }
            };
            if r.host.is_empty() {
                err = Some(format!("host missing for SRV record {i}"));
                continue;
            }
            entry.srv.push(SrvRecord {
                protocol: r.protocol.clone(),
                priority: u16::try_from(r.priority).unwrap_or(0),
                weight: u16::try_from(r.weight).unwrap_or(0),
                port,
                host: suffixed(&r.host, base.as_deref()),
            });
        }
    }

    if spec.dns_names.is_empty() {
        err = Some("at least one DNS name is required".to_string());
    }
    if spec.a.is_empty()
        && spec.aaaa.is_empty()
        && spec.cname.is_empty()
        && spec.ns.is_empty()
        && spec.txt.is_empty()
        && spec.srv.as_ref().is_none_or(|s| s.records.is_empty())
    {
        err = Some("no record defined".to_string());
    }

    match err {
        Some(message) => {
            entry.valid = false;
            entry.message = message;
        }
        None => entry.valid = true,
    }
    entry
}

/// Normalise a name, appending the legacy base unless it is already absolute.
fn suffixed(name: &str, base: Option<&str>) -> String {
    let normalized = normalize_name(name);
    match base {
        Some(base) if !name.ends_with('.') => format!("{normalized}{base}"),
        _ => normalized,
    }
}

impl Entry {
    /// Whether this entry can answer the given record type.
    #[must_use]
    pub fn match_type(&self, qtype: hickory_proto::rr::RecordType) -> bool {
        use hickory_proto::rr::RecordType;
        if !self.valid {
            return false;
        }
        match qtype {
            RecordType::ANY => {
                self.match_type(RecordType::A)
                    || self.match_type(RecordType::AAAA)
                    || self.match_type(RecordType::CNAME)
                    || self.match_type(RecordType::TXT)
                    || self.match_type(RecordType::SRV)
                    || self.match_type(RecordType::NS)
            }
            RecordType::A => !self.a.is_empty(),
            RecordType::AAAA => !self.aaaa.is_empty(),
            RecordType::CNAME => !self.cname.is_empty(),
            RecordType::TXT => !self.txt.is_empty(),
            RecordType::SRV => !self.srv.is_empty(),
            RecordType::NS => !self.ns.is_empty(),
            _ => false,
        }
    }

    /// The SRV records matching an optional protocol filter. Invalid entries
    /// yield nothing.
    #[must_use]
    pub fn srv_records(&self, protocol: Option<&str>) -> Vec<&SrvRecord> {
        if !self.valid {
            return Vec::new();
        }
        self.srv
            .iter()
            .filter(|r| protocol.is_none_or(|p| r.protocol == p))
            .collect()
    }

    /// Effective TTL: the entry override when non-zero, else the default.
    #[must_use]
    pub fn effective_ttl(&self, default: u32) -> u32 {
        if self.ttl > 0 {
            self.ttl
        } else {
            default
        }
    }

    /// Semantic equivalence: ignores version and status so that writes
    /// caused by this server do not re-trigger reconciles.
    #[must_use]
    pub fn equivalent(&self, other: &Entry) -> bool {
        self.dns_names == other.dns_names
            && self.a == other.a
            && self.aaaa == other.aaaa
            && self.cname == other.cname
            && self.txt == other.txt
            && self.service_name == other.service_name
            && self.srv == other.srv
    }
}

impl StoreObject for Entry {
    fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    fn resource_version(&self) -> &str {
        &self.version
    }

    fn equivalent(&self, other: &Self) -> bool {
        Entry::equivalent(self, other)
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod entry_tests;
