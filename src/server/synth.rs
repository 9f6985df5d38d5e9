// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The record synthesiser.
//!
//! Given the zone chosen by the walker, the apex the query name is relative
//! to and the parsed record request, this module builds the answer and extra
//! record sets per query type. ANY dispatches to the per-type functions and
//! concatenates. Wildcard expansion is a single fallback lookup with the
//! first label replaced by `*`, never attempted for the apex itself.
//!
//! TTL policy: the per-entry TTL wins when non-zero, then the configured
//! default, then the chosen zone's minimum TTL, then 300 seconds.

use crate::config::Mode;
use crate::constants::{
    DEFAULT_NS_NAME, FALLBACK_TTL_SECS, SOA_TTL_CAP_SECS, SYNTHETIC_SOA_EXPIRE_SECS,
    SYNTHETIC_SOA_REFRESH_SECS, SYNTHETIC_SOA_RETRY_SECS,
};
use crate::controller::Controller;
use crate::errors::QueryError;
use crate::projection::{Entry, Zone};
use crate::server::parse::{parse_request, RecordRequest};
use hickory_proto::rr::rdata::{A, AAAA, CNAME, NS, SOA, SRV, TXT};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// The zone scope one synthesis runs in.
#[derive(Clone, Debug)]
pub struct ZoneInfo {
    /// Absolute apex the query name is relative to, lower-cased.
    pub apex: String,
    /// The backing zone object; `None` in the legacy modes.
    pub zone: Option<Arc<Zone>>,
}

impl ZoneInfo {
    /// Whether an entry belongs to this scope. Without a zone object every
    /// entry matches; with one, the entry's zone reference must name it.
    #[must_use]
    pub fn matches(&self, entry: &Entry) -> bool {
        match &self.zone {
            None => true,
            Some(zone) => entry.zone_ref == zone.name && entry.namespace == zone.namespace,
        }
    }
}

/// The synthesised response fragments.
#[derive(Clone, Debug, Default)]
pub struct Synthesis {
    /// Answer-section records.
    pub answers: Vec<Record>,
    /// Additional-section records.
    pub extras: Vec<Record>,
}

/// Everything the synthesiser needs besides the cache.
pub struct SynthContext<'a> {
    /// The controller owning the indexed cache.
    pub ctrl: &'a Controller,
    /// Operating mode; `FilterByZones` looks entries up by absolute name.
    pub mode: Mode,
    /// Configured default TTL (0: unset).
    pub default_ttl: u32,
    /// Observed namespaces for legacy lookups; empty means all.
    pub namespaces: &'a std::collections::BTreeSet<String>,
}

impl SynthContext<'_> {
    /// Effective TTL for an entry within the given zone scope.
    fn ttl(&self, entry: &Entry, zi: &ZoneInfo) -> u32 {
        let default = self.default_ttl(zi);
        entry.effective_ttl(default)
    }

    /// The default TTL for a zone scope, applying the fallback chain.
    fn default_ttl(&self, zi: &ZoneInfo) -> u32 {
        if self.default_ttl > 0 {
            return self.default_ttl;
        }
        if let Some(zone) = &zi.zone {
            if zone.minimum_ttl > 0 {
                return u32::try_from(zone.minimum_ttl).unwrap_or(FALLBACK_TTL_SECS);
            }
        }
        FALLBACK_TTL_SECS
    }
}

/// Synthesise the response fragments for one query.
///
/// `qname` keeps the original case for the outgoing owner names;
/// `qname_lower` drives the lookups.
///
/// # Errors
///
/// Name errors ([`QueryError`]) distinguish NXDOMAIN from NODATA: an empty
/// `Ok` result is NODATA, `Err(NoItems)` is NXDOMAIN.
pub fn synthesize(
    ctx: &SynthContext<'_>,
    zi: &ZoneInfo,
    qname: &str,
    qname_lower: &str,
    qtype: RecordType,
) -> Result<Synthesis, QueryError> {
    let owner = owner_name(qname)?;

    match qtype {
        RecordType::ANY => {
            let mut out = Synthesis::default();
            for t in [
                RecordType::A,
                RecordType::AAAA,
                RecordType::TXT,
                RecordType::CNAME,
                RecordType::SRV,
            ] {
                match synthesize(ctx, zi, qname, qname_lower, t) {
                    Ok(partial) => {
                        out.answers.extend(partial.answers);
                        out.extras.extend(partial.extras);
                    }
                    Err(e) if e.is_name_error() => {}
                    Err(e) => return Err(e),
                }
            }
            if qname_lower == zi.apex {
                let ns = synthesize_ns(ctx, zi, &owner);
                out.answers.extend(ns);
            }
            if out.answers.is_empty() {
                return Err(QueryError::NoItems);
            }
            Ok(out)
        }
        RecordType::A => {
            let request = prepare(ctx, zi, qname_lower, qtype)?;
            let entries = find_entries(ctx, zi, &request)?;
            let mut out = Synthesis::default();
            for entry in entries.iter().filter(|e| e.valid) {
                let ttl = ctx.ttl(entry, zi);
                for ip in &entry.a {
                    out.answers
                        .push(record(owner.clone(), ttl, RData::A(A(*ip))));
                }
            }
            Ok(out)
        }
        RecordType::AAAA => {
            let request = prepare(ctx, zi, qname_lower, qtype)?;
            let entries = find_entries(ctx, zi, &request)?;
            let mut out = Synthesis::default();
            for entry in entries.iter().filter(|e| e.valid) {
                let ttl = ctx.ttl(entry, zi);
                for ip in &entry.aaaa {
                    out.answers
                        .push(record(owner.clone(), ttl, RData::AAAA(AAAA(*ip))));
                }
            }
            Ok(out)
        }
        RecordType::CNAME => {
            let request = prepare(ctx, zi, qname_lower, qtype)?;
            let entries = find_entries(ctx, zi, &request)?;
            let mut out = Synthesis::default();
            for entry in entries.iter().filter(|e| e.valid && !e.cname.is_empty()) {
                let ttl = ctx.ttl(entry, zi);
                let target = host_name(&entry.cname)?;
                out.answers
                    .push(record(owner.clone(), ttl, RData::CNAME(CNAME(target))));
            }
            Ok(out)
        }
        RecordType::TXT => {
            let request = prepare(ctx, zi, qname_lower, qtype)?;
            let entries = find_entries(ctx, zi, &request)?;
            let mut out = Synthesis::default();
            for entry in entries.iter().filter(|e| e.valid) {
                let ttl = ctx.ttl(entry, zi);
                for text in &entry.txt {
                    out.answers.push(record(
                        owner.clone(),
                        ttl,
                        RData::TXT(TXT::new(vec![text.clone()])),
                    ));
                }
            }
            Ok(out)
        }
        RecordType::SRV => {
            let request = prepare(ctx, zi, qname_lower, qtype)?;
            synthesize_srv(ctx, zi, &owner, &request)
        }
        RecordType::NS => {
            // the dispatcher only sends apex NS queries here
            let answers = synthesize_ns(ctx, zi, &owner);
            if answers.is_empty() {
                return Err(QueryError::NoItems);
            }
            Ok(Synthesis {
                answers,
                extras: Vec::new(),
            })
        }
        RecordType::SOA => {
            let answers = vec![synthesize_soa(ctx, zi)];
            Ok(Synthesis {
                answers,
                extras: Vec::new(),
            })
        }
        // A phantom A lookup distinguishes NODATA from NXDOMAIN for types
        // the declarative resources cannot produce (MX, PTR, ...).
        _ => {
            let request = prepare(ctx, zi, qname_lower, RecordType::A)?;
            find_entries(ctx, zi, &request)?;
            Ok(Synthesis::default())
        }
    }
}

/// Build the apex NS record set: the zone's published name servers, or a
/// synthetic `ns.<apex>` when none are defined.
pub fn synthesize_ns(ctx: &SynthContext<'_>, zi: &ZoneInfo, owner: &Name) -> Vec<Record> {
    let ttl = ctx.default_ttl(zi);
    let servers: Vec<String> = zi
        .zone
        .as_ref()
        .map(|z| z.name_servers.clone())
        .unwrap_or_default();
    if servers.is_empty() {
        let fallback = format!("ns.{}", zi.apex);
        return match host_name(&fallback) {
            Ok(target) => vec![record(owner.clone(), ttl, RData::NS(NS(target)))],
            Err(_) => Vec::new(),
        };
    }
    servers
        .iter()
        .filter_map(|s| host_name(s).ok())
        .map(|target| record(owner.clone(), ttl, RData::NS(NS(target))))
        .collect()
}

/// Build the SOA record for the zone scope.
///
/// TTL is `min(minimumTTL, 300)`; the serial is the controller's modified
/// timestamp; the mailbox is the rewritten admin e-mail.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn synthesize_soa(ctx: &SynthContext<'_>, zi: &ZoneInfo) -> Record {
    let serial = ctx.ctrl.modified() as u32;
    let apex_name = host_name(&zi.apex).unwrap_or_else(|_| Name::root());

    match &zi.zone {
        Some(zone) => {
            let ttl = u32::try_from(zone.minimum_ttl.max(0))
                .unwrap_or(SOA_TTL_CAP_SECS)
                .min(SOA_TTL_CAP_SECS);
            let primary = zone
                .name_servers
                .first()
                .and_then(|s| host_name(s).ok())
                .unwrap_or_else(|| {
                    host_name(&format!("{DEFAULT_NS_NAME}{}", zi.apex))
                        .unwrap_or_else(|_| Name::root())
                });
            let mbox = if zone.email.is_empty() {
                host_name(&format!("hostmaster.{}", zi.apex)).unwrap_or_else(|_| Name::root())
            } else {
                host_name(&zone.email).unwrap_or_else(|_| Name::root())
            };
            record(
                apex_name,
                ttl,
                RData::SOA(SOA::new(
                    primary,
                    mbox,
                    serial,
                    zone.refresh,
                    zone.retry,
                    zone.expire,
                    ttl,
                )),
            )
        }
        None => {
            let ttl = ctx.default_ttl(zi).min(SOA_TTL_CAP_SECS);
            let primary = host_name(&format!("{DEFAULT_NS_NAME}{}", zi.apex))
                .unwrap_or_else(|_| Name::root());
            let mbox =
                host_name(&format!("hostmaster.{}", zi.apex)).unwrap_or_else(|_| Name::root());
            record(
                apex_name,
                ttl,
                RData::SOA(SOA::new(
                    primary,
                    mbox,
                    serial,
                    SYNTHETIC_SOA_REFRESH_SECS,
                    SYNTHETIC_SOA_RETRY_SECS,
                    SYNTHETIC_SOA_EXPIRE_SECS,
                    ttl,
                )),
            )
        }
    }
}

fn synthesize_srv(
    ctx: &SynthContext<'_>,
    zi: &ZoneInfo,
    owner: &Name,
    request: &RecordRequest,
) -> Result<Synthesis, QueryError> {
    let entries = find_entries(ctx, zi, request)?;
    let mut out = Synthesis::default();
    let mut records: Vec<(u16, u16, u16, String, u32)> = Vec::new();

    if request.is_service_request() {
        for entry in entries.iter().filter(|e| e.valid) {
            if entry.service_name != request.service {
                continue;
            }
            let ttl = ctx.ttl(entry, zi);
            for srv in entry.srv_records(Some(request.protocol.as_str())) {
                records.push((srv.priority, srv.weight, srv.port, srv.host.clone(), ttl));
            }
        }
    } else {
        // plain SRV query: all service records of the matching entries, as a
        // sorted merger
        for entry in entries.iter().filter(|e| e.valid) {
            let ttl = ctx.ttl(entry, zi);
            for srv in entry.srv_records(None) {
                records.push((srv.priority, srv.weight, srv.port, srv.host.clone(), ttl));
            }
        }
        records.sort();
    }

    for (priority, weight, port, host, ttl) in records {
        let target = host_name(&host)?;
        out.answers.push(record(
            owner.clone(),
            ttl,
            RData::SRV(SRV::new(priority, weight, port, target)),
        ));
        out.extras.extend(target_addresses(ctx, zi, &host));
    }
    Ok(out)
}

/// Address records for an SRV target, resolved against the entry cache for
/// the additional section.
fn target_addresses(ctx: &SynthContext<'_>, zi: &ZoneInfo, host: &str) -> Vec<Record> {
    let Ok(owner) = host_name(host) else {
        return Vec::new();
    };
    let mut extras = Vec::new();
    for entry in ctx.ctrl.entry_dns_index_exact(host) {
        if !entry.valid || !zi.matches(&entry) {
            continue;
        }
        let ttl = ctx.ttl(&entry, zi);
        for ip in &entry.a {
            extras.push(record(owner.clone(), ttl, RData::A(A(*ip))));
        }
        for ip in &entry.aaaa {
            extras.push(record(owner.clone(), ttl, RData::AAAA(AAAA(*ip))));
        }
    }
    extras
}

/// Parse the request and reject service/qtype mismatches early.
fn prepare(
    ctx: &SynthContext<'_>,
    zi: &ZoneInfo,
    qname_lower: &str,
    qtype: RecordType,
) -> Result<RecordRequest, QueryError> {
    let request = parse_request(qname_lower, &zi.apex)?;
    if request.is_service_request() != (qtype == RecordType::SRV) {
        return Err(QueryError::NoItems);
    }
    if ctx.mode == Mode::Subdomains && !ctx.namespaces.is_empty() {
        // legacy names embed the namespace as the label right above the apex
        if let Some(namespace) = request.domain.rsplit('.').next() {
            if !namespace.is_empty() && !ctx.namespaces.contains(namespace) {
                return Err(QueryError::NsNotExposed);
            }
        }
    }
    Ok(request)
}

/// Look up the entries for a parsed request within the zone scope.
///
/// The exact lookup key depends on the mode: absolute names in
/// `FilterByZones`, names relative to the apex otherwise. An empty result
/// maps to [`QueryError::NoItems`] (NXDOMAIN).
fn find_entries(
    ctx: &SynthContext<'_>,
    zi: &ZoneInfo,
    request: &RecordRequest,
) -> Result<Vec<Arc<Entry>>, QueryError> {
    let (key, apex_query) = if ctx.mode == Mode::FilterByZones {
        if request.domain.is_empty() {
            (zi.apex.clone(), true)
        } else {
            (format!("{}.{}", request.domain, zi.apex), false)
        }
    } else if request.domain.is_empty() {
        (".".to_string(), true)
    } else {
        (format!("{}.", request.domain), false)
    };

    // wildcards never match the apex itself
    let looked_up = if apex_query {
        ctx.ctrl.entry_dns_index_exact(&key)
    } else {
        ctx.ctrl.entry_dns_index(&key)
    };

    let entries: Vec<Arc<Entry>> = looked_up
        .into_iter()
        .filter(|e| zi.matches(e))
        .collect();
    debug!(key = %key, hits = entries.len(), apex = %zi.apex, "entry lookup");
    if entries.is_empty() {
        return Err(QueryError::NoItems);
    }
    Ok(entries)
}

fn record(owner: Name, ttl: u32, rdata: RData) -> Record {
    let mut r = Record::from_rdata(owner, ttl, rdata);
    r.set_dns_class(DNSClass::IN);
    r
}

fn owner_name(qname: &str) -> Result<Name, QueryError> {
    Name::from_str(qname).map_err(|_| QueryError::InvalidRequest)
}

fn host_name(host: &str) -> Result<Name, QueryError> {
    Name::from_str(host).map_err(|_| QueryError::InvalidRequest)
}

#[cfg(test)]
#[path = "synth_tests.rs"]
mod synth_tests;
