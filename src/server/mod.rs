// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The query dispatcher and its wire front-end.
//!
//! [`Dispatcher::handle_query`] is the top-level handler: it matches the
//! query name against the served apex list, resolves the governing zone,
//! invokes the zone walker, synthesises records and assembles the response
//! fragments with the right RCODE. The wire front-end
//! ([`frontend::DnsFrontend`]) parses and frames messages around it.
//!
//! Responses are always authoritative. Name errors turn into NXDOMAIN with
//! the SOA in the authority section - unless the fall-through predicate
//! matches (the query is handed to the next handler) or the cache has not
//! completed its initial sync yet (SERVFAIL, so negative answers are not
//! leaked prematurely).

pub mod frontend;
pub mod parse;
pub mod synth;
pub mod walker;

use crate::cache::ObjectKey;
use crate::config::{Config, Mode};
use crate::controller::Controller;
use crate::metrics;
use crate::projection::{is_subdomain, normalize_name};
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{Name, Record, RecordType};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use synth::{synthesize, synthesize_soa, SynthContext, Synthesis, ZoneInfo};
use tracing::debug;
use walker::{find_matching_zone, find_zone, ZoneWalk};

/// A fully assembled DNS answer.
#[derive(Clone, Debug)]
pub struct QueryAnswer {
    /// The response code.
    pub rcode: ResponseCode,
    /// Answer-section records.
    pub answers: Vec<Record>,
    /// Additional-section records.
    pub extras: Vec<Record>,
    /// Authority-section records (delegation NS, or the SOA on empty
    /// answers).
    pub authorities: Vec<Record>,
    /// Always true for served zones.
    pub authoritative: bool,
}

impl QueryAnswer {
    fn empty(rcode: ResponseCode) -> Self {
        QueryAnswer {
            rcode,
            answers: Vec::new(),
            extras: Vec::new(),
            authorities: Vec::new(),
            authoritative: true,
        }
    }
}

/// The outcome of dispatching one question.
#[derive(Clone, Debug)]
pub enum QueryOutcome {
    /// Answer with this response.
    Answer(QueryAnswer),
    /// The query is outside the served zones, or fall-through matched:
    /// hand it to the next handler.
    Fallthrough,
}

/// Fall-through predicate: hand NXDOMAIN to the next handler for matching
/// names.
#[derive(Clone, Debug, Default)]
pub struct Fallthrough {
    enabled: bool,
    zones: Vec<String>,
}

impl Fallthrough {
    /// Build from the configured zone set; `None` disables fall-through.
    #[must_use]
    pub fn new(zones: Option<&Vec<String>>) -> Self {
        match zones {
            None => Fallthrough::default(),
            Some(zones) => Fallthrough {
                enabled: true,
                zones: zones.iter().map(|z| normalize_name(z)).collect(),
            },
        }
    }

    /// Whether the given (lower-cased) name falls through.
    #[must_use]
    pub fn matches(&self, qname: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if self.zones.is_empty() {
            return true;
        }
        self.zones.iter().any(|z| is_subdomain(z, qname))
    }
}

/// The top-level query handler.
pub struct Dispatcher {
    ctrl: Arc<Controller>,
    zones: Vec<String>,
    mode: Mode,
    zone_ref: Option<ObjectKey>,
    namespaces: BTreeSet<String>,
    transitive: bool,
    ttl: u32,
    fall: Fallthrough,
}

impl Dispatcher {
    /// Build a dispatcher over the controller from the validated
    /// configuration.
    #[must_use]
    pub fn new(ctrl: Arc<Controller>, config: &Config) -> Self {
        Dispatcher {
            zones: config.zones.clone(),
            mode: config.mode,
            zone_ref: config
                .zone_ref()
                .map(|(namespace, name)| ObjectKey::new(namespace, name)),
            namespaces: config.namespaces.clone(),
            transitive: config.transitive,
            ttl: config.ttl,
            fall: Fallthrough::new(config.fall_through.as_ref()),
            ctrl,
        }
    }

    /// Handle one parsed question.
    ///
    /// `qname` keeps the original query case; comparisons run on the
    /// lower-cased copy and the original case is preserved in the outgoing
    /// owner names.
    #[must_use]
    pub fn handle_query(&self, qname: &str, qtype: RecordType) -> QueryOutcome {
        let started = Instant::now();
        let outcome = self.dispatch(qname, qtype);
        let rcode = match &outcome {
            QueryOutcome::Answer(answer) => format!("{:?}", answer.rcode),
            QueryOutcome::Fallthrough => "Fallthrough".to_string(),
        };
        metrics::observe_query(&qtype.to_string(), &rcode, started.elapsed());
        outcome
    }

    fn dispatch(&self, qname: &str, qtype: RecordType) -> QueryOutcome {
        let qname = ensure_fqdn(qname);
        let qname_lower = qname.to_ascii_lowercase();

        let Some(apex) = self.match_apex(&qname_lower) else {
            return QueryOutcome::Fallthrough;
        };
        debug!(qname = %qname, qtype = %qtype, apex = %apex, "serving query");

        let base_zone = self.root_zone_object(&apex);

        // zone walk, only meaningful with a backing zone object
        let walk = base_zone.as_ref().map(|zone| {
            find_zone(
                &self.ctrl,
                Arc::clone(zone),
                &apex,
                &qname_lower,
                self.transitive,
                qtype,
            )
        });

        let mut authorities: Vec<Record> = Vec::new();
        let zi: ZoneInfo;
        let ctx = SynthContext {
            ctrl: &self.ctrl,
            mode: self.mode,
            default_ttl: self.ttl,
            namespaces: &self.namespaces,
        };

        match walk {
            Some(ZoneWalk::Delegated { entries, apex: point }) => {
                // authority only; answers stay empty unless the NS records
                // migrate below
                let owner = match Name::from_str(&qname) {
                    Ok(name) => name,
                    Err(_) => return self.name_error(&qname_lower, &apex, base_zone.as_ref()),
                };
                let default = self.ttl;
                for entry in &entries {
                    let ttl = entry.effective_ttl(if default > 0 {
                        default
                    } else {
                        crate::constants::FALLBACK_TTL_SECS
                    });
                    for server in &entry.ns {
                        if let Ok(target) = Name::from_str(server) {
                            authorities.push(ns_record(owner.clone(), ttl, target));
                        }
                    }
                }
                if authorities.is_empty() {
                    if let Ok(target) = Name::from_str(&format!("ns.{qname_lower}")) {
                        authorities.push(ns_record(owner, self.effective_ttl(), target));
                    }
                }
                return QueryOutcome::Answer(self.assemble_delegation(
                    authorities,
                    qtype,
                    &qname_lower,
                    &point,
                ));
            }
            Some(ZoneWalk::Nested { zone, apex: point }) => {
                let owner = match Name::from_str(&qname) {
                    Ok(name) => name,
                    Err(_) => return self.name_error(&qname_lower, &apex, base_zone.as_ref()),
                };
                let ttl = u32::try_from(zone.minimum_ttl.max(0)).unwrap_or(0);
                let ttl = if ttl > 0 { ttl } else { self.effective_ttl() };
                for server in &zone.name_servers {
                    if let Ok(target) = Name::from_str(server) {
                        authorities.push(ns_record(owner.clone(), ttl, target));
                    }
                }
                if authorities.is_empty() {
                    if let Ok(target) = Name::from_str(&format!("ns.{qname_lower}")) {
                        authorities.push(ns_record(owner, ttl, target));
                    }
                }
                return QueryOutcome::Answer(self.assemble_delegation(
                    authorities,
                    qtype,
                    &qname_lower,
                    &point,
                ));
            }
            Some(ZoneWalk::Authoritative { zone, apex: chosen }) => {
                zi = ZoneInfo {
                    apex: chosen,
                    zone: Some(zone),
                };
            }
            None => {
                zi = ZoneInfo {
                    apex: apex.clone(),
                    zone: None,
                };
            }
        }

        // NS below the apex goes through the phantom path; SOA resolves the
        // deepest matching zone
        let effective_qtype = if qtype == RecordType::NS && qname_lower != zi.apex {
            RecordType::NULL // phantom marker, handled by synthesize's default arm
        } else {
            qtype
        };

        let synthesis = if effective_qtype == RecordType::SOA {
            let soa_zi = self.soa_scope(&zi, base_zone.as_ref(), &apex, &qname_lower);
            Ok(Synthesis {
                answers: vec![synthesize_soa(&ctx, &soa_zi)],
                extras: Vec::new(),
            })
        } else {
            synthesize(&ctx, &zi, &qname, &qname_lower, effective_qtype)
        };

        match synthesis {
            Ok(result) => {
                let mut answer = QueryAnswer::empty(ResponseCode::NoError);
                answer.answers = result.answers;
                answer.extras = result.extras;
                if answer.answers.is_empty() {
                    answer.authorities = vec![synthesize_soa(&ctx, &self.authority_scope(&zi))];
                }
                QueryOutcome::Answer(answer)
            }
            Err(e) if e.is_name_error() => self.name_error(&qname_lower, &zi.apex, zi.zone.as_ref()),
            Err(_) => QueryOutcome::Answer(QueryAnswer::empty(ResponseCode::ServFail)),
        }
    }

    /// Assemble a delegation response: authority-only, except that a direct
    /// NS query for the delegation point moves the NS set into the answer.
    fn assemble_delegation(
        &self,
        authorities: Vec<Record>,
        qtype: RecordType,
        qname_lower: &str,
        point: &str,
    ) -> QueryAnswer {
        let mut answer = QueryAnswer::empty(ResponseCode::NoError);
        if qtype == RecordType::NS && qname_lower == point {
            answer.answers = authorities;
        } else {
            answer.authorities = authorities;
        }
        answer
    }

    /// NXDOMAIN / fall-through / SERVFAIL decision for name errors.
    fn name_error(
        &self,
        qname_lower: &str,
        apex: &str,
        zone: Option<&Arc<crate::projection::Zone>>,
    ) -> QueryOutcome {
        if self.fall.matches(qname_lower) {
            return QueryOutcome::Fallthrough;
        }
        let ctx = SynthContext {
            ctrl: &self.ctrl,
            mode: self.mode,
            default_ttl: self.ttl,
            namespaces: &self.namespaces,
        };
        let zi = ZoneInfo {
            apex: apex.to_string(),
            zone: zone.cloned(),
        };
        let rcode = if self.ctrl.has_synced() {
            ResponseCode::NXDomain
        } else {
            ResponseCode::ServFail
        };
        let mut answer = QueryAnswer::empty(rcode);
        answer.authorities = vec![synthesize_soa(&ctx, &zi)];
        QueryOutcome::Answer(answer)
    }

    /// The longest served apex the query name lies under.
    fn match_apex(&self, qname_lower: &str) -> Option<String> {
        self.zones
            .iter()
            .filter(|z| is_subdomain(z, qname_lower))
            .max_by_key(|z| z.len())
            .cloned()
    }

    /// The zone object governing the given apex: the configured zone object
    /// when one is set, else whatever zone owns the matching apex domain.
    fn root_zone_object(&self, apex: &str) -> Option<Arc<crate::projection::Zone>> {
        if let Some(zone_ref) = &self.zone_ref {
            return self.ctrl.get_zone(zone_ref);
        }
        self.ctrl.zone_domain_index(apex).into_iter().next()
    }

    /// The SOA scope for an explicit SOA query: the deepest zone covering
    /// the qname, when a zone object exists.
    fn soa_scope(
        &self,
        zi: &ZoneInfo,
        base: Option<&Arc<crate::projection::Zone>>,
        apex: &str,
        qname_lower: &str,
    ) -> ZoneInfo {
        if let Some(base) = base {
            if let Some(deepest) = find_matching_zone(&self.ctrl, base, apex, qname_lower) {
                // the deepest zone's apex: for the base it is the served
                // apex, for a nested zone the walker already chose it
                if deepest.name == base.name && deepest.namespace == base.namespace {
                    return ZoneInfo {
                        apex: apex.to_string(),
                        zone: Some(Arc::clone(base)),
                    };
                }
                return ZoneInfo {
                    apex: zi.apex.clone(),
                    zone: Some(deepest),
                };
            }
        }
        zi.clone()
    }

    /// The scope for the negative-answer SOA: the chosen zone when one
    /// exists, else the bare apex.
    fn authority_scope(&self, zi: &ZoneInfo) -> ZoneInfo {
        zi.clone()
    }

    fn effective_ttl(&self) -> u32 {
        if self.ttl > 0 {
            self.ttl
        } else {
            crate::constants::FALLBACK_TTL_SECS
        }
    }
}

fn ns_record(owner: Name, ttl: u32, target: Name) -> Record {
    use hickory_proto::rr::rdata::NS;
    use hickory_proto::rr::{DNSClass, RData};
    let mut r = Record::from_rdata(owner, ttl, RData::NS(NS(target)));
    r.set_dns_class(DNSClass::IN);
    r
}

fn ensure_fqdn(qname: &str) -> String {
    if qname.ends_with('.') {
        qname.to_string()
    } else {
        format!("{qname}.")
    }
}
