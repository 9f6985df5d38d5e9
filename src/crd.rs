// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for declarative DNS content.
//!
//! This module defines the two Kubernetes Custom Resource Definitions that
//! drive the Zondy server.
//!
//! # Resource Types
//!
//! - [`HostedZone`] - A DNS authority unit: apex domains, SOA parameters and
//!   an optional parent reference for nested zones.
//! - [`CoreDNSEntry`] - A bundle of DNS records (A, AAAA, CNAME, NS, TXT, SRV)
//!   attached to a zone by name, or anchored under the served apex directly.
//!
//! # Example: Creating a Hosted Zone
//!
//! ```yaml
//! apiVersion: zondy.firestoned.io/v1alpha1
//! kind: HostedZone
//! metadata:
//!   name: example-org
//!   namespace: dns-system
//! spec:
//!   domainNames: ["example.org"]
//!   email: hostmaster@example.org
//!   refresh: 3600
//!   retry: 600
//!   expire: 604800
//!   minimumTTL: 60
//! ```
//!
//! # Example: Attaching Records
//!
//! ```yaml
//! apiVersion: zondy.firestoned.io/v1alpha1
//! kind: CoreDNSEntry
//! metadata:
//!   name: web
//!   namespace: dns-system
//! spec:
//!   zoneRef: example-org
//!   dnsNames: ["www"]
//!   A: ["192.0.2.10"]
//! ```
//!
//! Nested zones reference their parent with `spec.parentRef`; their
//! `domainNames` are relative to the parent apex (`"child"` under
//! `example.org` serves `child.example.org`).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and higher-level controllers. Zondy itself reconciles
/// a single condition of type `DNSServer`; any other conditions are owned by
/// external operators and left untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, e.g. `DNSServer`, `Validation`, `Runtime`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Implementation details observed by the zone runtime.
///
/// Mirrors `spec.class` and `spec.runtime` once a higher-level operator has
/// acted on them. Opaque to the serving path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Observed {
    /// Class already used for the implementation.
    #[serde(default)]
    pub class: String,

    /// Runtime already used for the implementation.
    #[serde(default)]
    pub runtime: String,
}

/// `HostedZone` status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostedZoneStatus {
    /// Conditions describing specific aspects of the zone. Zondy reconciles
    /// the `DNSServer` condition; other types belong to external operators.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// State of the hosted zone object (`Ok`, `Invalid`, or an
    /// operator-owned state such as `Ready`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,

    /// Error message in case of an invalid zone.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Name servers published for this zone. Used for NS answers at the apex
    /// and for delegation from the parent zone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_servers: Vec<String>,

    /// Implementation details observed by the zone runtime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<Observed>,
}

/// `HostedZone` defines a DNS authority unit served by Zondy.
///
/// A `HostedZone` carries one or more apex domain names and the SOA timing
/// parameters for the zone. A zone may nest under another zone in the same
/// namespace via `parentRef`; nested zone `domainNames` are relative to the
/// parent apex. Nested zone content is visible to queries for the parent
/// apex only when the server runs with `transitive: true`; otherwise the
/// nested zone appears as a delegation.
///
/// # Example
///
/// ```yaml
/// apiVersion: zondy.firestoned.io/v1alpha1
/// kind: HostedZone
/// metadata:
///   name: child
///   namespace: dns-system
/// spec:
///   domainNames: ["child"]
///   parentRef: example-org
///   email: hostmaster@example.org
///   refresh: 3600
///   retry: 600
///   expire: 604800
///   minimumTTL: 300
/// ```
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "zondy.firestoned.io",
    version = "v1alpha1",
    kind = "HostedZone",
    namespaced,
    shortname = "hz",
    shortname = "hzs",
    doc = "HostedZone defines a DNS authority unit: apex domains, SOA parameters and an optional parent reference for nested zones.",
    printcolumn = r#"{"name":"Domains","type":"string","jsonPath":".spec.domainNames"}"#,
    printcolumn = r#"{"name":"Parent","type":"string","jsonPath":".spec.parentRef"}"#,
    printcolumn = r#"{"name":"NameServers","type":"string","jsonPath":".status.nameServers"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.message","priority":1}"#
)]
#[kube(status = "HostedZoneStatus")]
#[serde(rename_all = "camelCase")]
pub struct HostedZoneSpec {
    /// Domain names for the hosted zone. Formally, every name is a DNS zone
    /// of its own. Root zones carry absolute names (`example.org`); nested
    /// zones carry names relative to the parent apex (`child`).
    pub domain_names: Vec<String>,

    /// E-mail address of the zone administrators. Rewritten into the SOA
    /// mailbox form (dots in the local part escaped, `@` replaced by `.`).
    pub email: String,

    /// Refresh interval in seconds. How often secondaries check for updates.
    #[schemars(range(min = 1, max = 2_147_483_647))]
    pub refresh: i32,

    /// Retry interval in seconds after a failed refresh.
    #[schemars(range(min = 1, max = 2_147_483_647))]
    pub retry: i32,

    /// Expire time in seconds after which secondaries stop serving the zone.
    #[schemars(range(min = 1, max = 2_147_483_647))]
    pub expire: i32,

    /// Minimum TTL in seconds; also caps the SOA record TTL (at most 300).
    #[serde(rename = "minimumTTL")]
    #[schemars(range(min = 0, max = 2_147_483_647))]
    pub minimum_ttl: i32,

    /// Name of the parent `HostedZone` in the same namespace. Empty for root
    /// zones.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_ref: String,

    /// Class separating hosted-zone realms managed by different controller
    /// sets. Should only be set on root zones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    /// Logical runtime used for deploying the primary DNS server. Should
    /// only be set on root zones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
}

/// A single SRV service record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SRVRecord {
    /// Protocol of the service record: `TCP` or `UDP`.
    pub protocol: String,

    /// Priority of the service record.
    #[serde(default)]
    #[schemars(range(min = 0, max = 65535))]
    pub priority: i32,

    /// Weight of the service record.
    #[serde(default)]
    #[schemars(range(min = 0, max = 65535))]
    pub weight: i32,

    /// Port of the service record. Must be positive.
    #[schemars(range(min = 1, max = 65535))]
    pub port: i32,

    /// Target host of the service record. Absolute when ending with a dot,
    /// otherwise normalised like a CNAME target.
    pub host: String,
}

/// The SRV records published for one named service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// The service name, without the leading underscore (`http`, `sip`).
    #[serde(default)]
    pub service: String,

    /// The service records.
    #[serde(default)]
    pub records: Vec<SRVRecord>,
}

/// `CoreDNSEntry` status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CoreDNSEntryStatus {
    /// Conditions describing specific aspects of the entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// State of the entry (`Ok` or `Invalid`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,

    /// Error message in case of an invalid entry.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Name of the root zone ultimately serving this entry.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub root_zone: String,

    /// Effective fully-qualified DNS names of this entry, expanded through
    /// every ancestor zone domain.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
}

/// `CoreDNSEntry` bundles DNS records for one or more names.
///
/// An entry either references a `HostedZone` in the same namespace (its
/// `dnsNames` stay relative to the zone apex, `"."` addressing the apex
/// itself), or - in the legacy subdomain mode - carries no reference and is
/// anchored under `<namespace>.<served-apex>`.
///
/// At least one DNS name and at least one record (A, AAAA, CNAME, NS, TXT or
/// SRV) are required; entries failing validation are kept in the cache as
/// invalid placeholders and reported through status.
///
/// # Example
///
/// ```yaml
/// apiVersion: zondy.firestoned.io/v1alpha1
/// kind: CoreDNSEntry
/// metadata:
///   name: sip-service
///   namespace: dns-system
/// spec:
///   zoneRef: example-org
///   dnsNames: ["."]
///   SRV:
///     service: sip
///     records:
///       - protocol: TCP
///         priority: 10
///         weight: 5
///         port: 5060
///         host: sip.example.org.
/// ```
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "zondy.firestoned.io",
    version = "v1alpha1",
    kind = "CoreDNSEntry",
    namespaced,
    shortname = "cdnse",
    plural = "corednsentries",
    doc = "CoreDNSEntry bundles DNS records (A, AAAA, CNAME, NS, TXT, SRV) for one or more names, attached to a HostedZone or anchored under the served apex.",
    printcolumn = r#"{"name":"DNSNames","type":"string","jsonPath":".spec.dnsNames"}"#,
    printcolumn = r#"{"name":"ZoneRef","type":"string","jsonPath":".spec.zoneRef"}"#,
    printcolumn = r#"{"name":"A","type":"string","jsonPath":".spec.A"}"#,
    printcolumn = r#"{"name":"CNAME","type":"string","jsonPath":".spec.CNAME"}"#,
    printcolumn = r#"{"name":"SRV","type":"string","jsonPath":".spec.SRV.service"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.message","priority":1}"#
)]
#[kube(status = "CoreDNSEntryStatus")]
#[serde(rename_all = "camelCase")]
pub struct CoreDNSEntrySpec {
    /// Name of the `HostedZone` in the same namespace this entry belongs to.
    /// Empty anchors the entry at the served apex directly (legacy mode).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zone_ref: String,

    /// DNS names of the records. Relative unless terminated by a dot; `"."`
    /// addresses the owning zone's apex. Wildcard names (`*.svc`) match one
    /// label.
    pub dns_names: Vec<String>,

    /// IPv4 addresses.
    #[serde(default, rename = "A", skip_serializing_if = "Vec::is_empty")]
    pub a: Vec<String>,

    /// IPv6 addresses.
    #[serde(default, rename = "AAAA", skip_serializing_if = "Vec::is_empty")]
    pub aaaa: Vec<String>,

    /// Text records; each string becomes one TXT record.
    #[serde(default, rename = "TXT", skip_serializing_if = "Vec::is_empty")]
    pub txt: Vec<String>,

    /// SRV records for one named service.
    #[serde(default, rename = "SRV", skip_serializing_if = "Option::is_none")]
    pub srv: Option<ServiceSpec>,

    /// Canonical name target. A name carrying a CNAME defines a delegated
    /// alias; the DNS layer chases targets above the apex.
    #[serde(default, rename = "CNAME", skip_serializing_if = "String::is_empty")]
    pub cname: String,

    /// Name-server host names. A non-empty list at a non-apex name makes
    /// that name a delegation point.
    #[serde(default, rename = "NS", skip_serializing_if = "Vec::is_empty")]
    pub ns: Vec<String>,

    /// Record TTL in seconds; overrides the server default when non-zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0, max = 2_147_483_647))]
    pub ttl: Option<u32>,
}
