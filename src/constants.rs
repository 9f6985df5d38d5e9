// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Zondy server.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all Zondy CRDs
pub const API_GROUP: &str = "zondy.firestoned.io";

/// API version for all Zondy CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Kind name for the `HostedZone` resource
pub const KIND_HOSTED_ZONE: &str = "HostedZone";

/// Kind name for the `CoreDNSEntry` resource
pub const KIND_CORE_DNS_ENTRY: &str = "CoreDNSEntry";

// ============================================================================
// Operating Modes
// ============================================================================

/// Entries are filtered against the served zones at index-build time.
pub const MODE_FILTER: &str = "FilterByZones";

/// Legacy mode: entries are anchored under `<namespace>.<served-apex>`.
pub const MODE_SUBDOMAINS: &str = "Subdomains";

/// A single `HostedZone` object in a single namespace governs the content.
pub const MODE_PRIMARY: &str = "Primary";

// ============================================================================
// Cache Index Names
// ============================================================================

/// Entry index keyed by normalised DNS name
pub const ENTRY_DNS_INDEX: &str = "dns";

/// Entry index keyed by address literal or CNAME target
pub const ENTRY_IP_INDEX: &str = "ip";

/// Entry index keyed by `namespace/zoneName`
pub const ENTRY_ZONE_INDEX: &str = "zoneref";

/// Zone index keyed by normalised domain name
pub const ZONE_DOMAIN_INDEX: &str = "zone";

/// Zone index keyed by `namespace/parentName`
pub const ZONE_PARENT_INDEX: &str = "parent";

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// Default TTL applied to answers when neither the entry nor the
/// configuration provides one
pub const FALLBACK_TTL_SECS: u32 = 300;

/// Default TTL from the configuration when the config file leaves it unset
pub const DEFAULT_CONFIG_TTL_SECS: u32 = 10;

/// Upper bound for the configurable default TTL
pub const MAX_CONFIG_TTL_SECS: u32 = 3600;

/// Cap applied to a zone's minimum TTL when synthesising SOA records
pub const SOA_TTL_CAP_SECS: u32 = 300;

/// SOA refresh used when no zone object backs the served apex
pub const SYNTHETIC_SOA_REFRESH_SECS: i32 = 7200;

/// SOA retry used when no zone object backs the served apex
pub const SYNTHETIC_SOA_RETRY_SECS: i32 = 1800;

/// SOA expire used when no zone object backs the served apex
pub const SYNTHETIC_SOA_EXPIRE_SECS: i32 = 86400;

/// Name prefixed to the apex for the synthetic primary name server
pub const DEFAULT_NS_NAME: &str = "ns.dns.";

/// Maximum plain-UDP response size before the truncation flag is set
pub const MAX_UDP_RESPONSE_BYTES: usize = 512;

/// Default DNS listen address
pub const DEFAULT_DNS_LISTEN_ADDR: &str = "0.0.0.0:1053";

// ============================================================================
// Controller Constants
// ============================================================================

/// Number of reconcile workers draining the shared work queue
pub const WORKER_NO: usize = 1;

/// How long `wait_for_sync` waits for the initial list to complete
pub const SYNC_WAIT_TIMEOUT_MILLIS: u64 = 5000;

/// Poll interval used while waiting for the initial sync
pub const SYNC_POLL_INTERVAL_MILLIS: u64 = 100;

/// Delay before a failed list/watch cycle is retried
pub const RELIST_BACKOFF_MILLIS: u64 = 1000;

// ============================================================================
// Work Queue Rate Limiting
// ============================================================================

/// Base delay for the per-key exponential backoff (100ms)
pub const QUEUE_BASE_DELAY_MILLIS: u64 = 100;

/// Cap for the per-key exponential backoff (30 seconds)
pub const QUEUE_MAX_DELAY_MILLIS: u64 = 30_000;

/// Randomization factor applied to requeue delays (±10%)
pub const QUEUE_JITTER_FACTOR: f64 = 0.1;

// ============================================================================
// Status Conditions
// ============================================================================

/// Condition type reconciled by this server in aggregated status mode
pub const SERVER_CONDITION_TYPE: &str = "DNSServer";

/// Condition reason when a zone or entry is accepted and served
pub const REASON_SERVER_ACTIVE: &str = "HostedZoneActive";

/// Condition reason when validation rejected the resource
pub const REASON_VALIDATION_FAILED: &str = "ValidationFailed";

/// Plain-mode state for valid resources
pub const STATE_OK: &str = "Ok";

/// Plain-mode state for rejected resources
pub const STATE_INVALID: &str = "Invalid";

/// State written by higher-level zone operators once a zone is deployed
pub const STATE_READY: &str = "Ready";

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default bind address for the Prometheus metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0:9153";

/// Path for the Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;
