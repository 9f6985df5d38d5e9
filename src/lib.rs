// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Zondy - CRD-driven authoritative DNS for Kubernetes
//!
//! Zondy is an authoritative DNS server whose zone content is declared through
//! two Custom Resource Definitions: [`crd::HostedZone`] (a DNS zone, optionally
//! nested under a parent zone) and [`crd::CoreDNSEntry`] (a bundle of records
//! attached to a zone). A controller loop watches both kinds, validates them,
//! projects them into an in-memory indexed cache and writes status back; the
//! DNS front-end answers queries for the configured apex domains straight from
//! that cache, including SOA/NS synthesis and delegation for nested zones.
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types for zones and entries
//! - [`projection`] - Validation and normalisation of raw resources
//! - [`cache`] - The multi-index read model shared by controller and server
//! - [`controller`] - Informers, work queue, reconcilers and status write-back
//! - [`server`] - Zone walker, record synthesiser, query dispatcher, wire front-end
//! - [`config`] - Flat startup configuration
//!
//! ## Example
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
//! ## Operating modes
//!
//! - **FilterByZones** - entries carry absolute names and are filtered against
//!   the served zones at index-build time.
//! - **Subdomains** - legacy mode: entries without a zone reference are
//!   anchored under `<namespace>.<served-apex>`.
//! - **Primary** - one `HostedZone` object in one namespace governs the served
//!   content; nested zones and delegation become available.

pub mod cache;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod errors;
pub mod metrics;
pub mod projection;
pub mod selector;
pub mod server;
