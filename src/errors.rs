// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the Zondy server.
//!
//! Three families of errors live here:
//! - [`QueryError`] - sentinels raised on the query path; "name errors"
//!   collapse to NXDOMAIN unless fall-through is configured.
//! - [`ConfigError`] - startup configuration failures; these abort process
//!   start with a non-zero status.
//! - [`ControllerError`] - controller lifecycle and API transport failures.
//!
//! Projection failures are not errors in this sense: an invalid resource is
//! cached as an invalid placeholder and reported through its status.

use thiserror::Error;

/// Errors raised while resolving a query against the cache.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryError {
    /// No entry exists under the queried name.
    #[error("no items found")]
    NoItems,

    /// The name addresses a namespace that is not exposed by this server.
    #[error("namespace is not exposed")]
    NsNotExposed,

    /// The query name cannot be interpreted (e.g. a bare `_tcp` apex query).
    #[error("invalid query name")]
    InvalidRequest,
}

impl QueryError {
    /// Whether this error maps to NXDOMAIN (all current variants do).
    ///
    /// Kept as an explicit predicate so transport-level errors added later
    /// do not silently turn into name errors.
    #[must_use]
    pub fn is_name_error(&self) -> bool {
        matches!(
            self,
            QueryError::NoItems | QueryError::NsNotExposed | QueryError::InvalidRequest
        )
    }
}

/// Startup configuration failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration {path}: {source}")]
    Io {
        /// Path that failed to load
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The configuration file could not be parsed. Unknown properties are
    /// rejected here as well.
    #[error("invalid configuration: {0}")]
    Parse(String),

    /// At least one served zone is required.
    #[error("at least one served zone is required")]
    NoZones,

    /// A zone name failed normalisation.
    #[error("no hosts found in zone {0:?}")]
    InvalidZone(String),

    /// The mode string is not one of the known modes.
    #[error("invalid mode {0:?}, use FilterByZones, Subdomains or Primary")]
    InvalidMode(String),

    /// `ttl` must be within `[0, 3600]`.
    #[error("ttl must be in range [0, 3600]: {0}")]
    TtlOutOfRange(u32),

    /// Multiple API endpoints are not supported.
    #[error("multiple endpoints not possible")]
    MultipleEndpoints,

    /// `zoneObject` is only meaningful in Primary mode.
    #[error("zoneObject requires mode \"Primary\"")]
    ZoneObjectRequiresPrimary,

    /// Primary mode requires a `zoneObject`.
    #[error("zoneObject required for mode \"Primary\"")]
    PrimaryRequiresZoneObject,

    /// Primary mode requires exactly one namespace.
    #[error("one namespace required for zoneObject for mode \"Primary\"")]
    PrimaryRequiresSingleNamespace,

    /// Subdomains and Primary mode serve exactly one apex zone.
    #[error("mode {0} requires one served zone as base domain")]
    ModeRequiresSingleZone(String),

    /// A bearer token and an explicit kubeconfig are mutually exclusive.
    #[error("only API token or kubeconfig")]
    TokenAndKubeconfig,

    /// A bearer token needs an API endpoint to talk to.
    #[error("API token requires API server")]
    TokenRequiresEndpoint,

    /// The label selector string could not be parsed.
    #[error("unable to parse label selector value {value:?}: {reason}")]
    InvalidSelector {
        /// The offending selector string
        value: String,
        /// What went wrong
        reason: String,
    },

    /// A listen address could not be parsed.
    #[error("invalid listen address {0:?}")]
    InvalidListenAddr(String),
}

/// Controller lifecycle and API transport failures.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// `stop` was called a second time.
    #[error("shutdown already in progress")]
    ShutdownInProgress,

    /// The declarative API rejected or failed a request. Reconciles hitting
    /// this requeue with backoff.
    #[error("API request failed: {0}")]
    Api(#[from] kube::Error),
}
