// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Flat startup configuration.
//!
//! The configuration is a single YAML document parsed once at startup.
//! Unknown properties, out-of-range TTLs, conflicting credentials and
//! mode/zone mismatches all abort process start with a [`ConfigError`].
//!
//! # Example
//!
//! ```yaml
//! zones: ["example.org"]
//! mode: Primary
//! zoneObject: example-org
//! namespaces: ["dns-system"]
//! transitive: true
//! ttl: 60
//! listen: "0.0.0.0:1053"
//! ```

use crate::constants::{
    DEFAULT_CONFIG_TTL_SECS, DEFAULT_DNS_LISTEN_ADDR, MAX_CONFIG_TTL_SECS,
    METRICS_SERVER_BIND_ADDRESS, MODE_FILTER, MODE_PRIMARY, MODE_SUBDOMAINS,
};
use crate::errors::ConfigError;
use crate::projection::normalize_name;
use crate::selector::Selector;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

/// Operating mode of the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Entries carry absolute names, filtered against the served zones.
    #[default]
    FilterByZones,
    /// Legacy mode: entries anchored under `<namespace>.<served-apex>`.
    Subdomains,
    /// A configured `HostedZone` object governs the served content.
    Primary,
}

impl Mode {
    /// The configuration string for this mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::FilterByZones => MODE_FILTER,
            Mode::Subdomains => MODE_SUBDOMAINS,
            Mode::Primary => MODE_PRIMARY,
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            MODE_FILTER => Ok(Mode::FilterByZones),
            MODE_SUBDOMAINS => Ok(Mode::Subdomains),
            MODE_PRIMARY => Ok(Mode::Primary),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

/// Client certificate credentials for the declarative API.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TlsConfig {
    /// Path to the client certificate.
    pub cert: String,
    /// Path to the client key.
    pub key: String,
    /// Path to the CA certificate.
    pub ca: String,
}

/// One endpoint given as a string, or a (deprecated) list of endpoints.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// The raw configuration file as deserialised. Unknown keys are rejected.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct RawConfig {
    zones: Vec<String>,
    mode: Option<String>,
    zone_object: Option<String>,
    namespaces: Vec<String>,
    endpoint: Option<OneOrMany>,
    token_file: Option<String>,
    cert_authority: Option<String>,
    tls: Option<TlsConfig>,
    kubeconfig: Option<String>,
    context: Option<String>,
    labels: Option<String>,
    ttl: Option<u32>,
    transitive: bool,
    slave: bool,
    #[serde(rename = "fallthrough")]
    fall_through: Option<Vec<String>>,
    listen: Option<String>,
    metrics_addr: Option<String>,
}

/// Validated server configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Served apex zones, lower-cased FQDNs.
    pub zones: Vec<String>,
    /// Operating mode.
    pub mode: Mode,
    /// Name of the root `HostedZone` (Primary mode only).
    pub zone_object: Option<String>,
    /// Namespaces to observe; empty means all.
    pub namespaces: BTreeSet<String>,
    /// API server endpoint URL, when connecting from outside the cluster.
    pub endpoint: Option<String>,
    /// Bearer token file path.
    pub token_file: Option<String>,
    /// CA certificate path for the token/TLS connection.
    pub cert_authority: Option<String>,
    /// Client certificate credentials.
    pub tls: Option<TlsConfig>,
    /// Explicit kubeconfig path.
    pub kubeconfig: Option<String>,
    /// Context within the explicit kubeconfig.
    pub context: Option<String>,
    /// Label selector applied to both watched kinds.
    pub labels: Option<Selector>,
    /// Default record TTL.
    pub ttl: u32,
    /// Descend into nested zones during resolution.
    pub transitive: bool,
    /// Suppress direct status writes.
    pub slave: bool,
    /// Fall-through zones: `Some(empty)` means fall through for any name.
    pub fall_through: Option<Vec<String>>,
    /// DNS listen address (UDP and TCP).
    pub listen: SocketAddr,
    /// Prometheus metrics listen address.
    pub metrics_addr: SocketAddr,
}

impl Config {
    /// Load and validate the configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file cannot be read, contains
    /// unknown properties, or fails any of the validation rules.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parse and validate a YAML configuration document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] on parse or validation failure.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        if raw.zones.is_empty() {
            return Err(ConfigError::NoZones);
        }
        let mut zones = Vec::with_capacity(raw.zones.len());
        for z in &raw.zones {
            let n = normalize_name(z);
            if n.is_empty() || n.contains(char::is_whitespace) {
                return Err(ConfigError::InvalidZone(z.clone()));
            }
            zones.push(n);
        }

        let mode = match raw.mode.as_deref() {
            Some(m) => m.parse::<Mode>()?,
            None => Mode::FilterByZones,
        };

        let ttl = raw.ttl.unwrap_or(DEFAULT_CONFIG_TTL_SECS);
        if ttl > MAX_CONFIG_TTL_SECS {
            return Err(ConfigError::TtlOutOfRange(ttl));
        }

        let endpoint = match raw.endpoint {
            None => None,
            Some(OneOrMany::One(e)) => Some(e),
            Some(OneOrMany::Many(list)) => {
                if list.len() > 1 {
                    return Err(ConfigError::MultipleEndpoints);
                }
                list.into_iter().next()
            }
        };

        if raw.token_file.is_some() && raw.kubeconfig.is_some() {
            return Err(ConfigError::TokenAndKubeconfig);
        }
        if raw.token_file.is_some() && endpoint.is_none() {
            return Err(ConfigError::TokenRequiresEndpoint);
        }

        let namespaces: BTreeSet<String> = raw.namespaces.into_iter().collect();

        match mode {
            Mode::Primary => {
                if raw.zone_object.is_none() {
                    return Err(ConfigError::PrimaryRequiresZoneObject);
                }
                if namespaces.len() != 1 {
                    return Err(ConfigError::PrimaryRequiresSingleNamespace);
                }
            }
            _ => {
                if raw.zone_object.is_some() {
                    return Err(ConfigError::ZoneObjectRequiresPrimary);
                }
            }
        }
        if mode != Mode::FilterByZones && zones.len() != 1 {
            return Err(ConfigError::ModeRequiresSingleZone(mode.as_str().to_string()));
        }

        let labels = match raw.labels.as_deref() {
            Some(s) if !s.trim().is_empty() => Some(Selector::parse(s)?),
            _ => None,
        };

        let listen = parse_addr(raw.listen.as_deref().unwrap_or(DEFAULT_DNS_LISTEN_ADDR))?;
        let metrics_addr = parse_addr(
            raw.metrics_addr
                .as_deref()
                .unwrap_or(METRICS_SERVER_BIND_ADDRESS),
        )?;

        let fall_through = raw
            .fall_through
            .map(|zs| zs.iter().map(|z| normalize_name(z)).collect());

        Ok(Config {
            zones,
            mode,
            zone_object: raw.zone_object,
            namespaces,
            endpoint,
            token_file: raw.token_file,
            cert_authority: raw.cert_authority,
            tls: raw.tls,
            kubeconfig: raw.kubeconfig,
            context: raw.context,
            labels,
            ttl,
            transitive: raw.transitive,
            slave: raw.slave,
            fall_through,
            listen,
            metrics_addr,
        })
    }

    /// The namespace/name of the governing `HostedZone`, in Primary mode.
    #[must_use]
    pub fn zone_ref(&self) -> Option<(String, String)> {
        let name = self.zone_object.clone()?;
        let namespace = self.namespaces.iter().next()?.clone();
        Some((namespace, name))
    }
}

fn parse_addr(s: &str) -> Result<SocketAddr, ConfigError> {
    s.parse()
        .map_err(|_| ConfigError::InvalidListenAddr(s.to_string()))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
