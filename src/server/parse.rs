// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Query-name parsing.
//!
//! A qname relative to the apex splits one of two ways:
//! `_service._proto.<domain>` (a service request, SRV semantics) or plain
//! `<domain>`. The protocol label is `_tcp` or `_udp`; a bare `_tcp`/`_udp`
//! directly under the apex is rejected as an invalid query name.

use crate::errors::QueryError;
use crate::projection::{split_labels, trim_zone};

/// The elements of a parsed query name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordRequest {
    /// The named service of an SRV query, underscore stripped. Empty for
    /// plain queries.
    pub service: String,
    /// `TCP` or `UDP` for service requests, empty otherwise.
    pub protocol: String,
    /// The domain below the apex, without a trailing dot. Empty addresses
    /// the apex itself.
    pub domain: String,
}

impl RecordRequest {
    /// Whether this is a service request (`_service._proto.` prefix).
    #[must_use]
    pub fn is_service_request(&self) -> bool {
        !self.protocol.is_empty()
    }
}

/// Parse a lower-cased qname against the apex it was matched under.
///
/// # Errors
///
/// [`QueryError::InvalidRequest`] for names outside the apex or bare
/// `_tcp`/`_udp` apex queries.
pub fn parse_request(name: &str, zone: &str) -> Result<RecordRequest, QueryError> {
    let base = trim_zone(name, zone).ok_or(QueryError::InvalidRequest)?;
    let segs = split_labels(&base);
    if segs.is_empty() {
        return Ok(RecordRequest::default());
    }

    // a protocol label directly under the apex has no service in front of it
    if segs[0] == "_tcp" || segs[0] == "_udp" {
        return Err(QueryError::InvalidRequest);
    }

    for (i, seg) in segs.iter().enumerate() {
        if *seg == "_tcp" || *seg == "_udp" {
            let joined = segs[..i].join(".");
            return Ok(RecordRequest {
                service: strip_underscore(&joined).to_string(),
                protocol: strip_underscore(seg).to_ascii_uppercase(),
                domain: segs[i + 1..].join("."),
            });
        }
    }

    Ok(RecordRequest {
        domain: base,
        ..RecordRequest::default()
    })
}

/// Remove a prefixed underscore.
fn strip_underscore(s: &str) -> &str {
    s.strip_prefix('_').unwrap_or(s)
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod parse_tests;
