// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Validation and normalisation of raw resources.
//!
//! Projection is a pure function from a raw resource (plus the current
//! configuration) to a validated internal object. Invalid resources are not
//! dropped: they are projected with `valid = false` and a message, cached as
//! placeholders, and reported through status by the reconciler.
//!
//! All DNS names handled here are normalised to lower case with a trailing
//! dot. Comparisons are therefore plain string equality; the original case of
//! a query name is preserved only in the dispatcher for outgoing owner names.

pub mod entry;
pub mod zone;

pub use entry::{project_entry, Entry, EntryContext, SrvRecord};
pub use zone::{project_zone, Zone, ZoneContext};

/// Normalise a DNS name: trim, lower-case and append the root dot.
///
/// `"."` and the empty string both normalise to the root `"."`.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let n = name.trim().to_ascii_lowercase();
    if n.is_empty() || n == "." {
        return ".".to_string();
    }
    if n.ends_with('.') {
        n
    } else {
        format!("{n}.")
    }
}

/// Append the root dot to a name without touching its case.
#[must_use]
pub fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

/// Join a label onto a (possibly root) domain name.
#[must_use]
pub fn join_label(label: &str, rest: &str) -> String {
    if rest == "." {
        format!("{label}.")
    } else {
        format!("{label}.{rest}")
    }
}

/// Join a relative FQDN onto a base FQDN. The relative root resolves to the
/// base itself.
#[must_use]
pub fn join_relative(rel: &str, base: &str) -> String {
    if rel == "." {
        base.to_string()
    } else {
        format!("{rel}{base}")
    }
}

/// Split a normalised name into its labels, leftmost first.
#[must_use]
pub fn split_labels(name: &str) -> Vec<&str> {
    name.split('.').filter(|l| !l.is_empty()).collect()
}

/// Whether `child` lies at or below `parent`. Both are normalised FQDNs; the
/// root is a parent of everything.
#[must_use]
pub fn is_subdomain(parent: &str, child: &str) -> bool {
    parent == "." || child == parent || child.ends_with(&format!(".{parent}"))
}

/// Strip `zone` off the end of `name`, yielding the relative part without a
/// trailing dot (empty for the apex itself). Returns `None` when `name` is
/// not within `zone`.
#[must_use]
pub fn trim_zone(name: &str, zone: &str) -> Option<String> {
    if name == zone {
        return Some(String::new());
    }
    if zone == "." {
        return Some(name.trim_end_matches('.').to_string());
    }
    name.strip_suffix(&format!(".{zone}"))
        .map(std::string::ToString::to_string)
}
