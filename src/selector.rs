// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label selector parsing and matching.
//!
//! The `labels` configuration key carries a Kubernetes label selector string
//! (`app=dns,tier in (frontend,edge),!legacy`). The raw string is passed to
//! the API server for server-side filtering; the parsed form validates the
//! string at startup and supports client-side matching in tests and tools.
//!
//! Both equality-based (`=`, `==`, `!=`) and set-based
//! (`in`, `notin`, `exists`, `!key`) requirements are supported. All
//! requirements are ANDed; an empty selector matches everything.

use crate::errors::ConfigError;
use std::collections::BTreeMap;
use std::fmt;

/// The operator of a single selector requirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    /// Label value must be in the provided set.
    In,
    /// Label value must not be in the provided set (absent keys pass).
    NotIn,
    /// Label key must be present.
    Exists,
    /// Label key must not be present.
    DoesNotExist,
}

/// One parsed selector requirement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requirement {
    /// The label key the requirement applies to.
    pub key: String,
    /// How the key relates to the values.
    pub operator: Operator,
    /// The value set; empty for `Exists` / `DoesNotExist`.
    pub values: Vec<String>,
}

/// A parsed label selector.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selector {
    raw: String,
    requirements: Vec<Requirement>,
}

impl Selector {
    /// Parse a Kubernetes label selector string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSelector`] when the string is not a
    /// well-formed selector.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let raw = input.trim().to_string();
        let mut requirements = Vec::new();
        for part in split_requirements(&raw) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            requirements.push(parse_requirement(part).map_err(|reason| {
                ConfigError::InvalidSelector {
                    value: raw.clone(),
                    reason,
                }
            })?);
        }
        Ok(Selector { raw, requirements })
    }

    /// The raw selector string as given, for server-side filtering.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed requirements.
    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Check a set of labels against this selector. All requirements must be
    /// satisfied; an empty selector matches everything.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| matches_requirement(r, labels))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Check a set of labels against a single requirement.
fn matches_requirement(req: &Requirement, labels: &BTreeMap<String, String>) -> bool {
    match req.operator {
        Operator::In => labels.get(&req.key).is_some_and(|v| req.values.contains(v)),
        Operator::NotIn => labels.get(&req.key).is_none_or(|v| !req.values.contains(v)),
        Operator::Exists => labels.contains_key(&req.key),
        Operator::DoesNotExist => !labels.contains_key(&req.key),
    }
}

/// Split on commas that are not inside a `(...)` value list.
fn split_requirements(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn parse_requirement(part: &str) -> Result<Requirement, String> {
    // Set-based forms first: "key in (a,b)" / "key notin (a,b)".
    for (word, op) in [(" notin ", Operator::NotIn), (" in ", Operator::In)] {
        if let Some(pos) = part.find(word) {
            let key = part[..pos].trim();
            let rest = part[pos + word.len()..].trim();
            let values = parse_value_set(rest)?;
            validate_key(key)?;
            if values.is_empty() {
                return Err(format!("empty value set for key {key:?}"));
            }
            return Ok(Requirement {
                key: key.to_string(),
                operator: op,
                values,
            });
        }
    }

    if let Some(pos) = part.find("!=") {
        let (key, value) = (part[..pos].trim(), part[pos + 2..].trim());
        validate_key(key)?;
        validate_value(value)?;
        return Ok(Requirement {
            key: key.to_string(),
            operator: Operator::NotIn,
            values: vec![value.to_string()],
        });
    }

    if let Some(pos) = part.find("==").or_else(|| part.find('=')) {
        let eq_len = if part[pos..].starts_with("==") { 2 } else { 1 };
        let (key, value) = (part[..pos].trim(), part[pos + eq_len..].trim());
        validate_key(key)?;
        validate_value(value)?;
        return Ok(Requirement {
            key: key.to_string(),
            operator: Operator::In,
            values: vec![value.to_string()],
        });
    }

    if let Some(key) = part.strip_prefix('!') {
        validate_key(key.trim())?;
        return Ok(Requirement {
            key: key.trim().to_string(),
            operator: Operator::DoesNotExist,
            values: Vec::new(),
        });
    }

    validate_key(part)?;
    Ok(Requirement {
        key: part.to_string(),
        operator: Operator::Exists,
        values: Vec::new(),
    })
}

fn parse_value_set(rest: &str) -> Result<Vec<String>, String> {
    let inner = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| format!("expected parenthesised value set, got {rest:?}"))?;
    let mut values = Vec::new();
    for v in inner.split(',') {
        let v = v.trim();
        validate_value(v)?;
        if !v.is_empty() {
            values.push(v.to_string());
        }
    }
    Ok(values)
}

fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("empty label key".to_string());
    }
    if key
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')))
    {
        return Err(format!("invalid label key {key:?}"));
    }
    Ok(())
}

fn validate_value(value: &str) -> Result<(), String> {
    if value
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(format!("invalid label value {value:?}"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
