// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `selector.rs`

#[cfg(test)]
mod tests {
    use crate::selector::{Operator, Selector};
    use std::collections::BTreeMap;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let sel = Selector::parse("").unwrap();
        assert!(sel.matches(&labels(&[])));
        assert!(sel.matches(&labels(&[("app", "dns")])));
    }

    #[test]
    fn test_equality_requirement() {
        let sel = Selector::parse("app=dns").unwrap();
        assert!(sel.matches(&labels(&[("app", "dns")])));
        assert!(!sel.matches(&labels(&[("app", "web")])));
        assert!(!sel.matches(&labels(&[])));
    }

    #[test]
    fn test_double_equals_is_equality() {
        let sel = Selector::parse("app==dns").unwrap();
        assert!(sel.matches(&labels(&[("app", "dns")])));
        assert_eq!(sel.requirements()[0].operator, Operator::In);
    }

    #[test]
    fn test_inequality_requirement() {
        let sel = Selector::parse("app!=dns").unwrap();
        assert!(!sel.matches(&labels(&[("app", "dns")])));
        assert!(sel.matches(&labels(&[("app", "web")])));
        // absent keys pass a NotIn requirement
        assert!(sel.matches(&labels(&[])));
    }

    #[test]
    fn test_set_based_in() {
        let sel = Selector::parse("tier in (frontend, edge)").unwrap();
        assert!(sel.matches(&labels(&[("tier", "edge")])));
        assert!(!sel.matches(&labels(&[("tier", "backend")])));
        assert!(!sel.matches(&labels(&[])));
    }

    #[test]
    fn test_set_based_notin() {
        let sel = Selector::parse("tier notin (frontend, edge)").unwrap();
        assert!(!sel.matches(&labels(&[("tier", "edge")])));
        assert!(sel.matches(&labels(&[("tier", "backend")])));
        assert!(sel.matches(&labels(&[])));
    }

    #[test]
    fn test_exists_and_does_not_exist() {
        let sel = Selector::parse("app,!legacy").unwrap();
        assert!(sel.matches(&labels(&[("app", "dns")])));
        assert!(!sel.matches(&labels(&[("app", "dns"), ("legacy", "true")])));
        assert!(!sel.matches(&labels(&[("legacy", "true")])));
    }

    #[test]
    fn test_requirements_are_anded() {
        let sel = Selector::parse("app=dns,tier in (edge)").unwrap();
        assert!(sel.matches(&labels(&[("app", "dns"), ("tier", "edge")])));
        assert!(!sel.matches(&labels(&[("app", "dns")])));
    }

    #[test]
    fn test_commas_inside_value_sets_do_not_split() {
        let sel = Selector::parse("tier in (a,b),app=dns").unwrap();
        assert_eq!(sel.requirements().len(), 2);
        assert_eq!(sel.requirements()[0].values, vec!["a", "b"]);
    }

    #[test]
    fn test_raw_string_preserved_for_api_server() {
        let sel = Selector::parse("app=dns,tier in (edge)").unwrap();
        assert_eq!(sel.as_str(), "app=dns,tier in (edge)");
    }

    #[test]
    fn test_invalid_selectors_rejected() {
        assert!(Selector::parse("=dns").is_err());
        assert!(Selector::parse("app in frontend").is_err());
        assert!(Selector::parse("app in ()").is_err());
        assert!(Selector::parse("app=dns spaces").is_err());
    }
}
