// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for status condition helpers.

#[cfg(test)]
mod tests {
    use crate::controller::status::{
        condition_changed, create_condition, find_condition, is_plain,
    };

    #[test]
    fn test_create_condition_carries_timestamp() {
        let condition = create_condition("DNSServer", "True", "HostedZoneActive", "served");
        assert_eq!(condition.r#type, "DNSServer");
        assert_eq!(condition.status, "True");
        assert_eq!(condition.reason.as_deref(), Some("HostedZoneActive"));
        assert_eq!(condition.message.as_deref(), Some("served"));
        assert!(condition.last_transition_time.is_some());
    }

    #[test]
    fn test_condition_changed_semantics() {
        let current = create_condition("DNSServer", "True", "HostedZoneActive", "served");

        assert!(condition_changed(None, &current));

        let same = create_condition("DNSServer", "True", "OtherReason", "served");
        assert!(!condition_changed(Some(&current), &same));

        let status_flip = create_condition("DNSServer", "False", "ValidationFailed", "served");
        assert!(condition_changed(Some(&current), &status_flip));

        let message_change = create_condition("DNSServer", "True", "HostedZoneActive", "changed");
        assert!(condition_changed(Some(&current), &message_change));
    }

    #[test]
    fn test_find_condition() {
        let conditions = vec![
            create_condition("Validation", "True", "ConfigurationValid", ""),
            create_condition("DNSServer", "True", "HostedZoneActive", ""),
        ];
        assert_eq!(
            find_condition(&conditions, "DNSServer").unwrap().r#type,
            "DNSServer"
        );
        assert!(find_condition(&conditions, "Runtime").is_none());
    }

    #[test]
    fn test_plain_mode_detection() {
        // no conditions at all: plain
        assert!(is_plain(&[]));

        // only the server condition: still plain
        let server_only = vec![create_condition("DNSServer", "True", "HostedZoneActive", "")];
        assert!(is_plain(&server_only));

        // any operator-owned condition switches to aggregated mode
        let aggregated = vec![
            create_condition("DNSServer", "True", "HostedZoneActive", ""),
            create_condition("Runtime", "True", "RuntimeAvailable", ""),
        ];
        assert!(!is_plain(&aggregated));
    }
}
