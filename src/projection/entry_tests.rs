// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `projection/entry.rs`

#[cfg(test)]
mod tests {
    use crate::config::Mode;
    use crate::crd::{CoreDNSEntry, CoreDNSEntrySpec, SRVRecord, ServiceSpec};
    use crate::projection::{project_entry, EntryContext};
    use hickory_proto::rr::RecordType;

    fn raw(namespace: &str, name: &str, spec: CoreDNSEntrySpec) -> CoreDNSEntry {
        let mut entry = CoreDNSEntry::new(name, spec);
        entry.metadata.namespace = Some(namespace.to_string());
        entry.metadata.resource_version = Some("1".to_string());
        entry
    }

    fn primary_ctx() -> EntryContext<'static> {
        EntryContext {
            mode: Mode::Primary,
            apex: "example.org.",
        }
    }

    #[test]
    fn test_valid_zone_anchored_entry() {
        let spec = CoreDNSEntrySpec {
            zone_ref: "example-org".to_string(),
            dns_names: vec!["WWW".to_string(), "api.".to_string()],
            a: vec!["10.0.0.1".to_string()],
            ..CoreDNSEntrySpec::default()
        };
        let entry = project_entry(&raw("dns", "web", spec), &primary_ctx());
        assert!(entry.valid, "{}", entry.message);
        // names are lower-cased, dot-terminated and stay relative
        assert_eq!(entry.dns_names, vec!["www.".to_string(), "api.".to_string()]);
        assert_eq!(entry.a.len(), 1);
        assert_eq!(entry.zone_ref, "example-org");
    }

    #[test]
    fn test_subdomain_mode_suffixes_relative_names() {
        let ctx = EntryContext {
            mode: Mode::Subdomains,
            apex: "example.org.",
        };
        let spec = CoreDNSEntrySpec {
            dns_names: vec!["www".to_string(), "absolute.example.org.".to_string()],
            a: vec!["10.0.0.1".to_string()],
            ..CoreDNSEntrySpec::default()
        };
        let entry = project_entry(&raw("default", "web", spec), &ctx);
        assert_eq!(
            entry.dns_names,
            vec![
                "www.default.example.org.".to_string(),
                "absolute.example.org.".to_string(),
            ]
        );
    }

    #[test]
    fn test_invalid_ipv4_names_the_literal() {
        let spec = CoreDNSEntrySpec {
            zone_ref: "z".to_string(),
            dns_names: vec!["www".to_string()],
            a: vec!["10.0.0.1".to_string(), "not-an-ip".to_string()],
            ..CoreDNSEntrySpec::default()
        };
        let entry = project_entry(&raw("dns", "web", spec), &primary_ctx());
        assert!(!entry.valid);
        assert_eq!(entry.message, "invalid ipv4 address \"not-an-ip\"");
        // the parseable address is still cached
        assert_eq!(entry.a.len(), 1);
    }

    #[test]
    fn test_ipv4_literal_rejected_as_ipv6() {
        let spec = CoreDNSEntrySpec {
            zone_ref: "z".to_string(),
            dns_names: vec!["www".to_string()],
            aaaa: vec!["10.0.0.1".to_string()],
            ..CoreDNSEntrySpec::default()
        };
        let entry = project_entry(&raw("dns", "web", spec), &primary_ctx());
        assert!(!entry.valid);
        assert_eq!(entry.message, "invalid ipv6 address \"10.0.0.1\"");
    }

    #[test]
    fn test_missing_dns_names() {
        let spec = CoreDNSEntrySpec {
            zone_ref: "z".to_string(),
            a: vec!["10.0.0.1".to_string()],
            ..CoreDNSEntrySpec::default()
        };
        let entry = project_entry(&raw("dns", "web", spec), &primary_ctx());
        assert!(!entry.valid);
        assert_eq!(entry.message, "at least one DNS name is required");
    }

    #[test]
    fn test_no_record_defined() {
        let spec = CoreDNSEntrySpec {
            zone_ref: "z".to_string(),
            dns_names: vec!["www".to_string()],
            ..CoreDNSEntrySpec::default()
        };
        let entry = project_entry(&raw("dns", "web", spec), &primary_ctx());
        assert!(!entry.valid);
        assert_eq!(entry.message, "no record defined");
    }

    #[test]
    fn test_txt_only_entry_is_valid() {
        let spec = CoreDNSEntrySpec {
            zone_ref: "z".to_string(),
            dns_names: vec!["www".to_string()],
            txt: vec!["v=spf1 -all".to_string()],
            ..CoreDNSEntrySpec::default()
        };
        let entry = project_entry(&raw("dns", "web", spec), &primary_ctx());
        assert!(entry.valid, "{}", entry.message);
    }

    #[test]
    fn test_srv_validation() {
        let srv = |records| CoreDNSEntrySpec {
            zone_ref: "z".to_string(),
            dns_names: vec![".".to_string()],
            srv: Some(ServiceSpec {
                service: "http".to_string(),
                records,
            }),
            ..CoreDNSEntrySpec::default()
        };

        let record = SRVRecord {
            protocol: "TCP".to_string(),
            priority: 10,
            weight: 5,
            port: 80,
            host: "pod.example.org.".to_string(),
        };

        let entry = project_entry(&raw("dns", "s", srv(vec![record.clone()])), &primary_ctx());
        assert!(entry.valid, "{}", entry.message);
        assert_eq!(entry.srv.len(), 1);
        assert_eq!(entry.srv[0].port, 80);

        let mut bad = record.clone();
        bad.protocol = "SCTP".to_string();
        let entry = project_entry(&raw("dns", "s", srv(vec![bad])), &primary_ctx());
        assert!(!entry.valid);
        assert_eq!(entry.message, "invalid protocol \"SCTP\" for SRV record 0");

        let mut bad = record.clone();
        bad.port = 0;
        let entry = project_entry(&raw("dns", "s", srv(vec![bad])), &primary_ctx());
        assert!(!entry.valid);
        assert_eq!(entry.message, "invalid port for SRV record 0");

        let mut bad = record.clone();
        bad.host = String::new();
        let entry = project_entry(&raw("dns", "s", srv(vec![bad])), &primary_ctx());
        assert!(!entry.valid);
        assert_eq!(entry.message, "host missing for SRV record 0");
    }

    #[test]
    fn test_srv_requires_service_name() {
        let spec = CoreDNSEntrySpec {
            zone_ref: "z".to_string(),
            dns_names: vec![".".to_string()],
            srv: Some(ServiceSpec {
                service: String::new(),
                records: vec![SRVRecord {
                    protocol: "UDP".to_string(),
                    priority: 0,
                    weight: 0,
                    port: 53,
                    host: "ns.example.org.".to_string(),
                }],
            }),
            ..CoreDNSEntrySpec::default()
        };
        let entry = project_entry(&raw("dns", "s", spec), &primary_ctx());
        assert!(!entry.valid);
        assert_eq!(entry.message, "service name required for SRV record");
    }

    #[test]
    fn test_cname_absolute_stays_absolute_in_subdomain_mode() {
        let ctx = EntryContext {
            mode: Mode::Subdomains,
            apex: "example.org.",
        };
        let spec = CoreDNSEntrySpec {
            dns_names: vec!["alias".to_string()],
            cname: "Target.Example.COM.".to_string(),
            ..CoreDNSEntrySpec::default()
        };
        let entry = project_entry(&raw("default", "alias", spec), &ctx);
        assert_eq!(entry.cname, "target.example.com.");

        let spec = CoreDNSEntrySpec {
            dns_names: vec!["alias".to_string()],
            cname: "target".to_string(),
            ..CoreDNSEntrySpec::default()
        };
        let entry = project_entry(&raw("default", "alias", spec), &ctx);
        assert_eq!(entry.cname, "target.default.example.org.");
    }

    #[test]
    fn test_match_type_and_ttl() {
        let spec = CoreDNSEntrySpec {
            zone_ref: "z".to_string(),
            dns_names: vec!["www".to_string()],
            a: vec!["10.0.0.1".to_string()],
            ttl: Some(120),
            ..CoreDNSEntrySpec::default()
        };
        let entry = project_entry(&raw("dns", "web", spec), &primary_ctx());
        assert!(entry.match_type(RecordType::A));
        assert!(entry.match_type(RecordType::ANY));
        assert!(!entry.match_type(RecordType::AAAA));
        assert!(!entry.match_type(RecordType::MX));
        assert_eq!(entry.effective_ttl(300), 120);

        let spec = CoreDNSEntrySpec {
            zone_ref: "z".to_string(),
            dns_names: vec!["www".to_string()],
            a: vec!["10.0.0.1".to_string()],
            ..CoreDNSEntrySpec::default()
        };
        let entry = project_entry(&raw("dns", "web", spec), &primary_ctx());
        assert_eq!(entry.effective_ttl(300), 300);
    }

    #[test]
    fn test_invalid_entry_yields_no_records() {
        let spec = CoreDNSEntrySpec {
            zone_ref: "z".to_string(),
            dns_names: vec!["www".to_string()],
            a: vec!["bad".to_string()],
            ..CoreDNSEntrySpec::default()
        };
        let entry = project_entry(&raw("dns", "web", spec), &primary_ctx());
        assert!(!entry.match_type(RecordType::A));
        assert!(entry.srv_records(None).is_empty());
    }

    #[test]
    fn test_equivalence_ignores_status_and_version() {
        let spec = CoreDNSEntrySpec {
            zone_ref: "z".to_string(),
            dns_names: vec!["www".to_string()],
            a: vec!["10.0.0.1".to_string()],
            ..CoreDNSEntrySpec::default()
        };
        let a = project_entry(&raw("dns", "web", spec.clone()), &primary_ctx());
        let mut other = raw("dns", "web", spec);
        other.metadata.resource_version = Some("99".to_string());
        other.status = Some(crate::crd::CoreDNSEntryStatus {
            state: "Ok".to_string(),
            ..crate::crd::CoreDNSEntryStatus::default()
        });
        let b = project_entry(&other, &primary_ctx());
        assert!(a.equivalent(&b));
    }

    #[test]
    fn test_equivalence_detects_record_changes() {
        let base = CoreDNSEntrySpec {
            zone_ref: "z".to_string(),
            dns_names: vec!["www".to_string()],
            a: vec!["10.0.0.1".to_string()],
            ..CoreDNSEntrySpec::default()
        };
        let a = project_entry(&raw("dns", "web", base.clone()), &primary_ctx());

        let mut changed = base.clone();
        changed.a = vec!["10.0.0.2".to_string()];
        let b = project_entry(&raw("dns", "web", changed), &primary_ctx());
        assert!(!a.equivalent(&b));

        let mut changed = base;
        changed.dns_names = vec!["www2".to_string()];
        let c = project_entry(&raw("dns", "web", changed), &primary_ctx());
        assert!(!a.equivalent(&c));
    }

    #[test]
    fn test_projection_is_idempotent() {
        let spec = CoreDNSEntrySpec {
            zone_ref: "z".to_string(),
            dns_names: vec!["WWW".to_string()],
            a: vec!["10.0.0.1".to_string()],
            ..CoreDNSEntrySpec::default()
        };
        let raw_entry = raw("dns", "web", spec);
        let once = project_entry(&raw_entry, &primary_ctx());
        let twice = project_entry(&raw_entry, &primary_ctx());
        assert!(once.equivalent(&twice));
        assert_eq!(once.dns_names, twice.dns_names);
    }
}
