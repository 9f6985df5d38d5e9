// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for zone reconciliation.

#[cfg(test)]
mod tests {
    use crate::cache::ObjectKey;
    use crate::config::Mode;
    use crate::controller::reconcile_zones::reconcile_zone;
    use crate::controller::source::{MemorySource, ResourceSource};
    use crate::controller::{ControlOpts, Controller};
    use crate::crd::{Condition, CoreDNSEntry, HostedZone, HostedZoneStatus};
    use crate::projection::{Entry, Zone};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    struct Fixture {
        ctrl: Arc<Controller>,
        zone_source: Arc<MemorySource<HostedZone>>,
    }

    fn fixture(slave: bool) -> Fixture {
        let entry_source = Arc::new(MemorySource::<CoreDNSEntry>::new());
        let zone_source = Arc::new(MemorySource::<HostedZone>::new());
        let opts = ControlOpts {
            mode: Mode::Primary,
            zones: vec!["example.org.".to_string()],
            zone_ref: Some(ObjectKey::new("dns", "root")),
            namespaces: BTreeSet::from(["dns".to_string()]),
            slave,
        };
        let ctrl = Controller::new(
            opts,
            Arc::clone(&entry_source) as Arc<dyn ResourceSource<CoreDNSEntry>>,
            Some(Arc::clone(&zone_source) as Arc<dyn ResourceSource<HostedZone>>),
        );
        Fixture { ctrl, zone_source }
    }

    fn zone(namespace: &str, name: &str, domains: &[&str], parent: &str) -> Zone {
        Zone {
            version: "1".to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            valid: true,
            domain_names: domains.iter().map(|d| (*d).to_string()).collect(),
            email: "hostmaster.example.org.".to_string(),
            refresh: 3600,
            retry: 600,
            expire: 604_800,
            minimum_ttl: 60,
            parent_ref: parent.to_string(),
            ..Zone::default()
        }
    }

    fn entry(namespace: &str, name: &str, zone_ref: &str) -> Entry {
        Entry {
            version: "1".to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            zone_ref: zone_ref.to_string(),
            valid: true,
            dns_names: vec!["www.".to_string()],
            ..Entry::default()
        }
    }

    #[tokio::test]
    async fn test_responsible_zone_writes_ok_and_cascades() {
        let f = fixture(false);
        f.ctrl.zones.insert(zone("dns", "root", &["example.org."], ""));
        f.ctrl.zones.insert(zone("dns", "child", &["child."], "root"));
        f.ctrl.entries.insert(entry("dns", "web", "root"));

        reconcile_zone(&f.ctrl, &ObjectKey::new("dns", "root"))
            .await
            .unwrap();

        let patches = f.zone_source.recorded_patches();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].0, "dns/root");
        assert_eq!(patches[0].1["state"], "Ok");

        // dependent entry and nested zone both got enqueued
        assert_eq!(f.ctrl.queue.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_zone_writes_verdict() {
        let f = fixture(false);
        let mut invalid = zone("dns", "root", &["example.org."], "");
        invalid.valid = false;
        invalid.message = "email address required".to_string();
        f.ctrl.zones.insert(invalid);

        reconcile_zone(&f.ctrl, &ObjectKey::new("dns", "root"))
            .await
            .unwrap();

        let patches = f.zone_source.recorded_patches();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].1["state"], "Invalid");
        assert_eq!(patches[0].1["message"], "email address required");
    }

    #[tokio::test]
    async fn test_not_responsible_zone_is_left_idle() {
        let f = fixture(false);
        f.ctrl.zones.insert(zone("dns", "other", &["example.net."], ""));

        reconcile_zone(&f.ctrl, &ObjectKey::new("dns", "other"))
            .await
            .unwrap();

        assert!(f.zone_source.recorded_patches().is_empty());
        assert_eq!(f.ctrl.queue.len(), 0);
    }

    #[tokio::test]
    async fn test_broken_chain_reports_no_root_and_triggers_entries() {
        let f = fixture(false);
        f.ctrl.zones.insert(zone("dns", "child", &["child."], "missing"));
        f.ctrl.entries.insert(entry("dns", "dep", "child"));

        reconcile_zone(&f.ctrl, &ObjectKey::new("dns", "child"))
            .await
            .unwrap();

        let patches = f.zone_source.recorded_patches();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].1["state"], "Invalid");
        assert_eq!(patches[0].1["message"], "no root zone found");
        assert_eq!(f.ctrl.queue.len(), 1);
    }

    #[tokio::test]
    async fn test_deleted_zone_cascades_to_dependents() {
        let f = fixture(false);
        f.ctrl.zones.insert(zone("dns", "child", &["child."], "root"));
        f.ctrl.entries.insert(entry("dns", "dep", "root"));
        // "root" itself is gone from the cache

        reconcile_zone(&f.ctrl, &ObjectKey::new("dns", "root"))
            .await
            .unwrap();

        assert!(f.zone_source.recorded_patches().is_empty());
        // the referencing entry and the nested child both requeue
        assert_eq!(f.ctrl.queue.len(), 2);
    }

    #[tokio::test]
    async fn test_reconcile_twice_writes_once() {
        let f = fixture(false);
        let mut settled = zone("dns", "root", &["example.org."], "");
        settled.status = HostedZoneStatus {
            state: "Ok".to_string(),
            observed: Some(crate::crd::Observed::default()),
            ..HostedZoneStatus::default()
        };
        f.ctrl.zones.insert(settled);

        reconcile_zone(&f.ctrl, &ObjectKey::new("dns", "root"))
            .await
            .unwrap();
        reconcile_zone(&f.ctrl, &ObjectKey::new("dns", "root"))
            .await
            .unwrap();

        assert!(f.zone_source.recorded_patches().is_empty());
    }

    #[tokio::test]
    async fn test_aggregated_status_reconciles_server_condition() {
        let f = fixture(false);
        let mut managed = zone("dns", "root", &["example.org."], "");
        managed.status = HostedZoneStatus {
            state: "Ready".to_string(),
            conditions: vec![Condition {
                r#type: "Runtime".to_string(),
                status: "True".to_string(),
                reason: Some("RuntimeAvailable".to_string()),
                message: None,
                last_transition_time: None,
            }],
            ..HostedZoneStatus::default()
        };
        f.ctrl.zones.insert(managed);

        reconcile_zone(&f.ctrl, &ObjectKey::new("dns", "root"))
            .await
            .unwrap();

        let patches = f.zone_source.recorded_patches();
        assert_eq!(patches.len(), 1);
        let conditions = patches[0].1["conditions"].as_array().unwrap();
        assert_eq!(conditions.len(), 2);
        let server = conditions
            .iter()
            .find(|c| c["type"] == "DNSServer")
            .unwrap();
        assert_eq!(server["status"], "True");
        assert_eq!(server["reason"], "HostedZoneActive");
        // operator-owned fields are untouched
        assert!(patches[0].1.get("state").is_none());
    }

    #[tokio::test]
    async fn test_slave_mode_never_writes() {
        let f = fixture(true);
        f.ctrl.zones.insert(zone("dns", "root", &["example.org."], ""));
        reconcile_zone(&f.ctrl, &ObjectKey::new("dns", "root"))
            .await
            .unwrap();
        assert!(f.zone_source.recorded_patches().is_empty());
    }
}
