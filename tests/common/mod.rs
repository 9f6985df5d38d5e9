// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared fixtures for the integration tests: an in-memory resource source
//! wired into a running controller, plus raw-resource builders.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use zondy::config::{Config, Mode};
use zondy::controller::source::{MemorySource, ResourceSource};
use zondy::controller::{ControlOpts, Controller};
use zondy::crd::{
    CoreDNSEntry, CoreDNSEntrySpec, HostedZone, HostedZoneSpec, SRVRecord, ServiceSpec,
};
use zondy::server::Dispatcher;

pub const APEX: &str = "example.org.";

pub struct Harness {
    pub controller: Arc<Controller>,
    pub entries: Arc<MemorySource<CoreDNSEntry>>,
    pub zones: Arc<MemorySource<HostedZone>>,
    pub config: Config,
}

impl Harness {
    /// Start a Primary-mode controller over in-memory sources and wait for
    /// the initial sync.
    pub async fn start(transitive: bool) -> Self {
        let config = Config {
            zones: vec![APEX.to_string()],
            mode: Mode::Primary,
            zone_object: Some("root".to_string()),
            namespaces: BTreeSet::from(["dns".to_string()]),
            endpoint: None,
            token_file: None,
            cert_authority: None,
            tls: None,
            kubeconfig: None,
            context: None,
            labels: None,
            ttl: 0,
            transitive,
            slave: false,
            fall_through: None,
            listen: "127.0.0.1:0".parse().unwrap(),
            metrics_addr: "127.0.0.1:0".parse().unwrap(),
        };

        let entries = Arc::new(MemorySource::<CoreDNSEntry>::new());
        let zones = Arc::new(MemorySource::<HostedZone>::new());
        let controller = Controller::new(
            ControlOpts::from_config(&config),
            Arc::clone(&entries) as Arc<dyn ResourceSource<CoreDNSEntry>>,
            Some(Arc::clone(&zones) as Arc<dyn ResourceSource<HostedZone>>),
        );

        {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.run().await });
        }
        controller.wait_for_sync().await;

        Harness {
            controller,
            entries,
            zones,
            config,
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Arc::clone(&self.controller), &self.config)
    }

    /// Give the informers and workers a moment to drain.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    pub fn stop(&self) {
        let _ = self.controller.stop();
    }
}

pub fn hosted_zone(name: &str, domains: &[&str], parent: &str, minimum_ttl: i32) -> HostedZone {
    let mut zone = HostedZone::new(
        name,
        HostedZoneSpec {
            domain_names: domains.iter().map(|d| (*d).to_string()).collect(),
            email: "hostmaster@example.org".to_string(),
            refresh: 3600,
            retry: 600,
            expire: 604_800,
            minimum_ttl,
            parent_ref: parent.to_string(),
            class: None,
            runtime: None,
        },
    );
    zone.metadata.namespace = Some("dns".to_string());
    zone
}

pub fn a_entry(name: &str, zone_ref: &str, dns_names: &[&str], addresses: &[&str]) -> CoreDNSEntry {
    let mut entry = CoreDNSEntry::new(
        name,
        CoreDNSEntrySpec {
            zone_ref: zone_ref.to_string(),
            dns_names: dns_names.iter().map(|n| (*n).to_string()).collect(),
            a: addresses.iter().map(|a| (*a).to_string()).collect(),
            ..CoreDNSEntrySpec::default()
        },
    );
    entry.metadata.namespace = Some("dns".to_string());
    entry
}

pub fn srv_entry(name: &str, zone_ref: &str, service: &str, record: SRVRecord) -> CoreDNSEntry {
    let mut entry = CoreDNSEntry::new(
        name,
        CoreDNSEntrySpec {
            zone_ref: zone_ref.to_string(),
            dns_names: vec![".".to_string()],
            srv: Some(ServiceSpec {
                service: service.to_string(),
                records: vec![record],
            }),
            ..CoreDNSEntrySpec::default()
        },
    );
    entry.metadata.namespace = Some("dns".to_string());
    entry
}
