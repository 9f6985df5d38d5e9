// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The reconciliation controller.
//!
//! One controller owns the indexed caches for both watched kinds, the shared
//! work queue and the reconcile workers. Informer callbacks write to the
//! caches and enqueue keys; workers drain the queue one key at a time,
//! dispatch to the per-kind reconcile function and requeue failures with
//! backoff. Panics inside a reconcile are caught, logged and retried.
//!
//! The controller also answers the index lookups the DNS path needs,
//! including the single-level wildcard fallback, and walks zone ancestry for
//! root-zone discovery.

pub mod informer;
pub mod queue;
pub mod reconcile_entries;
pub mod reconcile_zones;
pub mod source;
pub mod status;

use crate::cache::{IndexedStore, ObjectKey, StoreObject};
use crate::config::{Config, Mode};
use crate::constants::{
    ENTRY_DNS_INDEX, ENTRY_IP_INDEX, ENTRY_ZONE_INDEX, SYNC_POLL_INTERVAL_MILLIS,
    SYNC_WAIT_TIMEOUT_MILLIS, WORKER_NO, ZONE_DOMAIN_INDEX, ZONE_PARENT_INDEX,
};
use crate::crd::{CoreDNSEntry, HostedZone};
use crate::errors::ControllerError;
use crate::metrics;
use crate::projection::{
    fqdn, join_relative, project_entry, project_zone, split_labels, Entry, EntryContext, Zone,
    ZoneContext,
};
use futures::FutureExt;
use informer::InformerShared;
use queue::{Kind, RequestKey, WorkQueue};
use source::ResourceSource;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Options distilled from the [`Config`] that the controller needs at
/// runtime.
#[derive(Clone, Debug)]
pub struct ControlOpts {
    /// Operating mode.
    pub mode: Mode,
    /// Served apex zones, lower-cased FQDNs.
    pub zones: Vec<String>,
    /// The governing `HostedZone`, in Primary mode.
    pub zone_ref: Option<ObjectKey>,
    /// Namespaces to observe; empty means all.
    pub namespaces: BTreeSet<String>,
    /// Suppress direct status writes.
    pub slave: bool,
}

impl ControlOpts {
    /// Distill the runtime options from a validated configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        ControlOpts {
            mode: config.mode,
            zones: config.zones.clone(),
            zone_ref: config
                .zone_ref()
                .map(|(namespace, name)| ObjectKey::new(namespace, name)),
            namespaces: config.namespaces.clone(),
            slave: config.slave,
        }
    }
}

/// Result of walking a zone's ancestor chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneAncestry {
    /// Whether the chain ends at the configured zone object.
    pub responsible: bool,
    /// Name of the chain's root zone; `None` when the chain is broken by a
    /// missing parent.
    pub root: Option<String>,
}

/// The resource cache and reconciliation controller.
pub struct Controller {
    pub(crate) entries: Arc<IndexedStore<Entry>>,
    pub(crate) zones: Arc<IndexedStore<Zone>>,
    pub(crate) entry_source: Arc<dyn ResourceSource<CoreDNSEntry>>,
    pub(crate) zone_source: Option<Arc<dyn ResourceSource<HostedZone>>>,
    pub(crate) opts: ControlOpts,
    queue: Arc<WorkQueue>,
    modified: Arc<AtomicI64>,
    entry_synced: Arc<AtomicBool>,
    zone_synced: Arc<AtomicBool>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    shutdown: Mutex<bool>,
    first_apex: String,
}

fn entry_dns_keys(e: &Entry) -> Vec<String> {
    e.dns_names.clone()
}

fn entry_ip_keys(e: &Entry) -> Vec<String> {
    let mut keys: Vec<String> = e.a.iter().map(std::string::ToString::to_string).collect();
    keys.extend(e.aaaa.iter().map(std::string::ToString::to_string));
    if !e.cname.is_empty() {
        keys.push(e.cname.clone());
    }
    keys
}

fn entry_zone_keys(e: &Entry) -> Vec<String> {
    if e.zone_ref.is_empty() {
        Vec::new()
    } else {
        vec![format!("{}/{}", e.namespace, e.zone_ref)]
    }
}

fn zone_domain_keys(z: &Zone) -> Vec<String> {
    z.domain_names.clone()
}

fn zone_parent_keys(z: &Zone) -> Vec<String> {
    if z.parent_ref.is_empty() {
        Vec::new()
    } else {
        vec![format!("{}/{}", z.namespace, z.parent_ref)]
    }
}

impl Controller {
    /// Create a controller over the given sources.
    ///
    /// The zone source is only consulted in Primary mode; passing `None`
    /// outside Primary mode is the normal configuration.
    #[must_use]
    pub fn new(
        opts: ControlOpts,
        entry_source: Arc<dyn ResourceSource<CoreDNSEntry>>,
        zone_source: Option<Arc<dyn ResourceSource<HostedZone>>>,
    ) -> Arc<Self> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let first_apex = opts.zones.first().cloned().unwrap_or_else(|| ".".to_string());
        Arc::new(Controller {
            entries: Arc::new(IndexedStore::new(vec![
                (ENTRY_DNS_INDEX, entry_dns_keys),
                (ENTRY_IP_INDEX, entry_ip_keys),
                (ENTRY_ZONE_INDEX, entry_zone_keys),
            ])),
            zones: Arc::new(IndexedStore::new(vec![
                (ZONE_DOMAIN_INDEX, zone_domain_keys),
                (ZONE_PARENT_INDEX, zone_parent_keys),
            ])),
            entry_source,
            zone_source,
            opts,
            queue: Arc::new(WorkQueue::new()),
            modified: Arc::new(AtomicI64::new(0)),
            entry_synced: Arc::new(AtomicBool::new(false)),
            zone_synced: Arc::new(AtomicBool::new(false)),
            stop_tx,
            stop_rx,
            shutdown: Mutex::new(false),
            first_apex,
        })
    }

    /// Start the informers and workers, and run until [`Controller::stop`]
    /// is called.
    pub async fn run(self: &Arc<Self>) {
        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        let shared = InformerShared {
            queue: Arc::clone(&self.queue),
            modified: Arc::clone(&self.modified),
            synced: Arc::clone(&self.entry_synced),
        };
        let entry_source = Arc::clone(&self.entry_source);
        let entry_store = Arc::clone(&self.entries);
        let ctx_mode = self.opts.mode;
        let apex = self.first_apex.clone();
        let stop = self.stop_rx.clone();
        handles.push(tokio::spawn(async move {
            informer::run_informer(
                Kind::Entry,
                entry_source,
                entry_store,
                move |raw: &CoreDNSEntry| {
                    project_entry(raw, &EntryContext { mode: ctx_mode, apex: &apex })
                },
                shared,
                stop,
            )
            .await;
        }));

        if let Some(zone_source) = &self.zone_source {
            let shared = InformerShared {
                queue: Arc::clone(&self.queue),
                modified: Arc::clone(&self.modified),
                synced: Arc::clone(&self.zone_synced),
            };
            let zone_source = Arc::clone(zone_source);
            let zone_store = Arc::clone(&self.zones);
            let nested_allowed = self.opts.mode == Mode::Primary;
            let stop = self.stop_rx.clone();
            if let Some(zone_ref) = &self.opts.zone_ref {
                info!(zone = %zone_ref, "handling zone");
            }
            handles.push(tokio::spawn(async move {
                informer::run_informer(
                    Kind::Zone,
                    zone_source,
                    zone_store,
                    move |raw: &HostedZone| project_zone(raw, &ZoneContext { nested_allowed }),
                    shared,
                    stop,
                )
                .await;
            }));
        } else {
            // no zone informer: the kind counts as synced
            self.zone_synced.store(true, Ordering::SeqCst);
        }

        for no in 0..WORKER_NO {
            let ctrl = Arc::clone(self);
            handles.push(tokio::spawn(async move { ctrl.worker(no).await }));
        }

        let mut stop = self.stop_rx.clone();
        if !*stop.borrow() {
            let _ = stop.changed().await;
        }
        for handle in handles {
            let _ = handle.await;
        }
        info!("controller stopped");
    }

    /// Request shutdown. Idempotence is an error here: the second call
    /// reports "shutdown already in progress".
    pub fn stop(&self) -> Result<(), ControllerError> {
        let mut shutdown = self.shutdown.lock().expect("stop lock poisoned");
        if *shutdown {
            return Err(ControllerError::ShutdownInProgress);
        }
        *shutdown = true;
        self.queue.shut_down();
        let _ = self.stop_tx.send(true);
        Ok(())
    }

    /// Whether every informer has completed its initial list.
    #[must_use]
    pub fn has_synced(&self) -> bool {
        self.entry_synced.load(Ordering::SeqCst)
            && (self.zone_source.is_none() || self.zone_synced.load(Ordering::SeqCst))
    }

    /// Wait for the initial sync, up to 5 seconds, polling every 100ms.
    pub async fn wait_for_sync(&self) {
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(SYNC_WAIT_TIMEOUT_MILLIS);
        while !self.has_synced() {
            if tokio::time::Instant::now() >= deadline {
                info!("proceeding without complete initial sync");
                return;
            }
            tokio::time::sleep(Duration::from_millis(SYNC_POLL_INTERVAL_MILLIS)).await;
        }
    }

    /// Unix timestamp of the most recent meaningful change; doubles as the
    /// SOA serial.
    #[must_use]
    pub fn modified(&self) -> i64 {
        self.modified.load(Ordering::SeqCst)
    }

    /// All cached entries.
    #[must_use]
    pub fn entry_list(&self) -> Vec<Arc<Entry>> {
        self.entries.list()
    }

    /// Entries under a normalised DNS name. When the exact lookup is empty
    /// and the name has more than one label, a single wildcard fallback
    /// replaces the first label with `*`.
    #[must_use]
    pub fn entry_dns_index(&self, name: &str) -> Vec<Arc<Entry>> {
        let exact = self.entries.by_index(ENTRY_DNS_INDEX, name);
        if !exact.is_empty() {
            return exact;
        }
        let labels = split_labels(name);
        if labels.len() > 1 {
            let wildcard = format!("*.{}", join_labels_tail(&labels));
            return self.entries.by_index(ENTRY_DNS_INDEX, &wildcard);
        }
        exact
    }

    /// Entries under an exact normalised DNS name, without the wildcard
    /// fallback. Used for apex lookups, which wildcards never match.
    #[must_use]
    pub fn entry_dns_index_exact(&self, name: &str) -> Vec<Arc<Entry>> {
        self.entries.by_index(ENTRY_DNS_INDEX, name)
    }

    /// Entries carrying the given address literal or CNAME target.
    #[must_use]
    pub fn entry_ip_index(&self, host: &str) -> Vec<Arc<Entry>> {
        self.entries.by_index(ENTRY_IP_INDEX, host)
    }

    /// Entries referencing the given zone.
    #[must_use]
    pub fn entry_zone_index(&self, zone: &ObjectKey) -> Vec<Arc<Entry>> {
        self.entries.by_index(ENTRY_ZONE_INDEX, &zone.to_string())
    }

    /// A zone by namespace/name.
    #[must_use]
    pub fn get_zone(&self, key: &ObjectKey) -> Option<Arc<Zone>> {
        self.zones.get(key)
    }

    /// Zones owning the given normalised domain name.
    #[must_use]
    pub fn zone_domain_index(&self, domain: &str) -> Vec<Arc<Zone>> {
        self.zones.by_index(ZONE_DOMAIN_INDEX, domain)
    }

    /// Zones nested under the given parent.
    #[must_use]
    pub fn zone_parent_index(&self, parent: &ObjectKey) -> Vec<Arc<Zone>> {
        self.zones.by_index(ZONE_PARENT_INDEX, &parent.to_string())
    }

    /// Walk the ancestor chain of `zone` towards its root.
    ///
    /// When `names` is given, it is multiplied at every level with the
    /// level's domain names, producing the effective FQDNs of an entry:
    /// nesting is multiplicative.
    pub fn responsible_for_zone(
        &self,
        zone: &Arc<Zone>,
        mut names: Option<&mut Vec<String>>,
    ) -> ZoneAncestry {
        let Some(zone_ref) = &self.opts.zone_ref else {
            return ZoneAncestry {
                responsible: false,
                root: None,
            };
        };
        if zone.namespace != zone_ref.namespace {
            return ZoneAncestry {
                responsible: false,
                root: None,
            };
        }
        let mut current = Arc::clone(zone);
        let mut visited: BTreeSet<ObjectKey> = BTreeSet::new();
        loop {
            // a parent cycle has no root
            if !visited.insert(current.key()) {
                return ZoneAncestry {
                    responsible: false,
                    root: None,
                };
            }
            if let Some(names) = names.as_mut() {
                aggregate_names(&current, names);
            }
            if current.name == zone_ref.name {
                return ZoneAncestry {
                    responsible: true,
                    root: Some(zone_ref.name.clone()),
                };
            }
            if current.parent_ref.is_empty() {
                return ZoneAncestry {
                    responsible: false,
                    root: Some(current.name.clone()),
                };
            }
            let parent_key = ObjectKey::new(&current.namespace, &current.parent_ref);
            match self.zones.get(&parent_key) {
                Some(parent) => current = parent,
                None => {
                    return ZoneAncestry {
                        responsible: false,
                        root: None,
                    }
                }
            }
        }
    }

    /// Enqueue a zone by key.
    pub(crate) fn enqueue_zone(&self, key: &ObjectKey) {
        self.queue
            .add(RequestKey::new(Kind::Zone, &key.namespace, &key.name));
    }

    /// Enqueue an entry by key.
    pub(crate) fn enqueue_entry(&self, key: &ObjectKey) {
        self.queue
            .add(RequestKey::new(Kind::Entry, &key.namespace, &key.name));
    }

    /// Enqueue every entry referencing the given zone.
    pub(crate) fn trigger_entries_for_zone(&self, key: &ObjectKey) {
        for entry in self.entry_zone_index(key) {
            let k = entry.key();
            debug!(entry = %k, "triggering entry");
            self.enqueue_entry(&k);
        }
    }

    /// Enqueue every zone nested under the given zone.
    pub(crate) fn trigger_nested_zones(&self, key: &ObjectKey) {
        for zone in self.zone_parent_index(key) {
            let k = zone.key();
            debug!(zone = %k, "triggering nested zone");
            self.enqueue_zone(&k);
        }
    }

    /// One worker: drain the queue until shutdown.
    async fn worker(self: Arc<Self>, no: usize) {
        while let Some(key) = self.queue.get().await {
            debug!(worker = no, key = %key, "reconcile");
            let outcome = AssertUnwindSafe(self.dispatch(&key)).catch_unwind().await;
            match outcome {
                Ok(Ok(())) => {
                    metrics::observe_reconcile(&key.kind.to_string(), "success");
                    self.queue.forget(&key);
                }
                Ok(Err(e)) => {
                    error!(worker = no, key = %key, error = %e, "reconcile failed");
                    metrics::observe_reconcile(&key.kind.to_string(), "error");
                    self.queue.add_rate_limited(key.clone());
                }
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(worker = no, key = %key, panic = %reason, "recovered from panic in reconcile");
                    metrics::observe_reconcile(&key.kind.to_string(), "panic");
                    self.queue.add_rate_limited(key.clone());
                }
            }
            self.queue.done(&key);
        }
        info!(worker = no, "stopping worker");
    }

    async fn dispatch(self: &Arc<Self>, key: &RequestKey) -> anyhow::Result<()> {
        let object_key = ObjectKey::new(&key.namespace, &key.name);
        match key.kind {
            Kind::Entry => reconcile_entries::reconcile_entry(self, &object_key).await,
            Kind::Zone => reconcile_zones::reconcile_zone(self, &object_key).await,
        }
    }
}

#[cfg(test)]
impl Controller {
    /// Test hook: pretend the initial sync has completed.
    pub(crate) fn mark_synced(&self) {
        self.entry_synced.store(true, Ordering::SeqCst);
        self.zone_synced.store(true, Ordering::SeqCst);
    }
}

/// Multiply a relative name set with a zone's domain names.
fn aggregate_names(zone: &Zone, names: &mut Vec<String>) {
    let mut result = Vec::with_capacity(names.len() * zone.domain_names.len());
    for name in names.iter() {
        for domain in &zone.domain_names {
            result.push(join_relative(&fqdn(name), domain));
        }
    }
    *names = result;
}

/// Join all labels after the first back into a normalised name.
fn join_labels_tail(labels: &[&str]) -> String {
    let mut out = String::new();
    for label in &labels[1..] {
        out.push_str(label);
        out.push('.');
    }
    out
}
