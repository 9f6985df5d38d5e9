// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The informer loop: list, then watch, applying every event to the indexed
//! store under a per-object serialisation discipline.
//!
//! Each resource kind runs one informer task. The initial list replaces the
//! store content, marks the kind synced and enqueues every object; watch
//! events are projected, version-checked (unchanged resource versions are
//! no-ops) and compared with the stored projection so that only semantically
//! meaningful updates enqueue a reconcile. A failed watch falls back to a
//! fresh list after a short delay.

use crate::cache::{IndexedStore, StoreObject};
use crate::controller::queue::{Kind, RequestKey, WorkQueue};
use crate::controller::source::ResourceSource;
use crate::constants::RELIST_BACKOFF_MILLIS;
use crate::metrics;
use futures::StreamExt;
use kube::api::WatchEvent;
use kube::ResourceExt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// State shared between the informers and the controller.
#[derive(Clone)]
pub(crate) struct InformerShared {
    pub(crate) queue: Arc<WorkQueue>,
    pub(crate) modified: Arc<AtomicI64>,
    pub(crate) synced: Arc<AtomicBool>,
}

impl InformerShared {
    /// Advance the modified timestamp (the SOA serial) monotonically.
    fn touch_modified(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        self.modified.fetch_max(now, Ordering::SeqCst);
    }
}

/// Run the informer for one kind until the stop channel fires.
pub(crate) async fn run_informer<K, P>(
    kind: Kind,
    source: Arc<dyn ResourceSource<K>>,
    store: Arc<IndexedStore<P>>,
    project: impl Fn(&K) -> P + Send + Sync,
    shared: InformerShared,
    mut stop: watch::Receiver<bool>,
) where
    K: ResourceExt + Send + Sync + 'static,
    P: StoreObject,
{
    loop {
        if *stop.borrow() {
            return;
        }

        let (items, mut resource_version) = match source.list().await {
            Ok(listed) => listed,
            Err(e) => {
                warn!(kind = %kind, error = %e, "list failed, retrying");
                if sleep_or_stop(&mut stop).await {
                    return;
                }
                continue;
            }
        };

        let projected: Vec<P> = items.iter().map(&project).collect();
        let keys: Vec<_> = projected.iter().map(StoreObject::key).collect();
        store.replace(projected);
        metrics::set_cache_objects(&kind.to_string(), store.len());
        shared.synced.store(true, Ordering::SeqCst);
        shared.touch_modified();
        info!(kind = %kind, objects = keys.len(), "initial sync complete");
        for key in keys {
            shared
                .queue
                .add(RequestKey::new(kind, key.namespace, key.name));
        }

        let mut stream = match source.watch(&resource_version).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(kind = %kind, error = %e, "watch failed, relisting");
                if sleep_or_stop(&mut stop).await {
                    return;
                }
                continue;
            }
        };

        loop {
            let event = tokio::select! {
                _ = stop.changed() => return,
                event = stream.next() => event,
            };
            match event {
                Some(Ok(WatchEvent::Added(obj) | WatchEvent::Modified(obj))) => {
                    if let Some(rv) = obj.resource_version() {
                        resource_version = rv;
                    }
                    apply(&kind, &store, &project, &obj, &shared);
                }
                Some(Ok(WatchEvent::Deleted(obj))) => {
                    if let Some(rv) = obj.resource_version() {
                        resource_version = rv;
                    }
                    let projected = project(&obj);
                    let key = projected.key();
                    store.delete(&key);
                    metrics::set_cache_objects(&kind.to_string(), store.len());
                    shared.touch_modified();
                    debug!(kind = %kind, key = %key, "deleted");
                    shared
                        .queue
                        .add(RequestKey::new(kind, key.namespace, key.name));
                }
                Some(Ok(WatchEvent::Bookmark(bookmark))) => {
                    resource_version = bookmark.metadata.resource_version;
                }
                Some(Ok(WatchEvent::Error(e))) => {
                    warn!(kind = %kind, code = e.code, message = %e.message, "watch error, relisting");
                    break;
                }
                Some(Err(e)) => {
                    warn!(kind = %kind, error = %e, "watch stream failed, relisting");
                    break;
                }
                None => {
                    debug!(kind = %kind, "watch stream ended, relisting");
                    break;
                }
            }
        }

        if sleep_or_stop(&mut stop).await {
            return;
        }
    }
}

/// Apply an add/update event to the store, enqueueing only meaningful
/// changes.
fn apply<K, P>(
    kind: &Kind,
    store: &IndexedStore<P>,
    project: &(impl Fn(&K) -> P + Send + Sync),
    obj: &K,
    shared: &InformerShared,
) where
    K: ResourceExt,
    P: StoreObject,
{
    let projected = project(obj);
    let key = projected.key();

    let meaningful = match store.get(&key) {
        Some(old) if old.resource_version() == projected.resource_version() => return,
        Some(old) => !old.equivalent(&projected),
        None => true,
    };
    store.insert(projected);
    metrics::set_cache_objects(&kind.to_string(), store.len());

    if meaningful {
        shared.touch_modified();
        debug!(kind = %kind, key = %key, "changed");
        shared
            .queue
            .add(RequestKey::new(*kind, key.namespace, key.name));
    }
}

/// Sleep the relist backoff; true when the stop channel fired instead.
async fn sleep_or_stop(stop: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = stop.changed() => true,
        () = tokio::time::sleep(Duration::from_millis(RELIST_BACKOFF_MILLIS)) => *stop.borrow(),
    }
}
