// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The resource-source seam between the controller and the declarative API.
//!
//! [`ResourceSource`] is the narrow interface the informers consume: an
//! initial list, a watch stream from a resource version, and a status patch.
//! [`KubeSource`] implements it on a `kube::Api`; [`MemorySource`] is an
//! in-process implementation used by the integration tests and embedders.
//!
//! When more than one namespace is observed, the Kubernetes watch runs
//! cluster-wide and events are filtered client-side; a single namespace is
//! scoped server-side.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use kube::api::{ListParams, Patch, PatchParams, WatchEvent};
use kube::runtime::watcher;
use kube::{Api, Client, Resource, ResourceExt};
use tracing::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// A list/watch/update-status view onto one resource kind.
#[async_trait]
pub trait ResourceSource<K>: Send + Sync {
    /// List all observed objects, returning them with the collection's
    /// resource version to start the watch from.
    async fn list(&self) -> Result<(Vec<K>, String), kube::Error>;

    /// Open a watch stream from the given resource version.
    async fn watch(
        &self,
        resource_version: &str,
    ) -> Result<BoxStream<'static, Result<WatchEvent<K>, kube::Error>>, kube::Error>;

    /// Merge-patch the status subresource of one object.
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: serde_json::Value,
    ) -> Result<(), kube::Error>;
}

/// [`ResourceSource`] backed by the Kubernetes API.
pub struct KubeSource<K> {
    api: Api<K>,
    client: Client,
    selector: Option<String>,
    // client-side namespace filter, used when watching more than one
    namespaces: Option<BTreeSet<String>>,
}

impl<K> KubeSource<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug,
{
    /// Build a source observing the given namespaces (empty: all) with an
    /// optional label selector.
    #[must_use]
    pub fn new(client: Client, namespaces: &BTreeSet<String>, selector: Option<String>) -> Self {
        let (api, filter) = match namespaces.len() {
            1 => {
                let ns = namespaces.iter().next().expect("one namespace");
                (Api::namespaced(client.clone(), ns), None)
            }
            0 => (Api::all(client.clone()), None),
            _ => (Api::all(client.clone()), Some(namespaces.clone())),
        };
        KubeSource {
            api,
            client,
            selector,
            namespaces: filter,
        }
    }

    fn in_scope(namespaces: &Option<BTreeSet<String>>, obj: &K) -> bool {
        match namespaces {
            None => true,
            Some(set) => obj.namespace().is_some_and(|ns| set.contains(&ns)),
        }
    }
}

#[async_trait]
impl<K> ResourceSource<K> for KubeSource<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
{
    async fn list(&self) -> Result<(Vec<K>, String), kube::Error> {
        let mut params = ListParams::default();
        if let Some(selector) = &self.selector {
            params = params.labels(selector);
        }
        let list = self.api.list(&params).await?;
        let rv = list.metadata.resource_version.unwrap_or_default();
        let namespaces = self.namespaces.clone();
        let items = list
            .items
            .into_iter()
            .filter(|obj| Self::in_scope(&namespaces, obj))
            .collect();
        Ok((items, rv))
    }

    async fn watch(
        &self,
        _resource_version: &str,
    ) -> Result<BoxStream<'static, Result<WatchEvent<K>, kube::Error>>, kube::Error> {
        // kube-runtime's watcher owns the Api, handles relists and backoff,
        // and hands the pages back as apply/delete events.
        let mut config = watcher::Config::default();
        if let Some(selector) = &self.selector {
            config = config.labels(selector);
        }
        let namespaces = self.namespaces.clone();
        let stream = watcher(self.api.clone(), config).filter_map(move |event| {
            let mapped = match event {
                Ok(watcher::Event::Apply(obj) | watcher::Event::InitApply(obj)) => {
                    Self::in_scope(&namespaces, &obj).then(|| Ok(WatchEvent::Modified(obj)))
                }
                Ok(watcher::Event::Delete(obj)) => {
                    Self::in_scope(&namespaces, &obj).then(|| Ok(WatchEvent::Deleted(obj)))
                }
                Ok(watcher::Event::Init | watcher::Event::InitDone) => None,
                Err(e) => {
                    // the watcher retries internally; surface the hiccup
                    warn!(error = %e, "watch stream error");
                    None
                }
            };
            futures::future::ready(mapped)
        });
        Ok(stream.boxed())
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: serde_json::Value,
    ) -> Result<(), kube::Error> {
        // Patch through a namespaced view so multi-namespace sources write to
        // the right object.
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.patch_status(
            name,
            &PatchParams::default(),
            &Patch::Merge(serde_json::json!({ "status": status })),
        )
        .await?;
        Ok(())
    }
}

/// An in-process [`ResourceSource`] for tests and embedders.
///
/// Drive it with [`MemorySource::apply`] and [`MemorySource::remove`]; status
/// patches are merged back into the stored objects and recorded for
/// inspection.
pub struct MemorySource<K> {
    state: Mutex<HashMap<String, K>>,
    version: AtomicU64,
    events: broadcast::Sender<MemoryEvent<K>>,
    // pre-subscribed at construction so no event can fall between a
    // consumer's list() and its first watch()
    first_watch: Mutex<Option<broadcast::Receiver<MemoryEvent<K>>>>,
    patches: Mutex<Vec<(String, serde_json::Value)>>,
}

#[derive(Clone)]
enum MemoryEvent<K> {
    Applied(K),
    Deleted(K),
}

impl<K> Default for MemorySource<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> MemorySource<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + 'static,
{
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        let (events, first) = broadcast::channel(256);
        MemorySource {
            state: Mutex::new(HashMap::new()),
            version: AtomicU64::new(0),
            events,
            first_watch: Mutex::new(Some(first)),
            patches: Mutex::new(Vec::new()),
        }
    }

    fn object_key(obj: &K) -> String {
        format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// Create or update an object, stamping a fresh resource version.
    pub fn apply(&self, mut obj: K) {
        let rv = self.next_version();
        obj.meta_mut().resource_version = Some(rv);
        let key = Self::object_key(&obj);
        self.state
            .lock()
            .expect("source lock poisoned")
            .insert(key, obj.clone());
        let _ = self.events.send(MemoryEvent::Applied(obj));
    }

    /// Delete an object by namespace and name.
    pub fn remove(&self, namespace: &str, name: &str) {
        let key = format!("{namespace}/{name}");
        let old = self.state.lock().expect("source lock poisoned").remove(&key);
        if let Some(obj) = old {
            let _ = self.events.send(MemoryEvent::Deleted(obj));
        }
    }

    /// A copy of one stored object.
    #[must_use]
    pub fn get(&self, namespace: &str, name: &str) -> Option<K> {
        self.state
            .lock()
            .expect("source lock poisoned")
            .get(&format!("{namespace}/{name}"))
            .cloned()
    }

    /// All recorded status patches, as `(namespace/name, status)` pairs.
    #[must_use]
    pub fn recorded_patches(&self) -> Vec<(String, serde_json::Value)> {
        self.patches.lock().expect("source lock poisoned").clone()
    }
}

#[async_trait]
impl<K> ResourceSource<K> for MemorySource<K>
where
    K: Resource<DynamicType = ()>
        + Clone
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn list(&self) -> Result<(Vec<K>, String), kube::Error> {
        let items: Vec<K> = self
            .state
            .lock()
            .expect("source lock poisoned")
            .values()
            .cloned()
            .collect();
        let rv = self.version.load(Ordering::SeqCst).to_string();
        Ok((items, rv))
    }

    async fn watch(
        &self,
        _resource_version: &str,
    ) -> Result<BoxStream<'static, Result<WatchEvent<K>, kube::Error>>, kube::Error> {
        let rx = self
            .first_watch
            .lock()
            .expect("source lock poisoned")
            .take()
            .unwrap_or_else(|| self.events.subscribe());
        let stream = BroadcastStream::new(rx).filter_map(|event| {
            let mapped = match event {
                Ok(MemoryEvent::Applied(obj)) => Some(Ok(WatchEvent::Modified(obj))),
                Ok(MemoryEvent::Deleted(obj)) => Some(Ok(WatchEvent::Deleted(obj))),
                // lagged receivers just miss events, like a real watch would
                Err(_) => None,
            };
            futures::future::ready(mapped)
        });
        Ok(stream.boxed())
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: serde_json::Value,
    ) -> Result<(), kube::Error> {
        let key = format!("{namespace}/{name}");
        self.patches
            .lock()
            .expect("source lock poisoned")
            .push((key.clone(), status.clone()));

        let updated = {
            let mut state = self.state.lock().expect("source lock poisoned");
            let Some(obj) = state.get(&key) else {
                return Ok(());
            };
            let mut value = serde_json::to_value(obj).map_err(kube::Error::SerdeError)?;
            // merge-patch semantics, one level deep, like the real API
            if let (Some(serde_json::Value::Object(existing)), serde_json::Value::Object(patch)) =
                (value.get_mut("status"), status.clone())
            {
                for (k, v) in patch {
                    existing.insert(k, v);
                }
            } else {
                value["status"] = status;
            }
            let mut patched: K =
                serde_json::from_value(value).map_err(kube::Error::SerdeError)?;
            patched.meta_mut().resource_version = Some(self.next_version());
            state.insert(key, patched.clone());
            patched
        };
        let _ = self.events.send(MemoryEvent::Applied(updated));
        Ok(())
    }
}
