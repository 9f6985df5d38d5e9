// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The multi-index read model shared by the controller and the DNS path.
//!
//! [`IndexedStore`] keeps projected objects under their `namespace/name` key
//! plus any number of named secondary indexes, all behind a single `RwLock`.
//! Readers receive `Arc` snapshots, never references into the store, so the
//! DNS path can hold results across await points while informer callbacks
//! keep writing. Insert and delete maintain every index atomically per
//! object.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};

/// A `namespace/name` object key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Object namespace.
    pub namespace: String,
    /// Object name.
    pub name: String,
}

impl ObjectKey {
    /// Build a key from namespace and name.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        ObjectKey {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Objects held by an [`IndexedStore`].
pub trait StoreObject: Clone + Send + Sync + 'static {
    /// The primary key of the object.
    fn key(&self) -> ObjectKey;

    /// The observed resource version; updates carrying an unchanged version
    /// are no-ops.
    fn resource_version(&self) -> &str;

    /// Whether an update is semantically meaningful. Equivalent updates are
    /// still stored but do not enqueue a reconcile.
    fn equivalent(&self, other: &Self) -> bool;
}

/// A function deriving secondary-index keys from an object.
pub type IndexFn<T> = fn(&T) -> Vec<String>;

struct StoreState<T> {
    objects: HashMap<ObjectKey, Arc<T>>,
    // index name -> index key -> object keys
    indexes: HashMap<&'static str, HashMap<String, BTreeSet<ObjectKey>>>,
}

/// A string-keyed multi-index object store.
pub struct IndexedStore<T: StoreObject> {
    state: RwLock<StoreState<T>>,
    indexers: Vec<(&'static str, IndexFn<T>)>,
}

impl<T: StoreObject> IndexedStore<T> {
    /// Create a store with the given named indexers.
    #[must_use]
    pub fn new(indexers: Vec<(&'static str, IndexFn<T>)>) -> Self {
        let mut indexes = HashMap::new();
        for (name, _) in &indexers {
            indexes.insert(*name, HashMap::new());
        }
        IndexedStore {
            state: RwLock::new(StoreState {
                objects: HashMap::new(),
                indexes,
            }),
            indexers,
        }
    }

    /// Insert or update an object, returning the previous version if any.
    pub fn insert(&self, obj: T) -> Option<Arc<T>> {
        let key = obj.key();
        let obj = Arc::new(obj);
        let mut state = self.state.write().expect("store lock poisoned");
        let old = state.objects.insert(key.clone(), Arc::clone(&obj));
        if let Some(old) = &old {
            unindex(&mut state, &self.indexers, old, &key);
        }
        index(&mut state, &self.indexers, &obj, &key);
        old
    }

    /// Remove an object, returning it if it was present.
    pub fn delete(&self, key: &ObjectKey) -> Option<Arc<T>> {
        let mut state = self.state.write().expect("store lock poisoned");
        let old = state.objects.remove(key);
        if let Some(old) = &old {
            unindex(&mut state, &self.indexers, old, key);
        }
        old
    }

    /// Replace the entire content with a freshly listed set of objects.
    pub fn replace(&self, objs: Vec<T>) {
        let mut state = self.state.write().expect("store lock poisoned");
        state.objects.clear();
        for map in state.indexes.values_mut() {
            map.clear();
        }
        for obj in objs {
            let key = obj.key();
            let obj = Arc::new(obj);
            index(&mut state, &self.indexers, &obj, &key);
            state.objects.insert(key, obj);
        }
    }

    /// Look up an object by its primary key.
    #[must_use]
    pub fn get(&self, key: &ObjectKey) -> Option<Arc<T>> {
        self.state
            .read()
            .expect("store lock poisoned")
            .objects
            .get(key)
            .cloned()
    }

    /// All objects under the given secondary-index key.
    #[must_use]
    pub fn by_index(&self, index: &str, key: &str) -> Vec<Arc<T>> {
        let state = self.state.read().expect("store lock poisoned");
        let Some(keys) = state.indexes.get(index).and_then(|m| m.get(key)) else {
            return Vec::new();
        };
        keys.iter()
            .filter_map(|k| state.objects.get(k).cloned())
            .collect()
    }

    /// A snapshot of every stored object.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<T>> {
        self.state
            .read()
            .expect("store lock poisoned")
            .objects
            .values()
            .cloned()
            .collect()
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().expect("store lock poisoned").objects.len()
    }

    /// Whether the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn index<T: StoreObject>(
    state: &mut StoreState<T>,
    indexers: &[(&'static str, IndexFn<T>)],
    obj: &Arc<T>,
    key: &ObjectKey,
) {
    for (name, f) in indexers {
        let map = state.indexes.get_mut(name).expect("index registered");
        for idx_key in f(obj) {
            map.entry(idx_key).or_default().insert(key.clone());
        }
    }
}

fn unindex<T: StoreObject>(
    state: &mut StoreState<T>,
    indexers: &[(&'static str, IndexFn<T>)],
    obj: &Arc<T>,
    key: &ObjectKey,
) {
    for (name, f) in indexers {
        let map = state.indexes.get_mut(name).expect("index registered");
        for idx_key in f(obj) {
            if let Some(set) = map.get_mut(&idx_key) {
                set.remove(key);
                if set.is_empty() {
                    map.remove(&idx_key);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
