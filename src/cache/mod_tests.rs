// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the indexed store.

#[cfg(test)]
mod tests {
    use crate::cache::{IndexedStore, ObjectKey, StoreObject};

    #[derive(Clone, Debug, PartialEq)]
    struct Item {
        namespace: String,
        name: String,
        version: String,
        names: Vec<String>,
    }

    impl Item {
        fn new(namespace: &str, name: &str, names: &[&str]) -> Self {
            Item {
                namespace: namespace.to_string(),
                name: name.to_string(),
                version: "1".to_string(),
                names: names.iter().map(|n| (*n).to_string()).collect(),
            }
        }
    }

    impl StoreObject for Item {
        fn key(&self) -> ObjectKey {
            ObjectKey::new(&self.namespace, &self.name)
        }

        fn resource_version(&self) -> &str {
            &self.version
        }

        fn equivalent(&self, other: &Self) -> bool {
            self.names == other.names
        }
    }

    fn store() -> IndexedStore<Item> {
        IndexedStore::new(vec![("names", |item: &Item| item.names.clone())])
    }

    #[test]
    fn test_insert_get_delete() {
        let store = store();
        assert!(store.is_empty());

        let item = Item::new("ns", "a", &["www.example.org."]);
        assert!(store.insert(item.clone()).is_none());
        assert_eq!(store.len(), 1);

        let key = ObjectKey::new("ns", "a");
        assert_eq!(store.get(&key).as_deref(), Some(&item));

        let removed = store.delete(&key);
        assert_eq!(removed.as_deref(), Some(&item));
        assert!(store.get(&key).is_none());
    }

    #[test]
    fn test_index_lookup_and_multiple_hits() {
        let store = store();
        store.insert(Item::new("ns", "a", &["www.example.org."]));
        store.insert(Item::new("ns", "b", &["www.example.org.", "api.example.org."]));

        let hits = store.by_index("names", "www.example.org.");
        assert_eq!(hits.len(), 2);
        let hits = store.by_index("names", "api.example.org.");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "b");
        assert!(store.by_index("names", "missing.").is_empty());
    }

    #[test]
    fn test_update_moves_index_entries() {
        let store = store();
        store.insert(Item::new("ns", "a", &["old.example.org."]));

        let mut updated = Item::new("ns", "a", &["new.example.org."]);
        updated.version = "2".to_string();
        let old = store.insert(updated);
        assert_eq!(old.unwrap().names, vec!["old.example.org.".to_string()]);

        assert!(store.by_index("names", "old.example.org.").is_empty());
        assert_eq!(store.by_index("names", "new.example.org.").len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_clears_every_index() {
        let store = store();
        store.insert(Item::new("ns", "a", &["one.", "two.", "three."]));
        store.delete(&ObjectKey::new("ns", "a"));
        for key in ["one.", "two.", "three."] {
            assert!(store.by_index("names", key).is_empty());
        }
    }

    #[test]
    fn test_replace_resets_content_and_indexes() {
        let store = store();
        store.insert(Item::new("ns", "stale", &["stale.example.org."]));

        store.replace(vec![
            Item::new("ns", "a", &["a.example.org."]),
            Item::new("ns", "b", &["b.example.org."]),
        ]);

        assert_eq!(store.len(), 2);
        assert!(store.get(&ObjectKey::new("ns", "stale")).is_none());
        assert!(store.by_index("names", "stale.example.org.").is_empty());
        assert_eq!(store.by_index("names", "a.example.org.").len(), 1);
    }

    #[test]
    fn test_readers_hold_snapshots() {
        let store = store();
        store.insert(Item::new("ns", "a", &["www.example.org."]));
        let snapshot = store.get(&ObjectKey::new("ns", "a")).unwrap();

        let mut updated = Item::new("ns", "a", &["changed.example.org."]);
        updated.version = "2".to_string();
        store.insert(updated);

        // the earlier snapshot is unaffected by the write
        assert_eq!(snapshot.names, vec!["www.example.org.".to_string()]);
    }

    #[test]
    fn test_objects_sharing_an_index_key_keep_identity() {
        let store = store();
        store.insert(Item::new("ns1", "same", &["shared."]));
        store.insert(Item::new("ns2", "same", &["shared."]));
        assert_eq!(store.len(), 2);

        store.delete(&ObjectKey::new("ns1", "same"));
        let hits = store.by_index("names", "shared.");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].namespace, "ns2");
    }
}
