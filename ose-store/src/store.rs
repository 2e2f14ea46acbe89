use crate::collection::{Collection, Document};
use crate::errors::StoreResult;
use crate::query::Query;
use crate::store_builder::StoreBuilder;
use crate::store_config::StoreConfig;
use dashmap::DashMap;
use itertools::Itertools;
use std::sync::Arc;

/// Registry of named collections and the entry point of the store.
///
/// A store is an explicitly owned value; clones are cheap and share the same
/// collections. Collections are created on first reference and live as long
/// as the store unless dropped with [Store::drop_collection].
///
/// ```rust
/// use ose_store::doc;
/// use ose_store::store::Store;
///
/// let store = Store::new();
/// let coll = store.collection("coll_sample");
/// coll.upsert(doc! { "_key": "sample_item_0", "index": 0 }).unwrap();
///
/// assert!(store.has_collection("coll_sample"));
/// assert_eq!(store.collection("coll_sample").count(), 1);
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// A store with the default configuration.
    pub fn new() -> Self {
        Store::with_config(StoreConfig::new())
    }

    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    pub(crate) fn with_config(config: StoreConfig) -> Self {
        config.freeze();
        Store {
            inner: Arc::new(StoreInner {
                config,
                collections: DashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Returns the collection called `name`, creating it if needed.
    pub fn collection(&self, name: &str) -> Collection {
        if let Some(collection) = self.inner.collections.get(name) {
            return collection.clone();
        }

        self.inner
            .collections
            .entry(name.to_string())
            .or_insert_with(|| {
                log::debug!("Creating collection {}", name);
                Collection::new(name, self.inner.config.clone())
            })
            .clone()
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.inner.collections.contains_key(name)
    }

    /// Names of all collections, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        self.inner
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .sorted()
            .collect()
    }

    /// Forgets the collection called `name`; returns whether it existed.
    ///
    /// Handles obtained before the drop keep working on the detached data,
    /// a later [Store::collection] call starts from an empty collection.
    pub fn drop_collection(&self, name: &str) -> bool {
        let dropped = self.inner.collections.remove(name).is_some();
        if dropped {
            log::debug!("Dropped collection {}", name);
        }
        dropped
    }

    /// Runs a query on the collection named in its `IN` clause.
    pub fn query(&self, query: &str, params: Document) -> StoreResult<Vec<Document>> {
        let parsed = Query::parse(query, &self.inner.config.field_separator())?;
        self.collection(&parsed.collection).find(query, params)
    }
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

struct StoreInner {
    config: StoreConfig,
    collections: DashMap<String, Collection>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::errors::ErrorKind;
    use std::thread;

    #[test]
    fn test_collection_is_idempotent() {
        let store = Store::new();
        let first = store.collection("coll");
        first.upsert(doc! { "_key": "a" }).unwrap();
        let second = store.collection("coll");
        assert_eq!(second.count(), 1);
        assert_eq!(store.collection_names(), vec!["coll"]);
    }

    #[test]
    fn test_collection_names_sorted() {
        let store = Store::new();
        store.collection("b");
        store.collection("c");
        store.collection("a");
        assert_eq!(store.collection_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_drop_collection() {
        let store = Store::new();
        let coll = store.collection("coll");
        coll.upsert(doc! { "_key": "a" }).unwrap();
        assert!(store.drop_collection("coll"));
        assert!(!store.drop_collection("coll"));
        assert!(!store.has_collection("coll"));
        assert!(store.collection("coll").is_empty());
        assert_eq!(coll.count(), 1);
    }

    #[test]
    fn test_store_query() {
        let store = Store::new();
        let coll = store.collection("coll");
        for i in 0..5 {
            coll.upsert(doc! { "_key": (format!("k{}", i)), "n": i }).unwrap();
        }
        let found = store
            .query("FOR d IN coll FILTER d.n >= @n RETURN d", doc! { "n": 3 })
            .unwrap();
        assert_eq!(found.len(), 2);

        let err = store.query("FOR d coll RETURN d", doc! {}).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MalformedQuery);
    }

    #[test]
    fn test_concurrent_collection_creation() {
        let store = Store::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    let coll = store.collection("shared");
                    coll.upsert(doc! { "_key": (format!("t{}", i)) }).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.collection("shared").count(), 8);
        assert_eq!(store.collection_names().len(), 1);
    }
}
