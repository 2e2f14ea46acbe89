use crate::collection::Document;
use crate::common::{Fields, Value};
use crate::errors::{ErrorKind, StoreError, StoreResult};
use crate::index::{DocumentIndex, IndexDescriptor, IndexKey};
use indexmap::IndexMap;

/// Owns every index of one collection and keeps them in step with the
/// collection's documents.
///
/// The manager is not synchronized on its own: it lives inside the
/// collection's state and is only touched while the collection lock is held,
/// which makes every index update atomic with the document write it derives
/// from.
pub(crate) struct IndexManager {
    collection_name: String,
    separator: String,
    indexes: IndexMap<Fields, DocumentIndex>,
}

impl IndexManager {
    pub fn new(collection_name: &str, separator: &str) -> Self {
        IndexManager {
            collection_name: collection_name.to_string(),
            separator: separator.to_string(),
            indexes: IndexMap::new(),
        }
    }

    /// Registers and backfills an index over `fields`.
    ///
    /// Returns `false` when an identical index already exists. The new index is
    /// fully built before it is installed, so a uniqueness failure leaves the
    /// manager untouched.
    pub fn add_index<'a>(
        &mut self,
        fields: Fields,
        unique: bool,
        documents: impl Iterator<Item = (&'a String, &'a Document)>,
    ) -> StoreResult<bool> {
        if let Some(existing) = self.indexes.get(&fields) {
            if existing.descriptor().is_unique() == unique {
                log::debug!("Index {} already exists", existing.descriptor());
                return Ok(false);
            }
            log::error!(
                "Cannot create index on {} of {}, {} already exists",
                fields,
                self.collection_name,
                existing.descriptor()
            );
            return Err(StoreError::new(
                &format!("An index on {} already exists with a different uniqueness", fields),
                ErrorKind::IndexAlreadyExists,
            ));
        }

        let descriptor = IndexDescriptor::new(fields.clone(), unique, &self.collection_name);
        let mut index = DocumentIndex::new(descriptor);
        for (key, document) in documents {
            let index_key = index.index_key(document, &self.separator);
            if let Some(existing) = index.conflicting_key(&index_key, key) {
                log::error!(
                    "Cannot create unique index on {} of {}: documents {} and {} share {:?}",
                    fields,
                    self.collection_name,
                    existing,
                    key,
                    index_key
                );
                return Err(StoreError::new(
                    &format!(
                        "Unique index on {} violated by documents {} and {}",
                        fields, existing, key
                    ),
                    ErrorKind::DuplicateKeyViolation,
                ));
            }
            index.insert(index_key, key);
        }

        log::debug!(
            "Created {} with {} entries",
            index.descriptor(),
            index.key_count()
        );
        self.indexes.insert(fields, index);
        Ok(true)
    }

    pub fn remove_index(&mut self, fields: &Fields) -> StoreResult<()> {
        match self.indexes.shift_remove(fields) {
            Some(index) => {
                log::debug!("Dropped {}", index.descriptor());
                Ok(())
            }
            None => {
                log::error!("No index on {} of {}", fields, self.collection_name);
                Err(StoreError::new(
                    &format!("No index found on {}", fields),
                    ErrorKind::IndexNotFound,
                ))
            }
        }
    }

    pub fn has_index(&self, fields: &Fields) -> bool {
        self.indexes.contains_key(fields)
    }

    pub fn list_indexes(&self) -> Vec<IndexDescriptor> {
        self.indexes
            .values()
            .map(|index| index.descriptor().clone())
            .collect()
    }

    pub fn find_exact_index(&self, fields: &Fields) -> Option<&DocumentIndex> {
        self.indexes.get(fields)
    }

    /// Finds an index whose field set equals `names`, preferring one declared
    /// in the same order.
    pub fn find_index_for(&self, names: &[String]) -> Option<&DocumentIndex> {
        if names.is_empty() {
            return None;
        }

        let mut candidate = None;
        for (fields, index) in self.indexes.iter() {
            if fields.field_names() == names {
                return Some(index);
            }
            if candidate.is_none() && fields.same_set(names) {
                candidate = Some(index);
            }
        }
        candidate
    }

    /// Rejects a write that would break a unique index.
    ///
    /// Must be called before the write is applied.
    pub fn validate_write(&self, key: &str, document: &Document) -> StoreResult<()> {
        for index in self.indexes.values() {
            let index_key = index.index_key(document, &self.separator);
            if let Some(existing) = index.conflicting_key(&index_key, key) {
                log::error!(
                    "Document {} violates {}: {:?} is already indexed for {}",
                    key,
                    index.descriptor(),
                    index_key,
                    existing
                );
                return Err(StoreError::new(
                    &format!(
                        "Unique index on {} already contains document {} with the same values",
                        index.descriptor().fields(),
                        existing
                    ),
                    ErrorKind::DuplicateKeyViolation,
                ));
            }
        }
        Ok(())
    }

    /// Moves `key` from its old tuple to its new tuple in every index.
    pub fn on_write(&mut self, key: &str, old: Option<&Document>, new: &Document) {
        for index in self.indexes.values_mut() {
            let new_key = index.index_key(new, &self.separator);
            if let Some(old) = old {
                let old_key = index.index_key(old, &self.separator);
                if old_key == new_key {
                    continue;
                }
                index.remove(&old_key, key);
            }
            index.insert(new_key, key);
        }
    }

    pub fn on_delete(&mut self, key: &str, document: &Document) {
        for index in self.indexes.values_mut() {
            let index_key = index.index_key(document, &self.separator);
            index.remove(&index_key, key);
        }
    }

    /// Returns the keys indexed under `values` in the index over exactly
    /// `fields`.
    ///
    /// # Errors
    ///
    /// `IndexNotFound` when no such index exists; `ValidationError` when the
    /// number of values does not match the number of fields.
    pub fn lookup_equal(&self, fields: &Fields, values: &[Value]) -> StoreResult<Vec<String>> {
        let index = self.find_exact_index(fields).ok_or_else(|| {
            log::error!("No index on {} of {} for lookup", fields, self.collection_name);
            StoreError::new(
                &format!("No index found on {}", fields),
                ErrorKind::IndexNotFound,
            )
        })?;

        if values.len() != fields.len() {
            log::error!("Lookup on {} with {} values", fields, values.len());
            return Err(StoreError::new(
                &format!("Expected {} values for {}", fields.len(), fields),
                ErrorKind::ValidationError,
            ));
        }

        Ok(index
            .get(&IndexKey::from_values(values))
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, val};

    fn documents() -> IndexMap<String, Document> {
        let mut docs = IndexMap::new();
        docs.insert("a".to_string(), doc! { "_key": "a", "x": 1, "y": "p" });
        docs.insert("b".to_string(), doc! { "_key": "b", "x": 2, "y": "p" });
        docs.insert("c".to_string(), doc! { "_key": "c", "y": "q" });
        docs
    }

    fn fields(names: Vec<&str>) -> Fields {
        Fields::with_names(names).unwrap()
    }

    #[test]
    fn test_add_index_backfills() {
        let docs = documents();
        let mut manager = IndexManager::new("test", ".");
        assert!(manager.add_index(fields(vec!["y"]), false, docs.iter()).unwrap());

        let keys = manager.lookup_equal(&fields(vec!["y"]), &[val!("p")]).unwrap();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_add_same_index_is_noop() {
        let docs = documents();
        let mut manager = IndexManager::new("test", ".");
        assert!(manager.add_index(fields(vec!["y"]), false, docs.iter()).unwrap());
        assert!(!manager.add_index(fields(vec!["y"]), false, docs.iter()).unwrap());
        assert_eq!(manager.list_indexes().len(), 1);
    }

    #[test]
    fn test_add_index_with_other_uniqueness_fails() {
        let docs = documents();
        let mut manager = IndexManager::new("test", ".");
        manager.add_index(fields(vec!["x"]), false, docs.iter()).unwrap();
        let err = manager.add_index(fields(vec!["x"]), true, docs.iter()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IndexAlreadyExists);
    }

    #[test]
    fn test_unique_backfill_violation_installs_nothing() {
        let docs = documents();
        let mut manager = IndexManager::new("test", ".");
        let err = manager.add_index(fields(vec!["y"]), true, docs.iter()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DuplicateKeyViolation);
        assert!(!manager.has_index(&fields(vec!["y"])));
    }

    #[test]
    fn test_unique_allows_single_missing() {
        let docs = documents();
        let mut manager = IndexManager::new("test", ".");
        assert!(manager.add_index(fields(vec!["x"]), true, docs.iter()).unwrap());

        let err = manager
            .validate_write("d", &doc! { "_key": "d", "y": "r" })
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DuplicateKeyViolation);
        manager.validate_write("d", &doc! { "_key": "d", "x": null }).unwrap();
    }

    #[test]
    fn test_unique_backfill_rejects_two_missing() {
        let mut docs = documents();
        docs.insert("d".to_string(), doc! { "_key": "d", "y": "r" });
        let mut manager = IndexManager::new("test", ".");
        let err = manager
            .add_index(fields(vec!["x"]), true, docs.iter())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DuplicateKeyViolation);
        assert!(!manager.has_index(&fields(vec!["x"])));
    }

    #[test]
    fn test_validate_write_rejects_duplicate() {
        let docs = documents();
        let mut manager = IndexManager::new("test", ".");
        manager.add_index(fields(vec!["x"]), true, docs.iter()).unwrap();

        let err = manager
            .validate_write("d", &doc! { "_key": "d", "x": 1 })
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DuplicateKeyViolation);

        // replacing the owner of the tuple is fine
        manager.validate_write("a", &doc! { "_key": "a", "x": 1 }).unwrap();
    }

    #[test]
    fn test_on_write_moves_key() {
        let docs = documents();
        let mut manager = IndexManager::new("test", ".");
        manager.add_index(fields(vec!["x"]), false, docs.iter()).unwrap();

        let old = docs.get("a").unwrap();
        let new = doc! { "_key": "a", "x": 5 };
        manager.on_write("a", Some(old), &new);

        assert!(manager.lookup_equal(&fields(vec!["x"]), &[val!(1)]).unwrap().is_empty());
        assert_eq!(manager.lookup_equal(&fields(vec!["x"]), &[val!(5)]).unwrap(), vec!["a"]);
    }

    #[test]
    fn test_on_delete_removes_key() {
        let docs = documents();
        let mut manager = IndexManager::new("test", ".");
        manager.add_index(fields(vec!["y"]), false, docs.iter()).unwrap();
        manager.on_delete("a", docs.get("a").unwrap());
        assert_eq!(manager.lookup_equal(&fields(vec!["y"]), &[val!("p")]).unwrap(), vec!["b"]);
    }

    #[test]
    fn test_lookup_without_index() {
        let manager = IndexManager::new("test", ".");
        let err = manager.lookup_equal(&fields(vec!["y"]), &[val!("p")]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IndexNotFound);
    }

    #[test]
    fn test_lookup_wrong_arity() {
        let docs = documents();
        let mut manager = IndexManager::new("test", ".");
        manager.add_index(fields(vec!["x", "y"]), false, docs.iter()).unwrap();
        let err = manager.lookup_equal(&fields(vec!["x", "y"]), &[val!(1)]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
        assert_eq!(
            manager.lookup_equal(&fields(vec!["x", "y"]), &[val!(1), val!("p")]).unwrap(),
            vec!["a"]
        );
    }

    #[test]
    fn test_find_index_for_field_set() {
        let docs = documents();
        let mut manager = IndexManager::new("test", ".");
        manager.add_index(fields(vec!["y", "x"]), false, docs.iter()).unwrap();
        let names = vec!["x".to_string(), "y".to_string()];
        let index = manager.find_index_for(&names).unwrap();
        assert_eq!(index.descriptor().fields(), &fields(vec!["y", "x"]));
        assert!(manager.find_index_for(&["x".to_string()]).is_none());
    }

    #[test]
    fn test_remove_index() {
        let docs = documents();
        let mut manager = IndexManager::new("test", ".");
        manager.add_index(fields(vec!["y"]), false, docs.iter()).unwrap();
        manager.remove_index(&fields(vec!["y"])).unwrap();
        assert!(!manager.has_index(&fields(vec!["y"])));
        let err = manager.remove_index(&fields(vec!["y"])).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IndexNotFound);
    }
}
