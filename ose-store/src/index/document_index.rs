use crate::collection::Document;
use crate::common::Value;
use crate::index::IndexDescriptor;
use indexmap::IndexSet;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// One component of an index tuple.
///
/// A document lacking an indexed field is indexed under [IndexValue::Missing],
/// which is distinct from an explicit `null` and sorts before every value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexValue {
    Missing,
    Present(Value),
}

/// The composite field-value tuple a document is indexed under.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexKey(SmallVec<[IndexValue; 2]>);

impl IndexKey {
    /// Extracts the tuple of `descriptor`'s fields from `document`.
    pub fn from_document(document: &Document, descriptor: &IndexDescriptor, separator: &str) -> Self {
        IndexKey(
            descriptor
                .fields()
                .field_names()
                .iter()
                .map(|field| match document.get_path(field, separator) {
                    Some(value) => IndexValue::Present(value.clone()),
                    None => IndexValue::Missing,
                })
                .collect(),
        )
    }

    /// Builds a lookup tuple from present values.
    pub fn from_values(values: &[Value]) -> Self {
        IndexKey(values.iter().cloned().map(IndexValue::Present).collect())
    }
}

/// An in-memory secondary index over one or more fields.
///
/// Maps each tuple to the keys of the documents holding it. Tuples are kept in
/// value order; the keys of one tuple are kept in the order they entered the
/// index.
pub(crate) struct DocumentIndex {
    descriptor: IndexDescriptor,
    entries: BTreeMap<IndexKey, IndexSet<String>>,
}

impl DocumentIndex {
    pub fn new(descriptor: IndexDescriptor) -> Self {
        DocumentIndex {
            descriptor,
            entries: BTreeMap::new(),
        }
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    pub fn index_key(&self, document: &Document, separator: &str) -> IndexKey {
        IndexKey::from_document(document, &self.descriptor, separator)
    }

    /// For a unique index, returns the key of another document already
    /// holding `index_key`.
    pub fn conflicting_key(&self, index_key: &IndexKey, key: &str) -> Option<&String> {
        if !self.descriptor.is_unique() {
            return None;
        }
        self.entries
            .get(index_key)
            .and_then(|keys| keys.iter().find(|existing| existing.as_str() != key))
    }

    pub fn insert(&mut self, index_key: IndexKey, key: &str) {
        self.entries.entry(index_key).or_default().insert(key.to_string());
    }

    pub fn remove(&mut self, index_key: &IndexKey, key: &str) {
        if let Some(keys) = self.entries.get_mut(index_key) {
            keys.shift_remove(key);
            if keys.is_empty() {
                self.entries.remove(index_key);
            }
        }
    }

    pub fn get(&self, index_key: &IndexKey) -> Option<&IndexSet<String>> {
        self.entries.get(index_key)
    }

    /// Number of indexed document keys.
    pub fn key_count(&self) -> usize {
        self.entries.values().map(IndexSet::len).sum()
    }
}
