use crate::collection::Document;
use crate::common::{Fields, ReadExecutor, SortOrder, Value, WriteExecutor};
use crate::errors::{ErrorKind, StoreError, StoreResult};
use crate::index::{IndexDescriptor, IndexManager};
use crate::query::{paginate, sort_entries, sort_keys, BoundQuery, Entry, Query, QueryEngine};
use crate::store_config::StoreConfig;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Documents and indexes of one collection, guarded together by the
/// collection lock.
pub(crate) struct CollectionState {
    pub(crate) documents: IndexMap<String, Document>,
    pub(crate) indexes: IndexManager,
    last_timestamp: i64,
}

impl CollectionState {
    pub(crate) fn new(name: &str, separator: &str) -> Self {
        CollectionState {
            documents: IndexMap::new(),
            indexes: IndexManager::new(name, separator),
            last_timestamp: i64::MIN,
        }
    }

    fn put(&mut self, key: String, document: Document) -> StoreResult<()> {
        self.indexes.validate_write(&key, &document)?;
        self.indexes.on_write(&key, self.documents.get(&key), &document);
        self.documents.insert(key, document);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Option<Document> {
        let document = self.documents.shift_remove(key)?;
        self.indexes.on_delete(key, &document);
        Some(document)
    }
}

/// A named set of documents.
///
/// A collection is the unit of storage, indexing and locking: writes are
/// serialized by a per-collection lock and every index update happens under
/// the same lock as the document write it derives from. Readers never observe
/// a half-applied write.
///
/// Handles are cheap to clone and all clones share the same state.
///
/// ```rust
/// use ose_store::doc;
/// use ose_store::store::Store;
///
/// let store = Store::new();
/// let coll = store.collection("coll_sample");
/// coll.upsert(doc! { "_key": "sample_item_0", "rnd": 1 }).unwrap();
/// coll.upsert(doc! { "_key": "sample_item_0", "rnd": 2 }).unwrap();
///
/// assert_eq!(coll.count(), 1);
/// assert_eq!(coll.get("sample_item_0").unwrap().get("rnd"), Some(&2.into()));
/// ```
#[derive(Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

impl Collection {
    pub(crate) fn new(name: &str, config: StoreConfig) -> Self {
        Collection {
            inner: Arc::new(CollectionInner::new(name, config)),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Inserts `document`, or fully replaces the stored document with the
    /// same `_key`, and returns the stored copy.
    ///
    /// # Errors
    ///
    /// `InvalidKey` when `_key` is missing, empty or not a string;
    /// `DuplicateKeyViolation` when a unique index already holds the
    /// document's values for another key. A failed upsert changes nothing.
    pub fn upsert(&self, document: Document) -> StoreResult<Document> {
        self.inner.upsert(document)
    }

    /// # Errors
    ///
    /// `NotFound` when no document has `key`.
    pub fn get(&self, key: &str) -> StoreResult<Document> {
        self.inner
            .read(|state| state.documents.get(key).cloned())
            .ok_or_else(|| self.inner.not_found(key))
    }

    /// Removes the document with `key` together with its index entries.
    pub fn delete(&self, key: &str) -> StoreResult<Document> {
        self.inner
            .write(|state| state.remove(key))
            .ok_or_else(|| self.inner.not_found(key))
    }

    /// All documents in insertion order, from a snapshot taken now.
    pub fn scan(&self) -> std::vec::IntoIter<Document> {
        self.inner
            .read(|state| state.documents.values().cloned().collect::<Vec<_>>())
            .into_iter()
    }

    pub fn count(&self) -> usize {
        self.inner.read(|state| state.documents.len())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.read(|state| state.documents.contains_key(key))
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Creates an index over `fields` and backfills it.
    ///
    /// Adding an index that already exists with the same uniqueness does
    /// nothing.
    ///
    /// # Errors
    ///
    /// `ValidationError` for an empty field list, `IndexAlreadyExists` when
    /// the fields are indexed with the other uniqueness and
    /// `DuplicateKeyViolation` when a unique index cannot be built from the
    /// stored documents.
    pub fn add_index<S: AsRef<str>>(&self, fields: Vec<S>, unique: bool) -> StoreResult<()> {
        let fields = Fields::with_names(fields)?;
        self.inner.write(|state| {
            let CollectionState {
                documents, indexes, ..
            } = state;
            indexes.add_index(fields, unique, documents.iter()).map(|_| ())
        })
    }

    pub fn remove_index<S: AsRef<str>>(&self, fields: Vec<S>) -> StoreResult<()> {
        let fields = Fields::with_names(fields)?;
        self.inner.write(|state| state.indexes.remove_index(&fields))
    }

    pub fn has_index<S: AsRef<str>>(&self, fields: Vec<S>) -> bool {
        match Fields::with_names(fields) {
            Ok(fields) => self.inner.read(|state| state.indexes.has_index(&fields)),
            Err(_) => false,
        }
    }

    pub fn list_indexes(&self) -> Vec<IndexDescriptor> {
        self.inner.read(|state| state.indexes.list_indexes())
    }

    /// Keys of the documents whose `fields` equal `values`, read from the
    /// index declared over exactly `fields`.
    ///
    /// # Errors
    ///
    /// `IndexNotFound` when no index over `fields` (in that order) exists.
    pub fn lookup_equal<S: AsRef<str>>(&self, fields: Vec<S>, values: Vec<Value>) -> StoreResult<Vec<String>> {
        let fields = Fields::with_names(fields)?;
        self.inner
            .read(|state| state.indexes.lookup_equal(&fields, &values))
    }

    /// Evaluates a `FOR <var> IN <collection> FILTER ... RETURN <var>` query
    /// against this collection.
    ///
    /// # Errors
    ///
    /// `MalformedQuery` for text outside the supported subset or a query on
    /// another collection; `UnboundParameter` when `params` lacks a
    /// referenced `@param`.
    pub fn find(&self, query: &str, params: Document) -> StoreResult<Vec<Document>> {
        let bound = self.inner.bind(query, &params)?;
        Ok(self.inner.capped(self.inner.read_engine(|engine| {
            documents_of(engine.evaluate(&bound))
        })))
    }

    /// First result of [Collection::find].
    pub fn find_one(&self, query: &str, params: Document) -> StoreResult<Document> {
        let bound = self.inner.bind(query, &params)?;
        self.inner
            .read_engine(|engine| engine.evaluate(&bound).first().map(|(_, doc)| (*doc).clone()))
            .ok_or_else(|| {
                log::error!("No document in {} matches {}", self.name(), query);
                StoreError::new(
                    &format!("No document in {} matches the query", self.name()),
                    ErrorKind::NotFound,
                )
            })
    }

    pub fn count_query(&self, query: &str, params: Document) -> StoreResult<usize> {
        let bound = self.inner.bind(query, &params)?;
        Ok(self.inner.read_engine(|engine| engine.evaluate(&bound).len()))
    }

    /// Removes every document matched by the query and returns them.
    pub fn remove_query(&self, query: &str, params: Document) -> StoreResult<Vec<Document>> {
        let bound = self.inner.bind(query, &params)?;
        Ok(self.inner.remove_keys(|state| {
            QueryEngine::new(state, &self.inner.separator)
                .evaluate(&bound)
                .into_iter()
                .map(|(key, _)| key.clone())
                .collect()
        }))
    }

    /// First document holding every `field == value` pair of `predicate`.
    ///
    /// Uses an index over the predicate's field set when one exists,
    /// otherwise scans in insertion order. Several matches are not an error.
    pub fn find_equal(&self, predicate: Document) -> StoreResult<Document> {
        self.inner
            .read_engine(|engine| engine.first_equal(&predicate).cloned())
            .ok_or_else(|| {
                log::error!("No document in {} matches {}", self.name(), predicate);
                StoreError::new(
                    &format!("No document in {} matches {}", self.name(), predicate),
                    ErrorKind::NotFound,
                )
            })
    }

    /// Every document matching `predicate`, in the match set's natural order.
    pub fn find_all_equal(&self, predicate: Document) -> StoreResult<Vec<Document>> {
        Ok(self.inner.capped(
            self.inner
                .read_engine(|engine| documents_of(engine.equal_matches(&predicate))),
        ))
    }

    /// Matches of `predicate` sorted ascending over `sort_fields`, sliced to
    /// `[offset, offset + limit)`.
    ///
    /// A missing sort field sorts first. `limit <= 0` yields nothing.
    ///
    /// ```rust
    /// use ose_store::doc;
    /// use ose_store::store::Store;
    ///
    /// let store = Store::new();
    /// let coll = store.collection("coll_sample");
    /// for i in 0..10 {
    ///     coll.upsert(doc! { "_key": (format!("item_{}", i)), "rnd": 1, "timestamp": (100 - i) }).unwrap();
    /// }
    ///
    /// let earliest = coll.find_equal_asc(doc! { "rnd": 1 }, vec!["timestamp"], 0, 3).unwrap();
    /// assert_eq!(earliest[0].key().unwrap(), "item_9");
    /// assert_eq!(earliest.len(), 3);
    /// ```
    pub fn find_equal_asc<S: AsRef<str>>(
        &self,
        predicate: Document,
        sort_fields: Vec<S>,
        offset: usize,
        limit: i64,
    ) -> StoreResult<Vec<Document>> {
        self.find_equal_sorted(predicate, &sort_fields, SortOrder::Ascending, offset, limit)
    }

    pub fn find_equal_desc<S: AsRef<str>>(
        &self,
        predicate: Document,
        sort_fields: Vec<S>,
        offset: usize,
        limit: i64,
    ) -> StoreResult<Vec<Document>> {
        self.find_equal_sorted(predicate, &sort_fields, SortOrder::Descending, offset, limit)
    }

    /// Documents where any field of `predicate` is `LIKE` its pattern
    /// (case-insensitive, `%` any run, `_` one character), sorted ascending.
    pub fn find_like_or_asc<S: AsRef<str>>(
        &self,
        predicate: Document,
        sort_fields: Vec<S>,
        offset: usize,
        limit: i64,
    ) -> StoreResult<Vec<Document>> {
        self.find_like_or_sorted(predicate, &sort_fields, SortOrder::Ascending, offset, limit)
    }

    pub fn find_like_or_desc<S: AsRef<str>>(
        &self,
        predicate: Document,
        sort_fields: Vec<S>,
        offset: usize,
        limit: i64,
    ) -> StoreResult<Vec<Document>> {
        self.find_like_or_sorted(predicate, &sort_fields, SortOrder::Descending, offset, limit)
    }

    pub fn count_equal(&self, predicate: Document) -> usize {
        self.inner.read_engine(|engine| engine.count_equal(&predicate))
    }

    /// Number of documents that do not satisfy the whole of `predicate`.
    pub fn count_not_equal(&self, predicate: Document) -> usize {
        self.inner.read_engine(|engine| engine.count_not_equal(&predicate))
    }

    pub fn count_like_or(&self, predicate: Document) -> StoreResult<usize> {
        self.inner
            .read_engine(|engine| engine.like_or_matches(&predicate).map(|matches| matches.len()))
    }

    /// Removes every document matching `predicate` and returns them.
    pub fn remove_equal(&self, predicate: Document) -> StoreResult<Vec<Document>> {
        Ok(self.inner.remove_keys(|state| {
            QueryEngine::new(state, &self.inner.separator).equal_keys(&predicate)
        }))
    }

    /// Removes the first document matching `predicate`.
    pub fn remove_one_equal(&self, predicate: Document) -> StoreResult<Document> {
        let removed = self.inner.write(|state| {
            let key = QueryEngine::new(state, &self.inner.separator)
                .first_equal(&predicate)
                .and_then(|document| document.key().ok().map(str::to_string))?;
            state.remove(&key)
        });

        removed.ok_or_else(|| {
            log::error!("No document in {} matches {}", self.name(), predicate);
            StoreError::new(
                &format!("No document in {} matches {}", self.name(), predicate),
                ErrorKind::NotFound,
            )
        })
    }

    /// Lazily delivers the documents matching `predicate`.
    ///
    /// The matching keys are snapshotted when this is called; each document
    /// is then read by key as the iterator advances and skipped if it has
    /// been deleted meanwhile. No lock is held between items, so the consumer
    /// may write to this collection while iterating.
    ///
    /// ```rust
    /// use ose_store::doc;
    /// use ose_store::store::Store;
    ///
    /// let store = Store::new();
    /// let coll = store.collection("coll_sample");
    /// for i in 0..10 {
    ///     coll.upsert(doc! { "_key": (format!("item_{}", i)), "rnd": 1 }).unwrap();
    /// }
    ///
    /// let mut seen = 0;
    /// for _doc in coll.iter_equal(doc! { "rnd": 1 }) {
    ///     seen += 1;
    ///     if seen == 3 {
    ///         break;
    ///     }
    /// }
    /// assert_eq!(seen, 3);
    /// ```
    pub fn iter_equal(&self, predicate: Document) -> EqualIter {
        let keys = self.inner.read_engine(|engine| engine.equal_keys(&predicate));
        EqualIter {
            collection: self.clone(),
            keys: keys.into_iter(),
        }
    }

    /// Calls `callback` for each document matching `predicate` until it
    /// returns a truthy value, and returns the number of documents delivered.
    pub fn for_each_equal<F, R>(&self, predicate: Document, mut callback: F) -> usize
    where
        F: FnMut(&Document) -> R,
        R: Into<Value>,
    {
        let mut delivered = 0;
        for document in self.iter_equal(predicate) {
            delivered += 1;
            let verdict: Value = callback(&document).into();
            if verdict.is_truthy() {
                break;
            }
        }
        delivered
    }

    fn find_equal_sorted<S: AsRef<str>>(
        &self,
        predicate: Document,
        sort_fields: &[S],
        order: SortOrder,
        offset: usize,
        limit: i64,
    ) -> StoreResult<Vec<Document>> {
        let sort = sort_keys(sort_fields, order);
        let documents = self.inner.read_engine(|engine| {
            let sorted = sort_entries(engine.equal_matches(&predicate), &sort, &self.inner.separator);
            documents_of(paginate(sorted, offset, limit))
        });
        Ok(self.inner.capped(documents))
    }

    fn find_like_or_sorted<S: AsRef<str>>(
        &self,
        predicate: Document,
        sort_fields: &[S],
        order: SortOrder,
        offset: usize,
        limit: i64,
    ) -> StoreResult<Vec<Document>> {
        let sort = sort_keys(sort_fields, order);
        let documents = self.inner.read_engine(|engine| {
            let matches = engine.like_or_matches(&predicate)?;
            let sorted = sort_entries(matches, &sort, &self.inner.separator);
            Ok::<_, StoreError>(documents_of(paginate(sorted, offset, limit)))
        })?;
        Ok(self.inner.capped(documents))
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection").field("name", &self.inner.name).finish()
    }
}

/// Iterator returned by [Collection::iter_equal].
pub struct EqualIter {
    collection: Collection,
    keys: std::vec::IntoIter<String>,
}

impl Iterator for EqualIter {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        for key in self.keys.by_ref() {
            let document = self
                .collection
                .inner
                .read(|state| state.documents.get(&key).cloned());
            if document.is_some() {
                return document;
            }
            log::debug!("Skipping {} deleted during iteration", key);
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.keys.len()))
    }
}

fn documents_of(entries: Vec<Entry>) -> Vec<Document> {
    entries.into_iter().map(|(_, document)| document.clone()).collect()
}

struct CollectionInner {
    name: String,
    separator: String,
    config: StoreConfig,
    state: RwLock<CollectionState>,
}

impl CollectionInner {
    fn new(name: &str, config: StoreConfig) -> Self {
        let separator = config.field_separator();
        CollectionInner {
            name: name.to_string(),
            state: RwLock::new(CollectionState::new(name, &separator)),
            separator,
            config,
        }
    }

    fn read<R>(&self, f: impl FnOnce(&CollectionState) -> R) -> R {
        self.state.read_with(f)
    }

    fn write<R>(&self, f: impl FnOnce(&mut CollectionState) -> R) -> R {
        self.state.write_with(f)
    }

    fn read_engine<R>(&self, f: impl FnOnce(QueryEngine) -> R) -> R {
        self.read(|state| f(QueryEngine::new(state, &self.separator)))
    }

    fn capped(&self, documents: Vec<Document>) -> Vec<Document> {
        self.config.cap(documents)
    }

    fn upsert(&self, mut document: Document) -> StoreResult<Document> {
        let key = document.key()?.to_string();
        let timestamp_field = self.config.timestamp_field();

        self.write(|state| {
            let stamp = match &timestamp_field {
                Some(field) => {
                    let stamp = chrono::Utc::now().timestamp_millis().max(state.last_timestamp);
                    document.put(field.as_str(), stamp)?;
                    Some(stamp)
                }
                None => None,
            };

            state.put(key, document.clone())?;
            if let Some(stamp) = stamp {
                state.last_timestamp = stamp;
            }
            Ok(document)
        })
    }

    fn bind(&self, text: &str, params: &Document) -> StoreResult<BoundQuery> {
        let query = Query::parse(text, &self.separator)?;
        if query.collection != self.name {
            log::error!(
                "Query on collection {} cannot run against {}",
                query.collection,
                self.name
            );
            return Err(StoreError::new(
                &format!(
                    "Query targets collection {} but was run on {}",
                    query.collection, self.name
                ),
                ErrorKind::MalformedQuery,
            ));
        }
        query.bind(params)
    }

    fn remove_keys(&self, select: impl FnOnce(&CollectionState) -> Vec<String>) -> Vec<Document> {
        self.write(|state| {
            let keys = select(state);
            keys.iter().filter_map(|key| state.remove(key)).collect()
        })
    }

    fn not_found(&self, key: &str) -> StoreError {
        log::error!("Document {} not found in {}", key, self.name);
        StoreError::new(
            &format!("Document {} not found in collection {}", key, self.name),
            ErrorKind::NotFound,
        )
    }
}
