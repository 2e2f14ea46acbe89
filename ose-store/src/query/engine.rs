use crate::collection::{CollectionState, Document};
use crate::common::{SortOrder, Value};
use crate::errors::StoreResult;
use crate::index::IndexKey;
use crate::query::{BoundQuery, CompareOp, LikeOr, SortKey};
use itertools::Itertools;
use std::cmp::Ordering;

/// Evaluates reads against one locked collection state.
///
/// The engine borrows the state for the duration of a single call; callers
/// hold the collection's read lock while it runs.
pub(crate) struct QueryEngine<'a> {
    state: &'a CollectionState,
    separator: &'a str,
}

pub(crate) type Entry<'a> = (&'a String, &'a Document);

impl<'a> QueryEngine<'a> {
    pub fn new(state: &'a CollectionState, separator: &'a str) -> Self {
        QueryEngine { state, separator }
    }

    /// Keys of the documents matching every `field == value` pair of
    /// `predicate`, in the match set's natural order.
    ///
    /// With an index over exactly the predicate's field set the natural order
    /// is the index order, otherwise insertion order.
    pub fn equal_keys(&self, predicate: &Document) -> Vec<String> {
        self.equal_matches(predicate)
            .into_iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn equal_matches(&self, predicate: &Document) -> Vec<Entry<'a>> {
        match self.indexed_keys(predicate) {
            Some(keys) => keys
                .into_iter()
                .filter_map(|key| self.state.documents.get_key_value(key.as_str()))
                .collect(),
            None => self
                .state
                .documents
                .iter()
                .filter(|(_, document)| matches_equal(document, predicate, self.separator))
                .collect(),
        }
    }

    pub fn first_equal(&self, predicate: &Document) -> Option<&'a Document> {
        match self.indexed_keys(predicate) {
            Some(keys) => keys
                .into_iter()
                .find_map(|key| self.state.documents.get(key.as_str())),
            None => self
                .state
                .documents
                .values()
                .find(|document| matches_equal(document, predicate, self.separator)),
        }
    }

    pub fn count_equal(&self, predicate: &Document) -> usize {
        match self.indexed_keys(predicate) {
            Some(keys) => keys.len(),
            None => self
                .state
                .documents
                .values()
                .filter(|document| matches_equal(document, predicate, self.separator))
                .count(),
        }
    }

    pub fn count_not_equal(&self, predicate: &Document) -> usize {
        self.state.documents.len() - self.count_equal(predicate)
    }

    /// Documents matching any `LIKE` clause built from `predicate`, in
    /// insertion order.
    pub fn like_or_matches(&self, predicate: &Document) -> StoreResult<Vec<Entry<'a>>> {
        let like = LikeOr::new(predicate)?;
        Ok(self
            .state
            .documents
            .iter()
            .filter(|(_, document)| like.matches(document, self.separator))
            .collect())
    }

    /// Runs a bound query: candidates, filters, sort, then limit.
    pub fn evaluate(&self, query: &BoundQuery) -> Vec<Entry<'a>> {
        let candidates = self.query_candidates(query);
        let filtered: Vec<Entry<'a>> = candidates
            .into_iter()
            .filter(|(_, document)| {
                query
                    .conditions
                    .iter()
                    .all(|condition| condition.matches(document, self.separator))
            })
            .collect();

        let sorted = sort_entries(filtered, &query.sort, self.separator);
        let window = sorted.into_iter().skip(query.offset);
        match query.count {
            Some(count) => window.take(count).collect(),
            None => window.collect(),
        }
    }

    fn query_candidates(&self, query: &BoundQuery) -> Vec<Entry<'a>> {
        let indexed = query.conditions.iter().find_map(|condition| {
            if condition.op != CompareOp::Eq || condition.value.is_null() {
                return None;
            }
            let names = [condition.field.clone()];
            let index = self.state.indexes.find_index_for(&names)?;
            let keys = index
                .get(&IndexKey::from_values(std::slice::from_ref(&condition.value)))
                .map(|keys| keys.iter().collect::<Vec<_>>())
                .unwrap_or_default();
            log::debug!(
                "Using {} for {} == {}",
                index.descriptor(),
                condition.field,
                condition.value
            );
            Some(keys)
        });

        match indexed {
            Some(keys) => keys
                .into_iter()
                .filter_map(|key| self.state.documents.get_full(key.as_str()))
                .sorted_by_key(|(position, _, _)| *position)
                .map(|(_, key, document)| (key, document))
                .collect(),
            None => self.state.documents.iter().collect(),
        }
    }

    fn indexed_keys(&self, predicate: &Document) -> Option<Vec<&'a String>> {
        let names = predicate.fields();
        let index = self.state.indexes.find_index_for(&names)?;
        let values: Vec<Value> = index
            .descriptor()
            .fields()
            .field_names()
            .iter()
            .filter_map(|field| predicate.get(field).cloned())
            .collect();
        if values.len() != names.len() {
            return None;
        }

        Some(
            index
                .get(&IndexKey::from_values(&values))
                .map(|keys| keys.iter().collect())
                .unwrap_or_default(),
        )
    }
}

/// Whether `document` holds every `field == value` pair of `predicate`.
///
/// A missing field never matches, not even a `null` predicate value.
pub fn matches_equal(document: &Document, predicate: &Document, separator: &str) -> bool {
    predicate
        .iter()
        .all(|(field, expected)| document.get_path(field, separator) == Some(expected))
}

/// Compares two documents over `sort` keys; a missing field sorts first.
pub fn compare_documents(a: &Document, b: &Document, sort: &[SortKey], separator: &str) -> Ordering {
    for key in sort {
        let left = a.get_path(&key.field, separator);
        let right = b.get_path(&key.field, separator);
        let ordering = key.order.apply(left.cmp(&right));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Stable sort of `entries`; returns them unchanged for an empty `sort`.
pub(crate) fn sort_entries<'a>(entries: Vec<Entry<'a>>, sort: &[SortKey], separator: &str) -> Vec<Entry<'a>> {
    if sort.is_empty() {
        return entries;
    }
    entries
        .into_iter()
        .sorted_by(|(_, a), (_, b)| compare_documents(a, b, sort, separator))
        .collect()
}

/// `items[offset..offset + limit]`, empty when `limit <= 0` or `offset` is
/// past the end.
pub fn paginate<T>(items: Vec<T>, offset: usize, limit: i64) -> Vec<T> {
    if limit <= 0 {
        return Vec::new();
    }
    items
        .into_iter()
        .skip(offset)
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .collect()
}

/// Sort keys over `fields`, all in `order`.
pub fn sort_keys<S: AsRef<str>>(fields: &[S], order: SortOrder) -> Vec<SortKey> {
    fields
        .iter()
        .map(|field| SortKey {
            field: field.as_ref().to_string(),
            order,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Fields;
    use crate::query::Query;
    use crate::{doc, val};

    fn state(docs: Vec<Document>) -> CollectionState {
        let mut state = CollectionState::new("test", ".");
        for doc in docs {
            let key = doc.key().unwrap().to_string();
            state.documents.insert(key, doc);
        }
        state
    }

    fn sample() -> CollectionState {
        state(vec![
            doc! { "_key": "a", "g": 1, "ts": 30, "name": "Anna" },
            doc! { "_key": "b", "g": 2, "ts": 10, "name": "Bob" },
            doc! { "_key": "c", "g": 1, "ts": 20, "name": "Joanne" },
            doc! { "_key": "d", "g": 1, "name": "Dan" },
        ])
    }

    fn keys(entries: &[Entry]) -> Vec<String> {
        entries.iter().map(|(key, _)| key.to_string()).collect()
    }

    fn add_index(state: &mut CollectionState, names: Vec<&str>) {
        let CollectionState {
            documents, indexes, ..
        } = state;
        indexes
            .add_index(Fields::with_names(names).unwrap(), false, documents.iter())
            .unwrap();
    }

    #[test]
    fn test_equal_scan_and_index_agree() {
        let mut state = sample();
        let scanned = QueryEngine::new(&state, ".").equal_keys(&doc! { "g": 1 });
        assert_eq!(scanned, vec!["a", "c", "d"]);

        add_index(&mut state, vec!["g"]);
        let indexed = QueryEngine::new(&state, ".").equal_keys(&doc! { "g": 1 });
        assert_eq!(indexed, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_large_numbers_scan_and_index_agree() {
        let exact = 1i64 << 53;
        let mut state = state(vec![
            doc! { "_key": "a", "x": exact },
            doc! { "_key": "b", "x": (exact + 1) },
        ]);
        let predicate = doc! { "x": (exact as f64) };
        let scanned = QueryEngine::new(&state, ".").count_equal(&predicate);

        add_index(&mut state, vec!["x"]);
        let indexed = QueryEngine::new(&state, ".").count_equal(&predicate);
        assert_eq!(scanned, 1);
        assert_eq!(indexed, scanned);
    }

    #[test]
    fn test_missing_field_never_equals_null() {
        let state = state(vec![
            doc! { "_key": "a", "x": null },
            doc! { "_key": "b" },
        ]);
        let engine = QueryEngine::new(&state, ".");
        assert_eq!(engine.equal_keys(&doc! { "x": null }), vec!["a"]);
    }

    #[test]
    fn test_first_equal_and_counts() {
        let state = sample();
        let engine = QueryEngine::new(&state, ".");
        assert_eq!(
            engine.first_equal(&doc! { "g": 1 }).unwrap().key().unwrap(),
            "a"
        );
        assert!(engine.first_equal(&doc! { "g": 9 }).is_none());
        assert_eq!(engine.count_equal(&doc! { "g": 1 }), 3);
        assert_eq!(engine.count_not_equal(&doc! { "g": 1 }), 1);
    }

    #[test]
    fn test_empty_predicate_matches_all() {
        let state = sample();
        let engine = QueryEngine::new(&state, ".");
        assert_eq!(engine.count_equal(&doc! {}), 4);
    }

    #[test]
    fn test_sort_missing_first() {
        let state = sample();
        let engine = QueryEngine::new(&state, ".");
        let matches = engine.equal_matches(&doc! { "g": 1 });
        let sorted = sort_entries(matches, &sort_keys(&["ts"], SortOrder::Ascending), ".");
        assert_eq!(keys(&sorted), vec!["d", "c", "a"]);

        let matches = engine.equal_matches(&doc! { "g": 1 });
        let sorted = sort_entries(matches, &sort_keys(&["ts"], SortOrder::Descending), ".");
        assert_eq!(keys(&sorted), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_paginate() {
        let items: Vec<i32> = (0..10).collect();
        assert_eq!(paginate(items.clone(), 2, 3), vec![2, 3, 4]);
        assert_eq!(paginate(items.clone(), 8, 5), vec![8, 9]);
        assert!(paginate(items.clone(), 10, 5).is_empty());
        assert!(paginate(items.clone(), 0, 0).is_empty());
        assert!(paginate(items, 0, -1).is_empty());
    }

    #[test]
    fn test_like_or_matches() {
        let state = sample();
        let engine = QueryEngine::new(&state, ".");
        let matches = engine.like_or_matches(&doc! { "name": "%ann%" }).unwrap();
        assert_eq!(keys(&matches), vec!["a", "c"]);
    }

    #[test]
    fn test_evaluate_filters_sort_limit() {
        let state = sample();
        let engine = QueryEngine::new(&state, ".");
        let query = Query::parse("FOR t IN test FILTER t.g == 1 SORT t.ts DESC LIMIT 2 RETURN t", ".")
            .unwrap()
            .bind(&doc! {})
            .unwrap();
        assert_eq!(keys(&engine.evaluate(&query)), vec!["a", "c"]);
    }

    #[test]
    fn test_evaluate_uses_index_in_insertion_order() {
        let mut state = sample();
        add_index(&mut state, vec!["g"]);
        // move "a" to the end of the index set while keeping its position
        let a = state.documents.get("a").unwrap().clone();
        let moved = doc! { "_key": "a", "g": 2, "ts": 30, "name": "Anna" };
        state.indexes.on_write("a", Some(&a), &moved);
        state.indexes.on_write("a", Some(&moved), &a);

        let engine = QueryEngine::new(&state, ".");
        let query = Query::parse("FOR t IN test FILTER t.g == @g RETURN t", ".")
            .unwrap()
            .bind(&doc! { "g": 1 })
            .unwrap();
        assert_eq!(keys(&engine.evaluate(&query)), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_evaluate_missing_is_null() {
        let state = sample();
        let engine = QueryEngine::new(&state, ".");
        let query = Query::parse("FOR t IN test FILTER t.ts == null RETURN t", ".")
            .unwrap()
            .bind(&doc! {})
            .unwrap();
        assert_eq!(keys(&engine.evaluate(&query)), vec!["d"]);

        let query = Query::parse("FOR t IN test FILTER t.ts < 15 RETURN t", ".")
            .unwrap()
            .bind(&doc! {})
            .unwrap();
        assert_eq!(keys(&engine.evaluate(&query)), vec!["b", "d"]);
    }

    #[test]
    fn test_compare_documents_multi_key() {
        let sort = sort_keys(&["a", "b"], SortOrder::Ascending);
        let x = doc! { "a": 1, "b": "y" };
        let y = doc! { "a": 1, "b": "z" };
        assert_eq!(compare_documents(&x, &y, &sort, "."), Ordering::Less);
        assert_eq!(compare_documents(&x, &x, &sort, "."), Ordering::Equal);
        let z = doc! { "a": (val!(0.5)) };
        assert_eq!(compare_documents(&z, &x, &sort, "."), Ordering::Less);
    }
}
