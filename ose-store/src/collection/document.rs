use im::OrdMap;

use crate::common::{write_json_string, Value, DOC_KEY};
use crate::errors::{ErrorKind, StoreError, StoreResult};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{Debug, Display};

/// A key-value record stored in a collection.
///
/// Documents map field names to [Value]s. The `_key` field is the document's
/// identity inside its collection: it must be a non-empty string, and
/// upserting another document with the same `_key` replaces the stored one.
///
/// Nested documents are reached with a field path, e.g. `address.city`,
/// through [Document::get_path]. A literal top-level field whose name contains
/// the separator always wins over the nested interpretation.
///
/// ## Persistent map
///
/// The fields live in an `im::OrdMap`, so cloning a document is O(1) and a
/// clone handed to a reader is never affected by later writes.
#[derive(Clone, Eq, PartialEq, Default, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Document {
    data: OrdMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Document {
            data: OrdMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Associates `value` with `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidOperation` when `key` is empty.
    ///
    /// ```rust
    /// use ose_store::collection::Document;
    ///
    /// let mut doc = Document::new();
    /// doc.put("_key", "sample_item_1").unwrap();
    /// doc.put("rnd", 1).unwrap();
    /// assert_eq!(doc.size(), 2);
    /// ```
    pub fn put<'a, T: Into<Value>>(&mut self, key: impl Into<Cow<'a, str>>, value: T) -> StoreResult<()> {
        let key = key.into();
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(StoreError::new(
                "Document does not support empty key",
                ErrorKind::InvalidOperation,
            ));
        }

        self.data.insert(key.into_owned(), value.into());
        Ok(())
    }

    /// Returns the top-level value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Resolves a field path such as `address.city`.
    ///
    /// Returns `None` when any segment is missing or traverses a non-document
    /// value. An explicit `null` is returned as `Some(&Value::Null)`.
    pub fn get_path(&self, path: &str, separator: &str) -> Option<&Value> {
        if let Some(value) = self.data.get(path) {
            return Some(value);
        }

        if separator.is_empty() || !path.contains(separator) {
            return None;
        }

        let mut segments = path.split(separator);
        let first = segments.next()?;
        let mut current = self.data.get(first)?;
        for segment in segments {
            current = current.as_document()?.data.get(segment)?;
        }
        Some(current)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Removes a top-level field and returns its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Returns the document's `_key`.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidKey` when `_key` is missing, not a string, or empty.
    pub fn key(&self) -> StoreResult<&str> {
        match self.data.get(DOC_KEY) {
            Some(Value::String(key)) if !key.is_empty() => Ok(key.as_str()),
            Some(Value::String(_)) => {
                log::error!("Document {} has an empty {}", self, DOC_KEY);
                Err(StoreError::new("Document key cannot be empty", ErrorKind::InvalidKey))
            }
            Some(other) => {
                log::error!("Document key must be a string, found {}", other);
                Err(StoreError::new("Document key must be a string", ErrorKind::InvalidKey))
            }
            None => {
                log::error!("Document {} has no {} field", self, DOC_KEY);
                Err(StoreError::new("Document key is missing", ErrorKind::InvalidKey))
            }
        }
    }

    /// Field names in sorted order.
    pub fn fields(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.data.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub(crate) fn write_json(&self, out: &mut String) {
        out.push('{');
        for (i, (key, value)) in self.data.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_json_string(key, out);
            out.push(':');
            value.write_json(out);
        }
        out.push('}');
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        self.write_json(&mut out);
        write!(f, "{}", out)
    }
}

impl From<BTreeMap<String, Value>> for Document {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Document {
            data: map.into_iter().collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Document {
            data: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Strips the quotes `stringify!` leaves around string-literal keys.
pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates a [Document] from `key: value` pairs.
///
/// Keys may be identifiers or string literals; values may be literals,
/// `null`, nested `{ ... }` documents, `[ ... ]` arrays or parenthesized
/// expressions.
///
/// ```rust
/// use ose_store::doc;
///
/// let doc = doc! {
///     "_key": "sample_item_0",
///     "index": 0,
///     "rnd": 1,
///     "address": { "city": "Rome" },
///     "tags": ["a", "b"],
///     "note": null,
/// };
/// assert_eq!(doc.size(), 6);
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::collection::Document::new()
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::collection::Document::new();
            $(
                doc.put($crate::collection::normalize(stringify!($key)), $crate::doc_value!($value))
                    .expect(&format!("Failed to put value {} in document", stringify!($value)));
            )*
            doc
        }
    };
}

/// Helper of [doc!] converting one value token tree.
#[macro_export]
macro_rules! doc_value {
    (null) => {
        $crate::common::Value::Null
    };

    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
