use crate::common::NAME_SEPARATOR;
use crate::errors::{ErrorKind, StoreError, StoreResult};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

pub(crate) type FieldVec = SmallVec<[String; 4]>;

/// An ordered, non-empty list of field names.
///
/// Used as the key of an index (the order is significant: `["a", "b"]` and
/// `["b", "a"]` are different indexes) and as the field list of equality
/// predicates.
///
/// # Example
///
/// ```rust
/// use ose_store::common::Fields;
///
/// let fields = Fields::with_names(vec!["name", "age"]).unwrap();
/// assert_eq!(fields.encoded_names(), "name|age");
/// assert!(fields.is_compound());
/// ```
#[derive(Clone, Debug, Eq)]
pub struct Fields {
    inner: Arc<FieldsInner>,
}

impl Fields {
    /// Creates a field list; fails when `field_names` is empty or contains an
    /// empty name.
    pub fn with_names<S: AsRef<str>>(field_names: Vec<S>) -> StoreResult<Fields> {
        if field_names.is_empty() {
            log::error!("Field names cannot be empty");
            return Err(StoreError::new(
                "Field names cannot be empty",
                ErrorKind::ValidationError,
            ));
        }

        if field_names.iter().any(|name| name.as_ref().is_empty()) {
            log::error!("Field name cannot be an empty string");
            return Err(StoreError::new(
                "Field name cannot be an empty string",
                ErrorKind::ValidationError,
            ));
        }

        Ok(Fields {
            inner: Arc::new(FieldsInner {
                field_names: field_names.iter().map(|s| s.as_ref().to_string()).collect(),
            }),
        })
    }

    /// Returns the field names in declaration order.
    pub fn field_names(&self) -> &[String] {
        &self.inner.field_names
    }

    pub fn len(&self) -> usize {
        self.inner.field_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.field_names.is_empty()
    }

    pub fn is_compound(&self) -> bool {
        self.inner.field_names.len() > 1
    }

    /// Returns the field names joined by `|`.
    pub fn encoded_names(&self) -> String {
        self.inner.field_names.join(NAME_SEPARATOR)
    }

    /// Whether both lists name the same fields, ignoring order.
    pub fn same_set<S: AsRef<str>>(&self, names: &[S]) -> bool {
        let mine: BTreeSet<&str> = self.inner.field_names.iter().map(String::as_str).collect();
        let theirs: BTreeSet<&str> = names.iter().map(AsRef::as_ref).collect();
        mine.len() == self.inner.field_names.len()
            && theirs.len() == names.len()
            && mine == theirs
    }
}

impl Display for Fields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.inner.field_names.join(", "))
    }
}

impl Ord for Fields {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.inner.field_names.cmp(&other.inner.field_names)
    }
}

impl PartialOrd for Fields {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Fields {
    fn eq(&self, other: &Self) -> bool {
        self.inner.field_names == other.inner.field_names
    }
}

impl Hash for Fields {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.field_names.hash(state);
    }
}

#[derive(Debug, Eq, PartialEq)]
struct FieldsInner {
    field_names: FieldVec,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_names() {
        let fields = Fields::with_names(vec!["a", "b"]).unwrap();
        assert_eq!(fields.field_names(), &["a".to_string(), "b".to_string()]);
        assert_eq!(fields.len(), 2);
        assert!(fields.is_compound());
    }

    #[test]
    fn test_with_names_rejects_empty_list() {
        let err = Fields::with_names(Vec::<&str>::new()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_with_names_rejects_empty_name() {
        let err = Fields::with_names(vec!["a", ""]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_order_matters_for_equality() {
        let ab = Fields::with_names(vec!["a", "b"]).unwrap();
        let ba = Fields::with_names(vec!["b", "a"]).unwrap();
        assert_ne!(ab, ba);
        assert!(ab.same_set(&["b", "a"]));
    }

    #[test]
    fn test_same_set() {
        let fields = Fields::with_names(vec!["rnd"]).unwrap();
        assert!(fields.same_set(&["rnd"]));
        assert!(!fields.same_set(&["rnd", "index"]));
        assert!(!fields.same_set::<&str>(&[]));
    }

    #[test]
    fn test_display_and_encoded() {
        let fields = Fields::with_names(vec!["x", "y"]).unwrap();
        assert_eq!(fields.to_string(), "[x, y]");
        assert_eq!(fields.encoded_names(), "x|y");
    }
}
