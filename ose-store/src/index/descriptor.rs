use crate::common::Fields;
use std::fmt::Display;

/// Describes an index registered on a collection.
///
/// A descriptor is identified by its ordered field list; the uniqueness flag
/// decides whether the index rejects a second document with an already
/// indexed field-value tuple.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexDescriptor {
    fields: Fields,
    unique: bool,
    collection_name: String,
}

impl IndexDescriptor {
    pub fn new(fields: Fields, unique: bool, collection_name: &str) -> Self {
        IndexDescriptor {
            fields,
            unique,
            collection_name: collection_name.to_string(),
        }
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_compound(&self) -> bool {
        self.fields.is_compound()
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }
}

impl Display for IndexDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} index {} on {}",
            if self.unique { "unique" } else { "non-unique" },
            self.fields,
            self.collection_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_accessors() {
        let fields = Fields::with_names(vec!["a", "b"]).unwrap();
        let descriptor = IndexDescriptor::new(fields.clone(), true, "coll");
        assert_eq!(descriptor.fields(), &fields);
        assert!(descriptor.is_unique());
        assert!(descriptor.is_compound());
        assert_eq!(descriptor.collection_name(), "coll");
        assert_eq!(descriptor.to_string(), "unique index [a, b] on coll");
    }
}
