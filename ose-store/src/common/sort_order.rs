/// Direction used when sorting a match set.
///
/// `findEqualAsc`-style operations always sort [SortOrder::Ascending]; the
/// query subset's `SORT ... DESC` and the `*_desc` finders use
/// [SortOrder::Descending].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Smallest to largest under the value total order
    #[default]
    Ascending,
    /// Largest to smallest under the value total order
    Descending,
}

impl SortOrder {
    /// Applies this direction to an ascending comparison result.
    #[inline]
    pub fn apply(&self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_apply() {
        assert_eq!(SortOrder::Ascending.apply(Ordering::Less), Ordering::Less);
        assert_eq!(SortOrder::Descending.apply(Ordering::Less), Ordering::Greater);
        assert_eq!(SortOrder::Descending.apply(Ordering::Equal), Ordering::Equal);
    }

    #[test]
    fn test_default_is_ascending() {
        assert_eq!(SortOrder::default(), SortOrder::Ascending);
    }
}
