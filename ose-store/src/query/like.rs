use crate::collection::Document;
use crate::common::Value;
use crate::errors::StoreResult;
use regex::{Regex, RegexBuilder};

/// A case-insensitive `LIKE` pattern: `%` matches any run of characters,
/// `_` matches exactly one character.
#[derive(Debug, Clone)]
pub struct LikePattern {
    source: String,
    regex: Regex,
}

impl LikePattern {
    pub fn new(pattern: &str) -> StoreResult<Self> {
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        let mut literal = [0u8; 4];
        for c in pattern.chars() {
            match c {
                '%' => expr.push_str(".*"),
                '_' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut literal))),
            }
        }
        expr.push('$');

        let regex = RegexBuilder::new(&expr)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()?;
        Ok(LikePattern {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

enum Clause {
    Like(String, LikePattern),
    Equal(String, Value),
}

/// A disjunction of per-field `LIKE` tests built from a predicate document.
///
/// String values of the predicate become patterns; any other value is
/// compared for equality. Patterns only ever match string fields.
pub struct LikeOr {
    clauses: Vec<Clause>,
}

impl LikeOr {
    pub fn new(predicate: &Document) -> StoreResult<Self> {
        let clauses = predicate
            .iter()
            .map(|(field, value)| match value {
                Value::String(pattern) => Ok(Clause::Like(field.clone(), LikePattern::new(pattern)?)),
                other => Ok(Clause::Equal(field.clone(), other.clone())),
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(LikeOr { clauses })
    }

    pub fn matches(&self, document: &Document, separator: &str) -> bool {
        self.clauses.iter().any(|clause| match clause {
            Clause::Like(field, pattern) => match document.get_path(field, separator) {
                Some(Value::String(text)) => pattern.is_match(text),
                _ => false,
            },
            Clause::Equal(field, expected) => document.get_path(field, separator) == Some(expected),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_like_wildcards() {
        let pattern = LikePattern::new("sample_%").unwrap();
        assert!(pattern.is_match("sample_item_1"));
        assert!(pattern.is_match("SAMPLE_"));
        assert!(pattern.is_match("samplex"));
        assert!(!pattern.is_match("a sample_item"));
        assert_eq!(pattern.source(), "sample_%");

        let single = LikePattern::new("a_c").unwrap();
        assert!(single.is_match("abc"));
        assert!(single.is_match("a🤘c"));
        assert!(!single.is_match("ac"));
        assert!(!single.is_match("abbc"));
    }

    #[test]
    fn test_like_escapes_regex_chars() {
        let pattern = LikePattern::new("1.5 (x)*").unwrap();
        assert!(pattern.is_match("1.5 (x)*"));
        assert!(!pattern.is_match("105 (x)"));
    }

    #[test]
    fn test_like_or_any_field() {
        let predicate = doc! { "name": "%ann%", "city": "rome" };
        let like = LikeOr::new(&predicate).unwrap();
        assert!(like.matches(&doc! { "name": "Joanne", "city": "Paris" }, "."));
        assert!(like.matches(&doc! { "name": "Bob", "city": "ROME" }, "."));
        assert!(!like.matches(&doc! { "name": "Bob", "city": "Paris" }, "."));
        assert!(!like.matches(&doc! { "name": 5 }, "."));
    }

    #[test]
    fn test_like_or_non_string_is_equality() {
        let like = LikeOr::new(&doc! { "rnd": 1 }).unwrap();
        assert!(like.matches(&doc! { "rnd": 1.0 }, "."));
        assert!(!like.matches(&doc! { "rnd": 2 }, "."));
    }
}
