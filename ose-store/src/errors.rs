use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for store operations.
///
/// Every failure surfaced by the store falls into exactly one of these
/// categories, so callers can treat each kind as a normal, typed outcome.
///
/// # Examples
///
/// ```rust
/// use ose_store::errors::{ErrorKind, StoreError, StoreResult};
///
/// fn lookup() -> StoreResult<()> {
///     Err(StoreError::new("Document not found", ErrorKind::NotFound))
/// }
///
/// assert_eq!(lookup().unwrap_err().kind(), &ErrorKind::NotFound);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// The `_key` field is missing, empty or not a string
    InvalidKey,
    /// The requested document does not exist
    NotFound,
    /// A unique index already maps the field-value tuple to another document
    DuplicateKeyViolation,
    /// The query references a bind parameter that was not supplied
    UnboundParameter,
    /// The query text is outside the supported subset
    MalformedQuery,

    /// No index is registered for the requested field list
    IndexNotFound,
    /// An index with the same fields but a different uniqueness exists
    IndexAlreadyExists,

    /// Input failed validation (empty field list, bad configuration value)
    ValidationError,
    /// The operation is not valid in the current context
    InvalidOperation,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidKey => write!(f, "Invalid key"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::DuplicateKeyViolation => write!(f, "Duplicate key violation"),
            ErrorKind::UnboundParameter => write!(f, "Unbound parameter"),
            ErrorKind::MalformedQuery => write!(f, "Malformed query"),
            ErrorKind::IndexNotFound => write!(f, "Index not found"),
            ErrorKind::IndexAlreadyExists => write!(f, "Index already exists"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
        }
    }
}

/// Error type of every fallible store operation.
///
/// Carries a message, an [ErrorKind], an optional cause and the backtrace of
/// the construction site. The backtrace is captured unresolved and only
/// symbolized when the error is debug-printed.
#[derive(Clone)]
pub struct StoreError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<StoreError>>,
    backtrace: Atomic<Backtrace>,
}

impl StoreError {
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        StoreError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    /// Creates an error that wraps `cause`, preserving the chain for `source()`.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: StoreError) -> Self {
        StoreError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&StoreError> {
        self.cause.as_deref()
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{} ({})\nCaused by: {:?}", self.message, self.error_kind, cause),
            None => {
                let mut backtrace = self.backtrace.write();
                backtrace.resolve();
                write!(f, "{} ({})\n{:?}", self.message, self.error_kind, *backtrace)
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// Shorthand for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<regex::Error> for StoreError {
    fn from(err: regex::Error) -> Self {
        StoreError::new(
            &format!("Invalid pattern: {}", err),
            ErrorKind::ValidationError,
        )
    }
}

impl From<String> for StoreError {
    fn from(msg: String) -> Self {
        StoreError::new(&msg, ErrorKind::InvalidOperation)
    }
}

impl From<&str> for StoreError {
    fn from(msg: &str) -> Self {
        StoreError::new(msg, ErrorKind::InvalidOperation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_new_creates_error() {
        let error = StoreError::new("An error occurred", ErrorKind::NotFound);
        assert_eq!(error.message(), "An error occurred");
        assert_eq!(error.kind(), &ErrorKind::NotFound);
        assert!(error.cause().is_none());
        assert!(error.source().is_none());
    }

    #[test]
    fn store_error_new_with_cause_keeps_chain() {
        let cause = StoreError::new("unique index on [email]", ErrorKind::DuplicateKeyViolation);
        let error = StoreError::new_with_cause(
            "Failed to upsert document",
            ErrorKind::DuplicateKeyViolation,
            cause,
        );
        assert!(error.cause().is_some());
        assert!(error.source().is_some());
        assert_eq!(error.cause().unwrap().message(), "unique index on [email]");
    }

    #[test]
    fn store_error_display_formats_message_only() {
        let error = StoreError::new("Missing _key", ErrorKind::InvalidKey);
        assert_eq!(format!("{}", error), "Missing _key");
    }

    #[test]
    fn store_error_debug_formats_with_cause() {
        let error = StoreError::new_with_cause(
            "outer",
            ErrorKind::MalformedQuery,
            StoreError::new("inner", ErrorKind::MalformedQuery),
        );
        let formatted = format!("{:?}", error);
        assert!(formatted.contains("outer"));
        assert!(formatted.contains("Caused by:"));
        assert!(formatted.contains("inner"));
    }

    #[test]
    fn store_error_debug_resolves_backtrace() {
        let error = StoreError::new("boom", ErrorKind::InvalidOperation);
        let formatted = format!("{:?}", error);
        assert!(formatted.starts_with("boom (Invalid operation)"));
    }

    #[test]
    fn regex_error_converts_to_validation_error() {
        let err = regex::Regex::new("(").unwrap_err();
        let error: StoreError = err.into();
        assert_eq!(error.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn string_converts_to_invalid_operation() {
        let error: StoreError = "nope".into();
        assert_eq!(error.kind(), &ErrorKind::InvalidOperation);
        let error: StoreError = String::from("nope").into();
        assert_eq!(error.message(), "nope");
    }

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::DuplicateKeyViolation.to_string(), "Duplicate key violation");
        assert_eq!(ErrorKind::UnboundParameter.to_string(), "Unbound parameter");
    }
}
