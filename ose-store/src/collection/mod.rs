//! Documents and the collections holding them.
mod document;
mod document_collection;

pub use document::*;
pub use document_collection::{Collection, EqualIter};
pub(crate) use document_collection::CollectionState;
