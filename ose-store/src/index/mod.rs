//! Secondary indexes.
//!
//! An index maps the tuple of one or more field values to the keys of the
//! documents holding that tuple. Indexes are created with
//! [`Collection::add_index`](crate::collection::Collection::add_index),
//! backfilled synchronously, and kept consistent with every write.
//!
//! ```rust
//! use ose_store::doc;
//! use ose_store::store::Store;
//!
//! let store = Store::new();
//! let coll = store.collection("coll_sample");
//! coll.add_index(vec!["rnd"], false).unwrap();
//! coll.upsert(doc! { "_key": "a", "rnd": 1 }).unwrap();
//!
//! let keys = coll.lookup_equal(vec!["rnd"], vec![1.into()]).unwrap();
//! assert_eq!(keys, vec!["a".to_string()]);
//! ```

mod descriptor;
mod document_index;
mod index_manager;

pub use descriptor::*;
pub use document_index::{IndexKey, IndexValue};
pub(crate) use document_index::DocumentIndex;
pub(crate) use index_manager::IndexManager;
