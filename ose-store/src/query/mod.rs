//! Read-side evaluation: equality match sets, `LIKE` disjunctions, sorting,
//! pagination and the `FOR ... FILTER ... RETURN` query subset.
//!
//! ```rust
//! use ose_store::doc;
//! use ose_store::store::Store;
//!
//! let store = Store::new();
//! let coll = store.collection("coll_sample");
//! for i in 0..5 {
//!     coll.upsert(doc! { "_key": (format!("sample_item_{}", i)), "index": i }).unwrap();
//! }
//!
//! let found = coll
//!     .find("FOR t IN coll_sample FILTER t.index > @index RETURN t", doc! { "index": 2 })
//!     .unwrap();
//! assert_eq!(found.len(), 2);
//! ```
mod engine;
mod like;
mod parser;

pub(crate) use engine::*;
pub use like::*;
pub use parser::*;
