//! # ose-store - embedded document-collection store
//!
//! An in-process store of named collections of JSON-like documents, with
//! secondary indexes, equality and `LIKE` lookups, sorting, pagination and a
//! small `FOR ... FILTER ... RETURN` query subset.
//!
//! ## Quick Start
//!
//! ```rust
//! use ose_store::doc;
//! use ose_store::store::Store;
//!
//! let store = Store::new();
//! let coll = store.collection("coll_sample");
//! coll.add_index(vec!["rnd"], false).unwrap();
//!
//! for i in 0..20 {
//!     coll.upsert(doc! { "_key": (format!("sample_item_{}", i)), "index": i, "rnd": 1 })
//!         .unwrap();
//! }
//!
//! let found = coll
//!     .find("FOR t IN coll_sample FILTER t.index > @index RETURN t", doc! { "index": 3 })
//!     .unwrap();
//! assert_eq!(found.len(), 16);
//!
//! let first = coll.find_equal(doc! { "rnd": 1 }).unwrap();
//! assert_eq!(first.key().unwrap(), "sample_item_0");
//! ```
//!
//! ## Concurrency
//!
//! Every collection is guarded by its own read-write lock. Writes to one
//! collection are serialized and apply their index updates under the same
//! lock; reads see either all or none of a write. Collections are independent
//! of each other.
//!
//! ## Module Organization
//!
//! - [`collection`] - documents and collections
//! - [`common`] - values, field lists, sort order and lock helpers
//! - [`errors`] - error kinds and the result type
//! - [`index`] - secondary indexes
//! - [`query`] - query parsing and evaluation
//! - [`store`] - the collection registry
//! - [`store_builder`] / [`store_config`] - configuration

pub mod collection;
pub mod common;
pub mod errors;
pub mod index;
pub mod query;
pub mod store;
pub mod store_builder;
pub mod store_config;

pub use collection::{Collection, Document};
pub use common::Value;
pub use errors::{ErrorKind, StoreError, StoreResult};
pub use store::Store;
