//! In-memory table store.
//!
//! Keeps every table in a `BTreeMap` behind `Arc<RwLock<_>>`. Nothing is
//! persisted. Used by the test suites and as the default backend of the CLI.
//!
//! # Example
//!
//! ```rust,ignore
//! use idtables::storage::inmemory::InMemoryTableStore;
//!
//! let store = InMemoryTableStore::new().with_page_size(2);
//! ```

mod store;

pub use store::InMemoryTableStore;
