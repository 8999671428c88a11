//! SQLite table store.
//!
//! Every logical table shares one `entities` SQL table keyed by
//! `(table_name, partition_key, row_key)`; created tables are recorded in
//! `table_registry`. Uses `rusqlite` for synchronous operations and
//! `tokio-rusqlite` for async wrapping.

mod error;
mod schema;
mod store;

pub use store::SqliteTableStore;
