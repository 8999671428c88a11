//! Table store backends.
//!
//! Concrete implementations of [`TableStore`] selected by feature flags. Any
//! combination may be compiled in; [`ConfiguredStore`] picks one at runtime.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): process-local store, nothing persisted
//! - `sqlite`: SQLite via `rusqlite` and `tokio-rusqlite`
//! - `dynamodb`: AWS DynamoDB via `aws-sdk-dynamodb`
//!
//! # Examples
//!
//! Build with every backend:
//! ```bash
//! cargo build -p idtables --features sqlite,dynamodb
//! ```
//!
//! [`TableStore`]: idtables_core::storage::TableStore

#[cfg(not(any(feature = "inmemory", feature = "sqlite", feature = "dynamodb")))]
compile_error!(
    "No table store backend selected. Enable 'inmemory', 'sqlite' or 'dynamodb'. \
    Example: cargo build -p idtables --features sqlite"
);

mod configured;

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

pub use configured::{ConfiguredStore, ConnectError};
