//! Table Access Adapter.
//!
//! Generic point, scan and batch operations over any serde record type,
//! executed against one named logical table of a [`TableStore`]. Every
//! operation creates its table on first use.
//!
//! [`TableStore`]: idtables_core::storage::TableStore

mod access;
mod entity;
mod scan;

pub use access::TableAccess;
pub use entity::{from_entity, to_entity};
pub use scan::PartitionScan;
