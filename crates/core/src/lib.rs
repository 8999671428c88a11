//! Functional core for idtables.
//!
//! Identity records, key derivation, the projection layout and the contracts
//! (outbound table store, inbound identity stores). Nothing in this crate
//! performs I/O.

pub mod identity;
pub mod storage;
