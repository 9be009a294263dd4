//! Shared versioned ref store for the Atomo STM engine
//!
//! This crate owns the only authoritative copy of transactional state: an
//! arena of `(value, version)` slots addressed by stable `RefId`.
//! Transactions never hold pointers into live state; they work on
//! journal-local copies and the commit coordinator is the sole writer.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod store;

pub use store::{RefStore, Slot};
