//! Core vocabulary for the Atomo STM engine
//!
//! This crate defines the types shared by every layer:
//! - RefId: stable identity of a transactional reference
//! - Version: per-ref monotonic write counter
//! - DynValue: type-erased cell contents, downcast at the typed API boundary

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod value;

pub use types::{ReadSet, RefId, Version};
pub use value::{downcast, erase, unit, DynValue};
