//! Identity and versioning types
//!
//! Every transactional reference is addressed by a `RefId` that is unique for
//! the lifetime of the process, not just within one space. A handle that is
//! presented to a store which never allocated it therefore fails loudly
//! instead of aliasing someone else's slot.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-ref monotonic version counter.
///
/// Starts at 0 when the ref is installed and increments by exactly 1 on each
/// committed write. Writes to a single ref are linearized by this counter.
pub type Version = u64;

/// Refs touched by a transaction attempt, each with the version observed at
/// first access.
///
/// Carried by a Retry outcome so the commit loop knows which refs to wait on
/// and can re-check every one of them for an intervening commit before it
/// parks the transaction.
pub type ReadSet = FxHashMap<RefId, Version>;

/// Process-wide id mint. Never reset; ids are not reused.
static NEXT_REF_ID: AtomicU64 = AtomicU64::new(0);

/// Stable identity of a transactional reference.
///
/// Minted once at allocation and globally unique within the process.
/// Ordering and hashing follow the underlying integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefId(u64);

impl RefId {
    /// Mint a fresh, process-unique id.
    pub fn next() -> Self {
        RefId(NEXT_REF_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw integer value, for diagnostics.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref#{}", self.0)
    }
}
