//! Versioned slot arena
//!
//! # Design
//!
//! - DashMap keyed by `RefId`: sharded, lock-free reads
//! - Each slot pairs the current value with its version counter
//! - Reading a slot returns `(value, version)` under one map guard, so the
//!   pair is always mutually consistent
//!
//! # Thread Safety
//!
//! `read` and `version_of` may run from any number of evaluating
//! transactions concurrently. `write` must only be called from inside the
//! commit coordinator's exclusive section; the store itself does not
//! serialize writers across refs, the commit lock does.

use atomo_core::{DynValue, RefId, Version};
use dashmap::DashMap;

/// One versioned cell.
#[derive(Clone)]
pub struct Slot {
    /// Current committed value.
    pub value: DynValue,
    /// Number of commits that have written this ref.
    pub version: Version,
}

/// Arena of versioned slots, the shared store behind one STM space.
///
/// Slots are installed at version 0 by [`RefStore::alloc`] and are never
/// removed; a ref lives as long as the space that created it.
pub struct RefStore {
    slots: DashMap<RefId, Slot>,
}

impl RefStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Create a store with capacity for an expected number of refs.
    pub fn with_capacity(refs: usize) -> Self {
        Self {
            slots: DashMap::with_capacity(refs),
        }
    }

    /// Install a new cell at version 0 and return its identity.
    pub fn alloc(&self, initial: DynValue) -> RefId {
        let id = RefId::next();
        self.slots.insert(
            id,
            Slot {
                value: initial,
                version: 0,
            },
        );
        id
    }

    /// Read the current `(value, version)` pair for a ref.
    ///
    /// The pair is taken under a single map guard and is therefore
    /// internally consistent even while a commit is applying writes to
    /// other refs.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this store. Ids are process-wide
    /// unique, so this fires when a `TRef` is used against the wrong space.
    pub fn read(&self, id: RefId) -> (DynValue, Version) {
        match self.slots.get(&id) {
            Some(slot) => (slot.value.clone(), slot.version),
            None => panic!("{} is not registered in this space", id),
        }
    }

    /// Current version of a ref.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this store.
    pub fn version_of(&self, id: RefId) -> Version {
        match self.slots.get(&id) {
            Some(slot) => slot.version,
            None => panic!("{} is not registered in this space", id),
        }
    }

    /// Overwrite a ref's value and bump its version by exactly 1.
    ///
    /// Must only be called from the commit coordinator's exclusive section,
    /// after the owning journal validated against this store.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this store.
    pub fn write(&self, id: RefId, value: DynValue) {
        match self.slots.get_mut(&id) {
            Some(mut slot) => {
                slot.value = value;
                slot.version += 1;
            }
            None => panic!("{} is not registered in this space", id),
        }
    }

    /// Number of refs allocated in this store.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the store holds no refs.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for RefStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RefStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefStore").field("refs", &self.len()).finish()
    }
}
