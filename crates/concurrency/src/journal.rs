//! Per-attempt read/write journal
//!
//! The journal is the isolation mechanism: the first access to a ref inside
//! a transaction attempt copies `(value, version)` out of the shared store
//! into a local entry, and every later access within the same attempt goes
//! to that entry, never back to the store. Two reads of one ref in one
//! attempt therefore always agree, even while other transactions commit.
//!
//! A journal belongs to exactly one evaluation attempt and is discarded on
//! every outcome. Validation and application are separate steps because they
//! must both run inside the commit coordinator's exclusive section.

use atomo_core::{DynValue, ReadSet, RefId, Version};
use atomo_storage::RefStore;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Record of one ref's state as seen by one attempt.
#[derive(Clone)]
pub struct Entry {
    /// Store version at the moment of first access.
    pub version_at_read: Version,
    /// Attempt-local value; starts as the store value, mutated by writes.
    pub local_value: DynValue,
    /// Whether this attempt wrote the ref.
    pub written: bool,
}

/// Read/write log for a single evaluation attempt.
///
/// `Clone` is cheap (values are behind `Arc`) and is how `or_else` forks a
/// branch-local view it can abandon without touching the outer attempt.
#[derive(Clone, Default)]
pub struct Journal {
    entries: FxHashMap<RefId, Entry>,
}

impl Journal {
    /// Create an empty journal for a fresh attempt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a ref through the journal.
    ///
    /// First access copies `(value, version)` out of the store; later
    /// accesses return the local copy. This is the only place evaluation
    /// touches the shared store.
    pub fn get(&mut self, store: &RefStore, id: RefId) -> DynValue {
        self.entry(store, id).local_value.clone()
    }

    /// Write a ref through the journal.
    ///
    /// Ensures an entry exists (seeding `version_at_read` from the store
    /// without mutating it, so blind writes still validate), then replaces
    /// the local value.
    pub fn set(&mut self, store: &RefStore, id: RefId, value: DynValue) {
        let entry = self.entry(store, id);
        entry.local_value = value;
        entry.written = true;
    }

    fn entry(&mut self, store: &RefStore, id: RefId) -> &mut Entry {
        self.entries.entry(id).or_insert_with(|| {
            let (value, version) = store.read(id);
            Entry {
                version_at_read: version,
                local_value: value,
                written: false,
            }
        })
    }

    /// Check every entry's version against the live store.
    ///
    /// True iff no ref this attempt touched has been committed to since it
    /// was first read. Must run inside the same exclusive section as
    /// [`Journal::apply`]; validating outside it would race other commits.
    pub fn is_valid(&self, store: &RefStore) -> bool {
        self.entries
            .iter()
            .all(|(id, entry)| store.version_of(*id) == entry.version_at_read)
    }

    /// Apply every written entry to the store, bumping each version by 1.
    ///
    /// Only call after [`Journal::is_valid`] succeeded, within the same
    /// exclusive section. Returns the ids that were written so the caller
    /// can wake their waiters.
    pub fn apply(&self, store: &RefStore) -> SmallVec<[RefId; 4]> {
        let mut written = SmallVec::new();
        for (id, entry) in &self.entries {
            if entry.written {
                store.write(*id, entry.local_value.clone());
                written.push(*id);
            }
        }
        written
    }

    /// Every ref this attempt has touched so far, with the version it was
    /// first read at.
    ///
    /// This is the set a Retry outcome carries: the refs whose change could
    /// make the attempt take a different path, each pinned to the version
    /// the attempt actually saw so a later commit is detectable even after
    /// the journal itself has been discarded.
    pub fn touched_refs(&self) -> ReadSet {
        self.entries
            .iter()
            .map(|(id, entry)| (*id, entry.version_at_read))
            .collect()
    }

    /// Whether this attempt wrote anything.
    pub fn has_writes(&self) -> bool {
        self.entries.values().any(|e| e.written)
    }

    /// Number of refs touched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no ref has been touched.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
