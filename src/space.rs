//! Main entry point for Atomo.
//!
//! This module provides the `Atomo` struct: one transactional space, owning
//! the shared ref store and the commit coordinator.

use crate::tref::TRef;
use crate::tx::Tx;
use atomo_concurrency::{CancelToken, CommitError, CommitManager};
use atomo_core::downcast;
use atomo_storage::RefStore;
use std::convert::Infallible;
use std::sync::Arc;

/// A transactional memory space.
///
/// All refs created by a space live in its store, and all transactions over
/// them are coordinated by its commit manager. The handle is cheap to clone
/// and share across threads.
///
/// # Example
///
/// ```
/// use atomo::prelude::*;
///
/// let space = Atomo::new();
/// let counter = space.new_ref(0i64);
///
/// let tx: Tx<(), &str> = counter.update(|n| n + 1);
/// space.commit(&tx).unwrap();
///
/// assert_eq!(space.read_committed(&counter), 1);
/// ```
#[derive(Clone)]
pub struct Atomo {
    store: Arc<RefStore>,
    manager: Arc<CommitManager>,
}

impl Atomo {
    /// Create an empty space.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RefStore::new()),
            manager: Arc::new(CommitManager::new()),
        }
    }

    /// Create a space sized for an expected number of refs.
    pub fn with_capacity(refs: usize) -> Self {
        Self {
            store: Arc::new(RefStore::with_capacity(refs)),
            manager: Arc::new(CommitManager::new()),
        }
    }

    /// Install a new transactional cell at version 0.
    pub fn new_ref<A>(&self, initial: A) -> TRef<A>
    where
        A: Clone + Send + Sync + 'static,
    {
        TRef::from_id(self.store.alloc(atomo_core::erase(initial)))
    }

    /// Run a transaction to completion on the calling thread.
    ///
    /// Conflicts re-evaluate immediately; false preconditions park the
    /// thread until a commit touches a watched ref. Only a programmer
    /// failure surfaces. Hosts with their own deferred-result abstraction
    /// wrap this call (for example in `spawn_blocking`); the core returns a
    /// plain `Result`.
    pub fn commit<A, E>(&self, tx: &Tx<A, E>) -> Result<A, E>
    where
        A: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        self.manager
            .commit(&self.store, &tx.expr)
            .map(|value| downcast::<A>(&value))
    }

    /// Like [`Atomo::commit`], but unwinds with [`CommitError::Cancelled`]
    /// when `token` is cancelled, including while blocked in a retry. The
    /// cancelled transaction deregisters all of its waiters before
    /// returning.
    pub fn commit_with<A, E>(&self, tx: &Tx<A, E>, token: &CancelToken) -> Result<A, CommitError<E>>
    where
        A: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        self.manager
            .commit_with(&self.store, &tx.expr, token)
            .map(|value| downcast::<A>(&value))
    }

    /// One-shot committed read of a single ref.
    ///
    /// Runs a minimal read-only transaction; a single read is trivially
    /// consistent, so this never conflicts or blocks.
    pub fn read_committed<A>(&self, cell: &TRef<A>) -> A
    where
        A: Clone + Send + Sync + 'static,
    {
        let tx: Tx<A, Infallible> = cell.read();
        match self.commit(&tx) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Number of refs allocated in this space.
    pub fn ref_count(&self) -> usize {
        self.store.len()
    }

    /// Number of refs with transactions currently blocked on them.
    pub fn watched_refs(&self) -> usize {
        self.manager.watched_refs()
    }
}

impl Default for Atomo {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Atomo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Atomo")
            .field("refs", &self.ref_count())
            .field("watched_refs", &self.watched_refs())
            .finish()
    }
}
