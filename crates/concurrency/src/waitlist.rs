//! Wait/wake registry for blocked transactions
//!
//! A transaction whose attempt resolves to Retry parks on a [`WaitHandle`]
//! after registering it against every ref the attempt touched. A successful
//! commit wakes every handle registered on each ref it wrote. Wakeups may be
//! spurious: a woken transaction simply re-evaluates and may park again.
//!
//! # Liveness
//!
//! No fairness is promised across waiters, but every successful write to a
//! ref wakes every handle registered on it at that moment, and registration
//! happens inside the commit lock after re-validating the journal, so a
//! waiter can never miss the write it is waiting for.

use atomo_core::RefId;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Park/wake primitive for one blocked transaction attempt.
///
/// One handle is created per park and registered under every watched ref;
/// identity is the allocation (`Arc::ptr_eq`), so deregistration removes
/// exactly this waiter and no other.
pub struct WaitHandle {
    woken: Mutex<bool>,
    cond: Condvar,
}

impl WaitHandle {
    /// Create a handle in the parked (not yet woken) state.
    pub fn new() -> Self {
        Self {
            woken: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Wake the parked transaction. Idempotent.
    pub fn wake(&self) {
        let mut woken = self.woken.lock();
        *woken = true;
        self.cond.notify_one();
    }

    /// Block the calling thread until [`WaitHandle::wake`] is called.
    pub fn wait(&self) {
        let mut woken = self.woken.lock();
        while !*woken {
            self.cond.wait(&mut woken);
        }
    }

    /// Whether this handle has already been woken.
    pub fn is_woken(&self) -> bool {
        *self.woken.lock()
    }
}

impl Default for WaitHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative cancellation for a blocked [`CommitManager::commit_with`]
/// call.
///
/// [`CommitManager::commit_with`]: crate::manager::CommitManager::commit_with
///
/// Cancelling sets a flag checked between attempts and wakes the currently
/// parked handle, if any, so a transaction blocked in Retry unwinds
/// promptly instead of waiting for an unrelated commit.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    parked: Mutex<Option<Arc<WaitHandle>>>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake the parked transaction, if any.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        if let Some(handle) = self.inner.parked.lock().take() {
            handle.wake();
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Publish the handle the owning transaction is about to park on.
    ///
    /// Returns false if the token was already cancelled, in which case the
    /// caller must not park.
    pub(crate) fn arm(&self, handle: &Arc<WaitHandle>) -> bool {
        let mut parked = self.inner.parked.lock();
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return false;
        }
        *parked = Some(Arc::clone(handle));
        true
    }

    /// Clear the published handle after waking.
    pub(crate) fn disarm(&self) {
        self.inner.parked.lock().take();
    }
}

/// Tracks which blocked transactions are waiting on which refs.
pub struct WaitRegistry {
    waiters: Mutex<FxHashMap<RefId, Vec<Arc<WaitHandle>>>>,
}

impl WaitRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            waiters: Mutex::new(FxHashMap::default()),
        }
    }

    /// Register `handle` under every ref in `refs`.
    pub fn register<I>(&self, refs: I, handle: &Arc<WaitHandle>)
    where
        I: IntoIterator<Item = RefId>,
    {
        let mut waiters = self.waiters.lock();
        for id in refs {
            waiters.entry(id).or_default().push(Arc::clone(handle));
        }
    }

    /// Wake and remove every handle registered on `id`.
    ///
    /// Invoked once per written ref after a successful apply.
    pub fn wake_all(&self, id: RefId) {
        let handles = {
            let mut waiters = self.waiters.lock();
            waiters.remove(&id).unwrap_or_default()
        };
        let count = handles.len();
        for handle in handles {
            handle.wake();
        }
        if count > 0 {
            tracing::trace!(ref_id = %id, waiters = count, "woke blocked transactions");
        }
    }

    /// Remove `handle` from every ref it is registered under.
    ///
    /// Invoked after a wakeup (the handle may still be registered under
    /// other refs) and on cancellation, so the registry never retains
    /// dangling handles.
    pub fn deregister(&self, handle: &Arc<WaitHandle>) {
        let mut waiters = self.waiters.lock();
        waiters.retain(|_, handles| {
            handles.retain(|h| !Arc::ptr_eq(h, handle));
            !handles.is_empty()
        });
    }

    /// Number of refs with at least one registered waiter.
    pub fn watched_refs(&self) -> usize {
        self.waiters.lock().len()
    }
}

impl Default for WaitRegistry {
    fn default() -> Self {
        Self::new()
    }
}
