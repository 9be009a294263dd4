//! Commit coordinator
//!
//! Drives a transaction program to a terminal outcome:
//!
//! ```text
//! loop {
//!   1. evaluate(program) against a fresh journal
//!   2. Success  -> lock; validate; apply; unlock; wake writers' waiters; return
//!               -> validation failed: conflict, re-evaluate immediately
//!   3. Failure  -> return the application error, never retried
//!   4. Retry    -> lock; re-validate; register waiters; unlock; park;
//!                  on wake (or cancellation) re-evaluate (or unwind)
//! }
//! ```
//!
//! State machine: `Evaluating -> { Validating -> Committed |
//! Evaluating (conflict) } | Failed | BlockedRetry -> Evaluating (wake)`.
//!
//! # Thread Safety
//!
//! The validate+apply section runs under a single commit lock, the same
//! TOCTOU discipline as any first-committer-wins scheme: without it a
//! transaction could validate against state that another commit replaces
//! before the apply lands. The section is a version comparison plus a
//! bounded number of slot writes; evaluation happens entirely outside it.
//!
//! The Retry path re-validates under that same lock before registering its
//! wait handles. The check runs over the outcome's full retry set rather
//! than the journal: after an `or_else` restore the journal holds only the
//! fallback branch's entries, while the retry set still pins every ref
//! either branch read to its first-read version. Any commit that
//! invalidates any of those reads therefore either already happened
//! (re-validation fails and the attempt re-runs immediately) or will
//! acquire the lock after registration and wake us. There is no window in
//! which a wakeup can be lost.

use crate::eval::{evaluate, Outcome};
use crate::expr::Expr;
use crate::journal::Journal;
use crate::waitlist::{CancelToken, WaitHandle, WaitRegistry};
use atomo_core::DynValue;
use atomo_storage::RefStore;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

/// Terminal error of a cancellable commit.
///
/// Conflicts and retries are absorbed by the commit loop and never appear
/// here; only programmer-raised failures and caller-requested cancellation
/// surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitError<E> {
    /// The program raised an application error.
    #[error("transaction failed: {0}")]
    Failed(E),
    /// The caller cancelled the transaction while it was blocked.
    #[error("transaction cancelled")]
    Cancelled,
}

/// Coordinates atomic commits over one shared store.
pub struct CommitManager {
    /// Serializes validate+apply (and retry registration) across commits.
    commit_lock: Mutex<()>,
    /// Transactions blocked on a false precondition.
    waiters: WaitRegistry,
}

impl CommitManager {
    /// Create a coordinator with no blocked transactions.
    pub fn new() -> Self {
        Self {
            commit_lock: Mutex::new(()),
            waiters: WaitRegistry::new(),
        }
    }

    /// Run a program to completion, blocking the calling thread through
    /// conflicts and retries. Returns the program's value or its error.
    pub fn commit<E: Clone>(&self, store: &RefStore, program: &Expr<E>) -> Result<DynValue, E> {
        match self.run(store, program, None) {
            Ok(value) => Ok(value),
            Err(CommitError::Failed(e)) => Err(e),
            // No token was supplied, so nothing can cancel us.
            Err(CommitError::Cancelled) => unreachable!("cancelled without a token"),
        }
    }

    /// Like [`CommitManager::commit`], but unwinds with
    /// [`CommitError::Cancelled`] when `token` is cancelled, including while
    /// parked in a blocking retry.
    pub fn commit_with<E: Clone>(
        &self,
        store: &RefStore,
        program: &Expr<E>,
        token: &CancelToken,
    ) -> Result<DynValue, CommitError<E>> {
        self.run(store, program, Some(token))
    }

    fn run<E: Clone>(
        &self,
        store: &RefStore,
        program: &Expr<E>,
        token: Option<&CancelToken>,
    ) -> Result<DynValue, CommitError<E>> {
        let mut attempt: u64 = 0;
        loop {
            if let Some(t) = token {
                if t.is_cancelled() {
                    return Err(CommitError::Cancelled);
                }
            }
            attempt += 1;

            let mut journal = Journal::new();
            match evaluate(program, store, &mut journal) {
                Outcome::Success(value) => {
                    let guard = self.commit_lock.lock();
                    if !journal.is_valid(store) {
                        drop(guard);
                        tracing::trace!(attempt, "conflict at validation, re-evaluating");
                        continue;
                    }
                    let written = journal.apply(store);
                    drop(guard);

                    for id in &written {
                        self.waiters.wake_all(*id);
                    }
                    tracing::trace!(attempt, writes = written.len(), "transaction committed");
                    return Ok(value);
                }
                Outcome::Failure(e) => {
                    tracing::debug!(attempt, "transaction failed");
                    return Err(CommitError::Failed(e));
                }
                Outcome::Retry(refs) => {
                    let handle = Arc::new(WaitHandle::new());
                    {
                        let guard = self.commit_lock.lock();
                        // A commit may have already changed a ref the
                        // attempt read. Check the whole retry set, not the
                        // journal: after an or_else restore the journal no
                        // longer holds the abandoned branch's entries.
                        let current = refs
                            .iter()
                            .all(|(id, seen)| store.version_of(*id) == *seen);
                        if !current {
                            drop(guard);
                            tracing::trace!(attempt, "retry preempted by concurrent commit");
                            continue;
                        }
                        self.waiters.register(refs.keys().copied(), &handle);
                    }

                    if let Some(t) = token {
                        if !t.arm(&handle) {
                            self.waiters.deregister(&handle);
                            return Err(CommitError::Cancelled);
                        }
                    }

                    tracing::debug!(attempt, watched = refs.len(), "transaction blocked on retry");
                    handle.wait();

                    if let Some(t) = token {
                        t.disarm();
                    }
                    self.waiters.deregister(&handle);

                    if let Some(t) = token {
                        if t.is_cancelled() {
                            return Err(CommitError::Cancelled);
                        }
                    }
                    // Woken: restart at evaluation. The wake may be spurious
                    // for our predicate; the next attempt decides.
                }
            }
        }
    }

    /// Number of refs that currently have blocked transactions registered.
    pub fn watched_refs(&self) -> usize {
        self.waiters.watched_refs()
    }
}

impl Default for CommitManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomo_core::{downcast, erase, DynValue};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn flat_map<E, F>(inner: Expr<E>, k: F) -> Expr<E>
    where
        F: Fn(DynValue) -> Expr<E> + Send + Sync + 'static,
    {
        Expr::FlatMap(Box::new(inner), Arc::new(k))
    }

    #[test]
    fn test_commit_applies_writes_and_bumps_version() {
        let store = RefStore::new();
        let manager = CommitManager::new();
        let id = store.alloc(erase(1i64));

        let program: Expr<&'static str> =
            flat_map(Expr::Write(id, erase(2i64)), move |_| Expr::Read(id));
        let value = manager.commit(&store, &program).unwrap();

        assert_eq!(downcast::<i64>(&value), 2);
        assert_eq!(downcast::<i64>(&store.read(id).0), 2);
        assert_eq!(store.version_of(id), 1);
    }

    #[test]
    fn test_failure_leaves_store_untouched() {
        let store = RefStore::new();
        let manager = CommitManager::new();
        let id = store.alloc(erase(1i64));

        let program = flat_map(Expr::Write(id, erase(99i64)), |_| Expr::Fail("nope"));
        let err = match manager.commit(&store, &program) {
            Err(e) => e,
            Ok(_) => panic!("expected failure"),
        };

        assert_eq!(err, "nope");
        assert_eq!(downcast::<i64>(&store.read(id).0), 1);
        assert_eq!(store.version_of(id), 0);
    }

    #[test]
    fn test_blocked_retry_woken_by_commit() {
        let store = Arc::new(RefStore::new());
        let manager = Arc::new(CommitManager::new());
        let gate = store.alloc(erase(0i64));

        let waiter = {
            let store = Arc::clone(&store);
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let program: Expr<&'static str> = flat_map(Expr::Read(gate), |v| {
                    let n = downcast::<i64>(&v);
                    flat_map(Expr::Check(n > 0), move |_| Expr::Succeed(erase(n)))
                });
                manager.commit(&store, &program).unwrap()
            })
        };

        // Give the waiter time to park, then open the gate.
        thread::sleep(Duration::from_millis(100));
        let open: Expr<&'static str> = Expr::Write(gate, erase(1i64));
        manager.commit(&store, &open).unwrap();

        let seen = waiter.join().unwrap();
        assert_eq!(downcast::<i64>(&seen), 1);
        assert_eq!(manager.watched_refs(), 0);
    }

    #[test]
    fn test_cancel_unblocks_parked_transaction() {
        let store = Arc::new(RefStore::new());
        let manager = Arc::new(CommitManager::new());
        let gate = store.alloc(erase(0i64));
        let token = CancelToken::new();

        let waiter = {
            let store = Arc::clone(&store);
            let manager = Arc::clone(&manager);
            let token = token.clone();
            thread::spawn(move || {
                let program: Expr<&'static str> =
                    flat_map(Expr::Read(gate), |v| Expr::Check(downcast::<i64>(&v) > 0));
                manager.commit_with(&store, &program, &token)
            })
        };

        thread::sleep(Duration::from_millis(100));
        token.cancel();

        let result = waiter.join().unwrap();
        match result {
            Err(CommitError::Cancelled) => {}
            other => panic!("expected cancellation, got {:?}", other.err()),
        }
        // Cancellation deregistered the handle.
        assert_eq!(manager.watched_refs(), 0);
    }

    #[test]
    fn test_cancel_before_commit_short_circuits() {
        let store = RefStore::new();
        let manager = CommitManager::new();
        let token = CancelToken::new();
        token.cancel();

        let program: Expr<&'static str> = Expr::Succeed(erase(1i64));
        let result = manager.commit_with(&store, &program, &token);
        match result {
            Err(CommitError::Cancelled) => {}
            other => panic!("expected cancellation, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_conflicting_commits_both_land() {
        let store = Arc::new(RefStore::new());
        let manager = Arc::new(CommitManager::new());
        let id = store.alloc(erase(0i64));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let program: Expr<&'static str> = flat_map(Expr::Read(id), move |v| {
                            Expr::Write(id, erase(downcast::<i64>(&v) + 1))
                        });
                        manager.commit(&store, &program).unwrap();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        // Every increment landed exactly once: no lost updates.
        assert_eq!(downcast::<i64>(&store.read(id).0), 800);
        assert_eq!(store.version_of(id), 800);
    }
}
