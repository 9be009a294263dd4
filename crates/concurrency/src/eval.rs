//! Trampolined program evaluator
//!
//! Interprets an [`Expr`] tree against one journal and one store. The
//! interpreter is a loop over an explicit frame stack, never the call
//! stack, so arbitrarily deep `FlatMap` chains evaluate in constant stack
//! space.
//!
//! Evaluation touches the shared store only through [`Journal::get`] /
//! [`Journal::set`]; it is repeatable and free of side effects, which is
//! what makes conflict re-runs and blocking retries safe.
//!
//! # OrElse journal discipline
//!
//! Entering `OrElse` snapshots the journal. The primary branch then extends
//! the live journal directly:
//! - Success or Failure: the branch's entries are already merged; the
//!   snapshot is dropped and the outcome propagates unchanged.
//! - Retry: the journal is restored to the snapshot (the branch's entries
//!   are discarded) and the fallback runs on that restored view. The
//!   fallback does not inherit reads made by the abandoned primary, but a
//!   Retry of both branches carries the union of both read sets, each ref
//!   pinned to the earliest version either branch observed, so the caller
//!   can detect a commit to any of them before parking and wakes when
//!   either precondition could have changed.

use crate::expr::{Cont, Expr};
use crate::journal::Journal;
use atomo_core::{unit, DynValue, ReadSet};
use atomo_storage::RefStore;

/// Result of evaluating one transaction attempt.
pub enum Outcome<E> {
    /// The program produced a value; the journal is ready for validation.
    Success(DynValue),
    /// The program raised an application error; never retried.
    Failure(E),
    /// A precondition was false; carries every ref the attempt touched,
    /// with its first-read version, so the commit loop knows what to wait
    /// on and can re-check all of it before parking.
    Retry(ReadSet),
}

impl<E: std::fmt::Debug> std::fmt::Debug for Outcome<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success(_) => f.write_str("Success"),
            Outcome::Failure(e) => write!(f, "Failure({:?})", e),
            Outcome::Retry(refs) => write!(f, "Retry({} refs)", refs.len()),
        }
    }
}

enum Frame<E> {
    /// Pending `FlatMap` continuation.
    Then(Cont<E>),
    /// Inside the primary branch of an `OrElse`.
    OrElsePrimary { fallback: Expr<E>, saved: Journal },
    /// Inside the fallback branch; remembers what the primary touched.
    OrElseFallback { primary_reads: ReadSet },
}

/// Evaluate `program` against `journal`, node by node.
///
/// The journal accumulates across the whole attempt; the caller owns it and
/// decides what to do with it based on the outcome.
pub fn evaluate<E: Clone>(
    program: &Expr<E>,
    store: &RefStore,
    journal: &mut Journal,
) -> Outcome<E> {
    let mut stack: Vec<Frame<E>> = Vec::new();
    let mut current: Expr<E> = program.clone();

    loop {
        // Step the current node to an outcome, or descend into a child.
        let mut outcome: Outcome<E> = match current {
            Expr::Succeed(v) => Outcome::Success(v),
            Expr::Fail(e) => Outcome::Failure(e),
            Expr::Read(id) => Outcome::Success(journal.get(store, id)),
            Expr::Write(id, v) => {
                journal.set(store, id, v);
                Outcome::Success(unit())
            }
            Expr::Check(true) => Outcome::Success(unit()),
            Expr::Check(false) => Outcome::Retry(journal.touched_refs()),
            Expr::FlatMap(inner, k) => {
                stack.push(Frame::Then(k));
                current = *inner;
                continue;
            }
            Expr::OrElse(primary, fallback) => {
                stack.push(Frame::OrElsePrimary {
                    fallback: *fallback,
                    saved: journal.clone(),
                });
                current = *primary;
                continue;
            }
        };

        // Unwind frames until one resumes evaluation or the stack empties.
        loop {
            match stack.pop() {
                None => return outcome,
                Some(Frame::Then(k)) => match outcome {
                    Outcome::Success(v) => {
                        current = k(v);
                        break;
                    }
                    // Failure and Retry short-circuit past the continuation.
                    other => outcome = other,
                },
                Some(Frame::OrElsePrimary { fallback, saved }) => match outcome {
                    Outcome::Retry(primary_reads) => {
                        *journal = saved;
                        stack.push(Frame::OrElseFallback { primary_reads });
                        current = fallback;
                        break;
                    }
                    // Success/Failure commit to the primary branch: its
                    // entries are already in the journal.
                    other => outcome = other,
                },
                Some(Frame::OrElseFallback { primary_reads }) => match outcome {
                    Outcome::Retry(mut refs) => {
                        // Union both branches' reads. On a shared ref keep
                        // the earliest version: versions are monotonic, so
                        // the older one is the one a re-check must compare
                        // against to catch an intervening commit.
                        for (id, seen) in primary_reads {
                            refs.entry(id)
                                .and_modify(|v| *v = (*v).min(seen))
                                .or_insert(seen);
                        }
                        outcome = Outcome::Retry(refs);
                    }
                    other => outcome = other,
                },
            }
        }
    }
}
