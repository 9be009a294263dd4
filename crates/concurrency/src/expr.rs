//! Untyped transaction algebra
//!
//! A transaction is a value: an immutable expression tree built before
//! execution and interpreted by the evaluator against a fresh journal on
//! every attempt. Nodes carry type-erased values; the typed combinators in
//! the facade crate are responsible for erasing and restoring concrete
//! types at `FlatMap` boundaries.
//!
//! Continuations are `Fn` behind `Arc`, and the tree derives `Clone`, so a
//! program can be evaluated any number of times (conflict re-runs, blocking
//! retries, `or_else` branch replays) without being consumed.

use atomo_core::{DynValue, RefId};
use std::sync::Arc;

/// Continuation invoked with the erased result of the preceding node.
pub type Cont<E> = Arc<dyn Fn(DynValue) -> Expr<E> + Send + Sync>;

/// One node of a transaction program.
pub enum Expr<E> {
    /// Produce a value without touching any ref.
    Succeed(DynValue),
    /// Abort the transaction with an application error. Never retried.
    Fail(E),
    /// Read a ref through the journal.
    Read(RefId),
    /// Write a ref through the journal; yields unit.
    Write(RefId, DynValue),
    /// Precondition gate: true yields unit, false retries the transaction.
    ///
    /// The boolean is computed by the enclosing continuation from values it
    /// read through the journal, so it reflects journal-visible state on
    /// every attempt. A false check gives no error detail; use `Fail` for a
    /// diagnosable failure.
    Check(bool),
    /// Sequencing: evaluate the node, feed its result to the continuation.
    FlatMap(Box<Expr<E>>, Cont<E>),
    /// Conditional fallback: try the first branch, and if (and only if) it
    /// retries, try the second on a clean view.
    OrElse(Box<Expr<E>>, Box<Expr<E>>),
}

impl<E: Clone> Clone for Expr<E> {
    fn clone(&self) -> Self {
        match self {
            Expr::Succeed(v) => Expr::Succeed(v.clone()),
            Expr::Fail(e) => Expr::Fail(e.clone()),
            Expr::Read(id) => Expr::Read(*id),
            Expr::Write(id, v) => Expr::Write(*id, v.clone()),
            Expr::Check(cond) => Expr::Check(*cond),
            Expr::FlatMap(inner, k) => Expr::FlatMap(inner.clone(), Arc::clone(k)),
            Expr::OrElse(primary, fallback) => Expr::OrElse(primary.clone(), fallback.clone()),
        }
    }
}

impl<E> std::fmt::Debug for Expr<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Succeed(_) => f.write_str("Succeed"),
            Expr::Fail(_) => f.write_str("Fail"),
            Expr::Read(id) => write!(f, "Read({})", id),
            Expr::Write(id, _) => write!(f, "Write({})", id),
            Expr::Check(cond) => write!(f, "Check({})", cond),
            Expr::FlatMap(inner, _) => write!(f, "FlatMap({:?}, _)", inner),
            Expr::OrElse(p, q) => write!(f, "OrElse({:?}, {:?})", p, q),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomo_core::{erase, RefId};

    #[test]
    fn test_clone_shares_continuations() {
        let expr: Expr<()> = Expr::FlatMap(
            Box::new(Expr::Succeed(erase(1i64))),
            Arc::new(|v| Expr::Succeed(v)),
        );
        let cloned = expr.clone();
        match (&expr, &cloned) {
            (Expr::FlatMap(_, a), Expr::FlatMap(_, b)) => {
                assert!(Arc::ptr_eq(a, b));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_debug_is_structural() {
        let id = RefId::next();
        let expr: Expr<()> = Expr::OrElse(
            Box::new(Expr::Read(id)),
            Box::new(Expr::Check(false)),
        );
        let s = format!("{:?}", expr);
        assert!(s.contains("OrElse"));
        assert!(s.contains("Check(false)"));
    }
}
