//! Typed transaction combinators
//!
//! `Tx<A, E>` wraps the untyped expression algebra with a phantom result
//! type. Building a `Tx` performs no shared-memory access; it is a pure
//! description that the commit coordinator may evaluate any number of
//! times. Concrete values are erased going into the tree and restored at
//! `and_then`/`map` boundaries and at commit.
//!
//! Closures passed to combinators run once per evaluation attempt and must
//! be pure: no I/O, no external mutation, no irreversible effects. A
//! transaction that conflicts re-runs them with fresh data.

use atomo_concurrency::Expr;
use atomo_core::{downcast, erase};
use std::marker::PhantomData;
use std::sync::Arc;

/// A composable, re-evaluable transaction producing `A` or failing with `E`.
pub struct Tx<A, E> {
    pub(crate) expr: Expr<E>,
    _result: PhantomData<fn() -> A>,
}

impl<A, E> Tx<A, E> {
    pub(crate) fn from_expr(expr: Expr<E>) -> Self {
        Self {
            expr,
            _result: PhantomData,
        }
    }
}

impl<A, E: Clone> Clone for Tx<A, E> {
    fn clone(&self) -> Self {
        Self::from_expr(self.expr.clone())
    }
}

impl<A, E> std::fmt::Debug for Tx<A, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tx({:?})", self.expr)
    }
}

impl<A, E> Tx<A, E>
where
    A: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// A transaction that produces `value` without touching any ref.
    pub fn succeed(value: A) -> Self {
        Self::from_expr(Expr::Succeed(erase(value)))
    }

    /// A transaction that fails with `error`. Failures surface to the
    /// caller verbatim and are never retried.
    pub fn fail(error: E) -> Self {
        Self::from_expr(Expr::Fail(error))
    }

    /// A transaction that always blocks until a touched ref changes.
    ///
    /// On its own this watches nothing and can only be released by
    /// cancellation; sequence it after reads to watch those refs.
    pub fn retry() -> Self {
        // Check(false) never yields, so the phantom result type is safe.
        Self::from_expr(Expr::Check(false))
    }

    /// Sequence: run `self`, feed its result to `k`, run the returned
    /// transaction on the same journal.
    pub fn and_then<B, F>(self, k: F) -> Tx<B, E>
    where
        B: Clone + Send + Sync + 'static,
        F: Fn(A) -> Tx<B, E> + Send + Sync + 'static,
    {
        Tx::from_expr(Expr::FlatMap(
            Box::new(self.expr),
            Arc::new(move |value| k(downcast::<A>(&value)).expr),
        ))
    }

    /// Transform the result without touching any ref.
    pub fn map<B, F>(self, f: F) -> Tx<B, E>
    where
        B: Clone + Send + Sync + 'static,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        Tx::from_expr(Expr::FlatMap(
            Box::new(self.expr),
            Arc::new(move |value| Expr::Succeed(erase(f(downcast::<A>(&value))))),
        ))
    }

    /// Sequence, discarding this transaction's result.
    pub fn then<B>(self, next: Tx<B, E>) -> Tx<B, E>
    where
        B: Clone + Send + Sync + 'static,
    {
        let next_expr = next.expr;
        Tx::from_expr(Expr::FlatMap(
            Box::new(self.expr),
            Arc::new(move |_| next_expr.clone()),
        ))
    }

    /// Conditional fallback: if `self` retries, try `fallback` on a clean
    /// view. Success and failure of `self` are taken as-is; if both
    /// branches retry, the transaction blocks on every ref either touched.
    pub fn or_else(self, fallback: Tx<A, E>) -> Tx<A, E> {
        Tx::from_expr(Expr::OrElse(Box::new(self.expr), Box::new(fallback.expr)))
    }
}

impl<E> Tx<(), E>
where
    E: Clone + Send + Sync + 'static,
{
    /// Precondition gate: proceed when `cond` is true, otherwise retry.
    ///
    /// A false check carries no error detail ("retries silently"); use
    /// [`Tx::fail`] when the caller should see a diagnosable failure.
    pub fn check(cond: bool) -> Self {
        Self::from_expr(Expr::Check(cond))
    }

    /// The unit transaction.
    pub fn unit() -> Self {
        Self::succeed(())
    }
}
