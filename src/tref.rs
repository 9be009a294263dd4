//! Typed transactional reference handles
//!
//! A `TRef<A>` is a `Copy` handle to one versioned cell in its space's
//! store. It holds no value itself; all access goes through transactions,
//! and the only way to obtain one is [`Atomo::new_ref`].
//!
//! [`Atomo::new_ref`]: crate::Atomo::new_ref

use crate::tx::Tx;
use atomo_concurrency::Expr;
use atomo_core::{erase, RefId};
use std::marker::PhantomData;

/// Handle to a transactional cell holding an `A`.
///
/// Handles are freely shareable and copyable; they stay valid for the
/// lifetime of the space that created them. Using a handle against a
/// different space is a defect and panics inside the store.
pub struct TRef<A> {
    id: RefId,
    _value: PhantomData<fn() -> A>,
}

impl<A> TRef<A> {
    pub(crate) fn from_id(id: RefId) -> Self {
        Self {
            id,
            _value: PhantomData,
        }
    }

    /// Stable identity of this ref, for diagnostics.
    pub fn id(&self) -> RefId {
        self.id
    }
}

impl<A> Clone for TRef<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for TRef<A> {}

impl<A> std::fmt::Debug for TRef<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TRef({})", self.id)
    }
}

impl<A> PartialEq for TRef<A> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<A> Eq for TRef<A> {}

impl<A> TRef<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Read the cell through the current transaction's journal.
    pub fn read<E>(&self) -> Tx<A, E>
    where
        E: Clone + Send + Sync + 'static,
    {
        Tx::from_expr(Expr::Read(self.id))
    }

    /// Write the cell through the current transaction's journal.
    ///
    /// The shared store is untouched until the transaction commits.
    pub fn write<E>(&self, value: A) -> Tx<(), E>
    where
        E: Clone + Send + Sync + 'static,
    {
        Tx::from_expr(Expr::Write(self.id, erase(value)))
    }

    /// Read-modify-write convenience: `write(f(read()))`.
    pub fn update<E, F>(&self, f: F) -> Tx<(), E>
    where
        E: Clone + Send + Sync + 'static,
        F: Fn(A) -> A + Send + Sync + 'static,
    {
        let cell = *self;
        self.read().and_then(move |value| cell.write(f(value)))
    }
}
