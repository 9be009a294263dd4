//! Type-erased cell contents
//!
//! The journal, store, and evaluator are monomorphic over `DynValue`; the
//! typed `TRef<A>`/`Tx<A, E>` wrappers in the facade crate are the only code
//! that erases and restores concrete types. A failed downcast therefore
//! means the typed layer has a bug, not that user input was malformed, and
//! is treated as a defect (panic) rather than a recoverable error.

use std::any::Any;
use std::sync::Arc;

/// Type-erased, shareable cell value.
///
/// Values are cloned by bumping the `Arc`, never by copying the payload, so
/// journals stay cheap regardless of payload size.
pub type DynValue = Arc<dyn Any + Send + Sync>;

/// Erase a concrete value.
pub fn erase<A: Send + Sync + 'static>(value: A) -> DynValue {
    Arc::new(value)
}

/// The unit value, produced by write and check operations.
pub fn unit() -> DynValue {
    Arc::new(())
}

/// Restore a concrete value from an erased one.
///
/// # Panics
///
/// Panics if `value` does not hold an `A`. The typed facade is the only
/// minter of `DynValue`s, so a mismatch here is an internal invariant
/// violation, equivalent to an index out of bounds.
pub fn downcast<A: Clone + Send + Sync + 'static>(value: &DynValue) -> A {
    match value.downcast_ref::<A>() {
        Some(v) => v.clone(),
        None => panic!(
            "transactional value type mismatch: expected {}",
            std::any::type_name::<A>()
        ),
    }
}
