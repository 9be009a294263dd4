//! Concurrency layer for the Atomo STM engine
//!
//! This crate implements optimistic concurrency control for transactional
//! references:
//! - Journal: per-attempt read/write log providing snapshot isolation
//! - Expr: the untyped transaction algebra
//! - Evaluator: trampolined interpreter producing Success, Failure, or Retry
//! - CommitManager: validate-then-apply commit loop with blocking retry
//! - WaitRegistry: wakes transactions blocked on a false precondition

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod eval;
pub mod expr;
pub mod journal;
pub mod manager;
pub mod waitlist;

pub use eval::{evaluate, Outcome};
pub use expr::{Cont, Expr};
pub use journal::{Entry, Journal};
pub use manager::{CommitError, CommitManager};
pub use waitlist::{CancelToken, WaitHandle, WaitRegistry};
