//! # Atomo
//!
//! Composable software transactional memory for concurrent Rust.
//!
//! Atomo coordinates shared mutable state through transactions instead of
//! locks. A transaction is a value: an immutable program built from reads,
//! writes, precondition checks, sequencing, and fallback. The engine
//! evaluates it against a private journal and commits atomically under
//! optimistic concurrency control. Transactions that conflict re-run;
//! transactions whose precondition is false block until a relevant commit,
//! then re-run.
//!
//! ## Quick Start
//!
//! ```
//! use atomo::prelude::*;
//!
//! let space = Atomo::new();
//! let account = space.new_ref(100i64);
//!
//! // Withdraw 40, failing (not blocking) on insufficient funds.
//! let withdraw: Tx<i64, &str> = account.read().and_then(move |balance| {
//!     if balance >= 40 {
//!         account.write(balance - 40).map(move |_| balance - 40)
//!     } else {
//!         Tx::fail("insufficient funds")
//!     }
//! });
//!
//! let remaining = space.commit(&withdraw).unwrap();
//! assert_eq!(remaining, 60);
//! ```
//!
//! ## Blocking on a condition
//!
//! `Tx::check` turns a false precondition into a retry: the transaction
//! parks until another commit writes one of the refs it read, then
//! re-evaluates from scratch.
//!
//! ```
//! use atomo::prelude::*;
//! use std::thread;
//!
//! let space = Atomo::new();
//! let inbox = space.new_ref(Vec::<String>::new());
//!
//! let consumer = {
//!     let space = space.clone();
//!     thread::spawn(move || {
//!         // Block until the inbox is non-empty, then drain it.
//!         let take: Tx<Vec<String>, &str> = inbox.read().and_then(move |msgs| {
//!             Tx::check(!msgs.is_empty())
//!                 .then(inbox.write(Vec::new()))
//!                 .map(move |_| msgs.clone())
//!         });
//!         space.commit(&take).unwrap()
//!     })
//! };
//!
//! let send: Tx<(), &str> = inbox.update(|mut msgs| {
//!     msgs.push("hello".to_string());
//!     msgs
//! });
//! space.commit(&send).unwrap();
//!
//! assert_eq!(consumer.join().unwrap(), vec!["hello".to_string()]);
//! ```
//!
//! ## Guarantees
//!
//! - **Atomicity**: all of a transaction's writes land in one step or not
//!   at all; no observer sees a partial commit.
//! - **Isolation**: every attempt sees one consistent snapshot; two reads
//!   of the same ref in one attempt always agree.
//! - **Per-ref linearization**: each committed write bumps the ref's
//!   version by exactly 1.
//!
//! ## Discipline
//!
//! Combinator closures may run many times (conflicts, retries, fallback
//! replays). Keep them pure: no I/O, no locks, no mutation of anything
//! outside the transaction.

#![warn(missing_docs)]

mod space;
mod tref;
mod tx;

pub mod prelude;

// Re-export main entry points
pub use space::Atomo;
pub use tref::TRef;
pub use tx::Tx;

// Re-export the coordination vocabulary
pub use atomo_concurrency::{CancelToken, CommitError};
pub use atomo_core::{RefId, Version};
