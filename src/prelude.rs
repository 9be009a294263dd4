//! Convenience re-exports for everyday use.
//!
//! ```
//! use atomo::prelude::*;
//! ```

pub use crate::space::Atomo;
pub use crate::tref::TRef;
pub use crate::tx::Tx;
pub use atomo_concurrency::{CancelToken, CommitError};
