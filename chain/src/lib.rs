//! The fluxvm block lifecycle core.
//!
//! [`StatelessBlock`] owns a block from parse (or local build) through
//! verification to acceptance or rejection, driven by an external consensus
//! engine. Verification interleaves three strands of work: signature checks
//! fan out onto the host's worker pool at parse time, declared state keys
//! prefetch concurrently once the parent state is resolved, and the
//! transaction batch then executes strictly in order against a forked trie
//! view. Acceptance commits that view into the canonical store.
//!
//! The host is abstracted behind [`Vm`]; the trie, worker pool, and chain
//! parameters behind the seams in `fluxvm-traits`.

use fluxvm_error::{Error, InternalErrorKind};

pub mod error;

mod block;
mod builder;
mod genesis;
mod processor;
mod signature;
mod vm;

#[cfg(test)]
mod tests;

pub use block::{StatelessBlock, Status};
pub use builder::build_block;
pub use genesis::{Allocation, Genesis};
pub use vm::Vm;

/// Maximum drift of a block timestamp into the future, in seconds.
pub const ALLOWED_FUTURE_DRIFT: i64 = 10;

/// Depth guard for on-demand ancestor verification during catch-up.
pub(crate) const MAX_VERIFY_DEPTH: usize = 128;

/// AcceptResult is the result type of [`StatelessBlock::accept`].
///
/// Ok(true) : the block was executed and its state committed
/// Ok(false): state sync is still in progress, the commit is deferred
/// Err(err) : the block failed verification or the commit failed
pub type AcceptResult = Result<bool, Error>;

pub(crate) fn interrupted(operation: &'static str) -> Error {
    InternalErrorKind::Interrupted
        .other(format!("{operation} interrupted"))
        .into()
}
