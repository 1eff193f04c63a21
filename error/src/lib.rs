//! Underlying error types used over the fluxvm crates.
//!
//! Most errors in the workspace are wrapped into an [`Error`], which pairs a
//! coarse [`ErrorKind`] with the boxed concrete cause. Callers branch on the
//! kind, or downcast to the concrete error when they need the payload.

use derive_more::Display;

pub use anyhow::Error as AnyError;

#[macro_use]
mod macros;

mod internal;
mod util;

pub use internal::{InternalError, InternalErrorKind, OtherError, SilentError};
pub use util::assert_error_eq;

/// A list specifying categories of fluxvm error.
///
/// This list is intended to grow over time and it is not recommended to
/// exhaustively match against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    /// Wire decoding or encoding failure, including trailing bytes.
    Codec,
    /// Violation of a header-level rule, e.g. timestamp bounds.
    Header,
    /// Violation of a block-level rule, e.g. fee-context mismatch.
    Block,
    /// Transaction-level failure, e.g. an invalid signature.
    Transaction,
    /// An error not caused by the input itself.
    Internal,
}

def_error_base_on_kind!(Error, ErrorKind, "Top-level error in fluxvm.");
