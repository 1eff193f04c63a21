use derive_more::Display;
use std::fmt;
use thiserror::Error;

/// An error with no reason.
#[derive(Error, Debug, Clone, Copy)]
#[error("no reason is provided")]
pub struct SilentError;

/// An error with only a string as the reason.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct OtherError(String);

/// A list specifying categories of fluxvm internal error.
///
/// This list is intended to grow over time and it is not recommended to
/// exhaustively match against it.
///
/// It is used with the [`InternalError`].
#[derive(Debug, PartialEq, Eq, Clone, Copy, Display)]
pub enum InternalErrorKind {
    /// The operation observed the ambient cancellation token and stopped.
    Interrupted,

    /// A worker pool or channel broke underneath the core.
    System,

    /// The feature is disabled or conflicts with the configuration.
    Config,

    /// Other internal error.
    Other,
}

def_error_base_on_kind!(InternalError, InternalErrorKind, "Internal error.");

impl_error_conversion_with_kind!(InternalError, crate::ErrorKind::Internal, crate::Error);

impl_error_conversion_with_kind!(OtherError, InternalErrorKind::Other, InternalError);
impl_error_conversion_with_adaptor!(OtherError, InternalError, crate::Error);

impl OtherError {
    /// Creates an error with only a string as the reason.
    pub fn new<T>(reason: T) -> Self
    where
        T: fmt::Display,
    {
        Self(reason.to_string())
    }
}

impl InternalErrorKind {
    /// Creates an `InternalError` of this kind with a string as the reason.
    pub fn other<T>(self, reason: T) -> InternalError
    where
        T: fmt::Display,
    {
        InternalError::new(self, OtherError::new(reason))
    }

    /// Creates an `InternalError` of this kind without a reason.
    pub fn because(self) -> InternalError {
        InternalError::new(self, SilentError)
    }
}
