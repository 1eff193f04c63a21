/// Defines an error type which wraps a concrete cause and tags it with a kind.
///
/// The generated type keeps the cause as an [`crate::AnyError`], so callers
/// can still downcast to the original error when they need its payload.
#[macro_export]
macro_rules! def_error_base_on_kind {
    ($error:ident, $error_kind:ty, $comment:expr) => {
        #[doc = $comment]
        #[derive(Debug)]
        pub struct $error {
            kind: $error_kind,
            inner: $crate::AnyError,
        }

        impl $error {
            /// Wraps `inner` with the given kind.
            pub fn new<E>(kind: $error_kind, inner: E) -> Self
            where
                E: ::std::error::Error + Send + Sync + 'static,
            {
                Self {
                    kind,
                    inner: $crate::AnyError::new(inner),
                }
            }

            /// The general category of this error.
            pub fn kind(&self) -> $error_kind {
                self.kind
            }

            /// Attempts to downcast the wrapped cause by reference.
            pub fn downcast_ref<E>(&self) -> Option<&E>
            where
                E: ::std::fmt::Display + ::std::fmt::Debug + Send + Sync + 'static,
            {
                self.inner.downcast_ref::<E>()
            }

            /// The lowest-level cause in the chain.
            pub fn root_cause(&self) -> &(dyn ::std::error::Error + 'static) {
                self.inner.root_cause()
            }
        }

        impl ::std::fmt::Display for $error {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}: {}", self.kind, self.inner)
            }
        }

        impl ::std::error::Error for $error {}
    };
}

/// Implements `From<$source> for $target`, tagging the source with `$kind`.
#[macro_export]
macro_rules! impl_error_conversion_with_kind {
    ($source:ty, $kind:expr, $target:ty) => {
        impl ::std::convert::From<$source> for $target {
            fn from(error: $source) -> Self {
                <$target>::new($kind, error)
            }
        }
    };
}

/// Implements `From<$source> for $target` by converting through `$adaptor`.
#[macro_export]
macro_rules! impl_error_conversion_with_adaptor {
    ($source:ty, $adaptor:ty, $target:ty) => {
        impl ::std::convert::From<$source> for $target {
            fn from(error: $source) -> Self {
                ::std::convert::Into::<$target>::into(::std::convert::Into::<$adaptor>::into(error))
            }
        }
    };
}
