use crate::AnyError;

/// Compares two errors by their display output.
///
/// Errors wrapped into [`crate::Error`] lose structural equality; rendering
/// both sides is the practical way for tests to assert a specific failure.
pub fn assert_error_eq<L, R>(left: L, right: R)
where
    L: Into<AnyError>,
    R: Into<AnyError>,
{
    assert_eq!(
        Into::<AnyError>::into(left).to_string(),
        Into::<AnyError>::into(right).to_string(),
    );
}
