//! Outcome conversion for handler return values.

use crate::error::BoxError;

/// Trait for converting a handler's return value into a delivery outcome.
///
/// # Default Implementations
///
/// - `()` → delivered
/// - `Result<T, E>` → delegates to `T`, or reports `E` as a listener failure
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not an `IntoOutcome`",
    label = "handlers must return `()` or `Result<(), E>`",
    note = "IntoOutcome must implement the `into_outcome` method."
)]
pub trait IntoOutcome {
    /// Convert the value into a delivery outcome.
    fn into_outcome(self) -> Result<(), BoxError>;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Into<BoxError>,
{
    fn into_outcome(self) -> Result<(), BoxError> {
        match self {
            Ok(t) => t.into_outcome(),
            Err(e) => Err(e.into()),
        }
    }
}
