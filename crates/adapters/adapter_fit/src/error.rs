//! FIT encoder error types.

use fitbridge_domain::error::FitBridgeError;

/// Why an activity file could not be produced. Never partial: any of
/// these means zero bytes were emitted.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FitEncodeError {
    /// A file without records confuses every downstream parser.
    #[error("workout has no samples to encode")]
    EmptyWorkout,

    /// Only terminal workouts carry the end time the session needs.
    #[error("workout has no end time")]
    MissingEndTime,

    /// A timestamp falls outside what a FIT date_time can represent.
    #[error("timestamp outside the FIT epoch range")]
    TimestampOutOfRange,
}

impl From<FitEncodeError> for FitBridgeError {
    fn from(err: FitEncodeError) -> Self {
        FitBridgeError::Encoding(Box::new(err))
    }
}
