//! Encoder port — workout to activity-file bytes.

use fitbridge_domain::error::FitBridgeError;
use fitbridge_domain::sample::Sample;
use fitbridge_domain::summary::WorkoutSummary;
use fitbridge_domain::workout::Workout;

/// Encodes a finished workout into an activity-file byte stream.
///
/// Encoding is pure CPU work, so the trait is synchronous. An implementation
/// must never return partial output: any failure is an error and no bytes
/// are produced.
pub trait ActivityEncoder {
    /// Encode the workout into a complete file image.
    ///
    /// # Errors
    ///
    /// Returns [`FitBridgeError::Encoding`] when the workout cannot be
    /// represented (no samples, missing end time, timestamp out of range).
    fn encode(
        &self,
        workout: &Workout,
        samples: &[Sample],
        summary: &WorkoutSummary,
    ) -> Result<Vec<u8>, FitBridgeError>;
}
