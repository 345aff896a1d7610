//! Storage port — repository traits for persistence.

use std::future::Future;

use fitbridge_domain::device::{CachedDevice, DeviceDescriptor};
use fitbridge_domain::error::FitBridgeError;
use fitbridge_domain::id::WorkoutId;
use fitbridge_domain::sample::Sample;
use fitbridge_domain::summary::WorkoutSummary;
use fitbridge_domain::time::Timestamp;
use fitbridge_domain::workout::{Workout, WorkoutRecord, WorkoutState};

/// What happened to an appended sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    /// The `(workout_id, t)` key already existed; the row was silently
    /// dropped. Only reachable when the monotonic stamp was bypassed
    /// (e.g. a clock regression replayed an old key).
    DuplicateDropped,
}

/// Repository for [`Workout`] persistence.
pub trait WorkoutRepository {
    /// Create a new workout row. Atomic.
    fn create(
        &self,
        workout: Workout,
    ) -> impl Future<Output = Result<Workout, FitBridgeError>> + Send;

    /// Get a workout (with its summary, if finalized) by id.
    fn get_by_id(
        &self,
        id: WorkoutId,
    ) -> impl Future<Output = Result<Option<WorkoutRecord>, FitBridgeError>> + Send;

    /// List workouts ordered by start time descending.
    fn list(
        &self,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<WorkoutRecord>, FitBridgeError>> + Send;

    /// All workouts still in the `active` state (restart sweep input).
    fn find_active(&self) -> impl Future<Output = Result<Vec<Workout>, FitBridgeError>> + Send;

    /// Write end time, terminal state, and summary in one transaction.
    fn finalize(
        &self,
        id: WorkoutId,
        ended_at: Timestamp,
        state: WorkoutState,
        summary: WorkoutSummary,
    ) -> impl Future<Output = Result<(), FitBridgeError>> + Send;
}

/// Repository for [`Sample`] persistence — append-only, keyed
/// `(workout_id, t)`.
pub trait SampleRepository {
    /// Append one sample. Duplicate keys are dropped, not errors.
    fn append(
        &self,
        workout_id: WorkoutId,
        sample: Sample,
    ) -> impl Future<Output = Result<AppendOutcome, FitBridgeError>> + Send;

    /// All samples of a workout ordered by `t` ascending.
    fn find_by_workout(
        &self,
        workout_id: WorkoutId,
    ) -> impl Future<Output = Result<Vec<Sample>, FitBridgeError>> + Send;

    /// A page of samples ordered by `t` ascending.
    fn find_by_workout_page(
        &self,
        workout_id: WorkoutId,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<Sample>, FitBridgeError>> + Send;

    /// Number of samples persisted for a workout.
    fn count_by_workout(
        &self,
        workout_id: WorkoutId,
    ) -> impl Future<Output = Result<u64, FitBridgeError>> + Send;
}

/// Repository for the persistent discovery cache.
pub trait DeviceCacheRepository {
    /// Insert or refresh a device by address.
    fn upsert(
        &self,
        descriptor: DeviceDescriptor,
        last_seen: Timestamp,
    ) -> impl Future<Output = Result<(), FitBridgeError>> + Send;

    /// All cached devices, most recently seen first.
    fn get_all(&self) -> impl Future<Output = Result<Vec<CachedDevice>, FitBridgeError>> + Send;

    /// Look up one cached device by address.
    fn get_by_address(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Option<CachedDevice>, FitBridgeError>> + Send;
}
