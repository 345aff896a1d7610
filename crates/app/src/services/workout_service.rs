//! Workout service — read paths and the restart sweep.

use fitbridge_domain::error::{FitBridgeError, NotFoundError};
use fitbridge_domain::id::WorkoutId;
use fitbridge_domain::profile::UserProfile;
use fitbridge_domain::sample::Sample;
use fitbridge_domain::summary::SummaryBuilder;
use fitbridge_domain::time;
use fitbridge_domain::workout::{WorkoutRecord, WorkoutState};

use crate::ports::{SampleRepository, WorkoutRepository};

/// Default page size for workout listings.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Read-side use-cases over the workout store.
pub struct WorkoutService<WR, SR> {
    workouts: WR,
    samples: SR,
    profile: UserProfile,
}

impl<WR, SR> WorkoutService<WR, SR>
where
    WR: WorkoutRepository + Send + Sync,
    SR: SampleRepository + Send + Sync,
{
    /// Create a new service backed by the given repositories.
    pub fn new(workouts: WR, samples: SR, profile: UserProfile) -> Self {
        Self {
            workouts,
            samples,
            profile,
        }
    }

    /// List workouts, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_workouts(
        &self,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<WorkoutRecord>, FitBridgeError> {
        self.workouts
            .list(limit.unwrap_or(DEFAULT_LIST_LIMIT), offset.unwrap_or(0))
            .await
    }

    /// Look up a workout by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`FitBridgeError::NotFound`] when no workout with `id`
    /// exists, or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_workout(&self, id: WorkoutId) -> Result<WorkoutRecord, FitBridgeError> {
        self.workouts.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Workout",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// All samples of a workout in timestamp order.
    ///
    /// # Errors
    ///
    /// Returns [`FitBridgeError::NotFound`] for an unknown workout.
    pub async fn get_samples(&self, id: WorkoutId) -> Result<Vec<Sample>, FitBridgeError> {
        self.get_workout(id).await?;
        self.samples.find_by_workout(id).await
    }

    /// One page of samples in timestamp order — the lazy read used by the
    /// control API so large workouts never materialize at once.
    ///
    /// # Errors
    ///
    /// Returns [`FitBridgeError::NotFound`] for an unknown workout.
    pub async fn get_samples_page(
        &self,
        id: WorkoutId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Sample>, FitBridgeError> {
        self.get_workout(id).await?;
        self.samples.find_by_workout_page(id, limit, offset).await
    }

    /// Sweep workouts left `active` by a crash: recompute each summary
    /// from its persisted samples and finalize as `aborted`.
    ///
    /// Returns the number of workouts swept. Call once at startup, before
    /// the manager accepts new work.
    ///
    /// # Errors
    ///
    /// Returns the first storage error encountered.
    pub async fn recover_interrupted(&self) -> Result<usize, FitBridgeError> {
        let interrupted = self.workouts.find_active().await?;
        let count = interrupted.len();

        for workout in interrupted {
            let samples = self.samples.find_by_workout(workout.id).await?;
            let mut builder = SummaryBuilder::new();
            for sample in &samples {
                builder.push(sample);
            }
            let summary = builder.finish(&self.profile);

            // Prefer the last persisted sample as the end time; fall back
            // to now for a workout that never produced one.
            let ended_at = samples
                .last()
                .and_then(|s| time::from_micros(s.t))
                .unwrap_or_else(time::now);

            tracing::warn!(
                workout_id = %workout.id,
                samples = samples.len(),
                "sweeping interrupted workout to aborted"
            );
            self.workouts
                .finalize(workout.id, ended_at, WorkoutState::Aborted, summary)
                .await?;
        }

        Ok(count)
    }
}
