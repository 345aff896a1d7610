//! Export service — turn a finished workout into a FIT download.

use std::path::PathBuf;

use fitbridge_domain::error::{FitBridgeError, LifecycleError, NotFoundError};
use fitbridge_domain::id::WorkoutId;
use fitbridge_domain::profile::UserProfile;
use fitbridge_domain::summary::SummaryBuilder;
use fitbridge_domain::workout::WorkoutState;

use crate::ports::{ActivityEncoder, SampleRepository, WorkoutRepository};

/// A fully encoded activity file ready to hand to the download layer.
#[derive(Debug, Clone)]
pub struct FitExport {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Use-case: fetch, gate, encode, and optionally cache a FIT file.
pub struct ExportService<WR, SR, E> {
    workouts: WR,
    samples: SR,
    encoder: E,
    profile: UserProfile,
    /// When set, every export is also written here as
    /// `workout_<id>_<iso8601>.fit`.
    cache_dir: Option<PathBuf>,
}

impl<WR, SR, E> ExportService<WR, SR, E>
where
    WR: WorkoutRepository + Send + Sync,
    SR: SampleRepository + Send + Sync,
    E: ActivityEncoder + Send + Sync,
{
    /// Create a new service backed by the given repositories and encoder.
    pub fn new(
        workouts: WR,
        samples: SR,
        encoder: E,
        profile: UserProfile,
        cache_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            workouts,
            samples,
            encoder,
            profile,
            cache_dir,
        }
    }

    /// Encode the workout into a FIT file.
    ///
    /// Only terminal workouts can be exported. A missing persisted summary
    /// (legacy rows) is recomputed from the samples. Failure to write the
    /// cache copy is logged, not fatal — the caller still gets the bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FitBridgeError::NotFound`] for an unknown workout,
    /// [`LifecycleError::NotEnded`] for one still active, and
    /// [`FitBridgeError::Encoding`] when the encoder refuses.
    #[tracing::instrument(skip(self))]
    pub async fn export_fit(&self, id: WorkoutId) -> Result<FitExport, FitBridgeError> {
        let record = self.workouts.get_by_id(id).await?.ok_or(NotFoundError {
            entity: "Workout",
            id: id.to_string(),
        })?;

        if record.workout.state == WorkoutState::Active {
            return Err(LifecycleError::NotEnded.into());
        }

        let samples = self.samples.find_by_workout(id).await?;

        let summary = match record.summary {
            Some(summary) => summary,
            None => {
                let mut builder = SummaryBuilder::new();
                for sample in &samples {
                    builder.push(sample);
                }
                builder.finish(&self.profile)
            }
        };

        let bytes = self.encoder.encode(&record.workout, &samples, &summary)?;

        let filename = format!(
            "workout_{}_{}.fit",
            record.workout.id,
            record.workout.started_at.format("%Y%m%dT%H%M%SZ")
        );

        if let Some(dir) = &self.cache_dir {
            let path = dir.join(&filename);
            if let Err(err) = self.write_cache_copy(&path, &bytes).await {
                tracing::warn!(%err, path = %path.display(), "failed to write FIT cache copy");
            }
        }

        tracing::info!(%id, size = bytes.len(), %filename, "FIT export complete");
        Ok(FitExport { filename, bytes })
    }

    async fn write_cache_copy(
        &self,
        path: &std::path::Path,
        bytes: &[u8],
    ) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::storage::AppendOutcome;
    use fitbridge_domain::device::EquipmentKind;
    use fitbridge_domain::sample::Sample;
    use fitbridge_domain::summary::WorkoutSummary;
    use fitbridge_domain::time::{self, Timestamp};
    use fitbridge_domain::workout::{Workout, WorkoutRecord};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryWorkoutRepo {
        store: Mutex<HashMap<WorkoutId, WorkoutRecord>>,
    }

    impl WorkoutRepository for InMemoryWorkoutRepo {
        async fn create(&self, workout: Workout) -> Result<Workout, FitBridgeError> {
            self.store.lock().unwrap().insert(
                workout.id,
                WorkoutRecord {
                    workout: workout.clone(),
                    summary: None,
                },
            );
            Ok(workout)
        }

        async fn get_by_id(&self, id: WorkoutId) -> Result<Option<WorkoutRecord>, FitBridgeError> {
            Ok(self.store.lock().unwrap().get(&id).cloned())
        }

        async fn list(
            &self,
            _limit: usize,
            _offset: usize,
        ) -> Result<Vec<WorkoutRecord>, FitBridgeError> {
            Ok(Vec::new())
        }

        async fn find_active(&self) -> Result<Vec<Workout>, FitBridgeError> {
            Ok(Vec::new())
        }

        async fn finalize(
            &self,
            id: WorkoutId,
            ended_at: Timestamp,
            state: WorkoutState,
            summary: WorkoutSummary,
        ) -> Result<(), FitBridgeError> {
            let mut store = self.store.lock().unwrap();
            let record = store.get_mut(&id).unwrap();
            record.workout.ended_at = Some(ended_at);
            record.workout.state = state;
            record.summary = Some(summary);
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemorySampleRepo {
        rows: Mutex<HashMap<WorkoutId, Vec<Sample>>>,
    }

    impl SampleRepository for InMemorySampleRepo {
        async fn append(
            &self,
            workout_id: WorkoutId,
            sample: Sample,
        ) -> Result<AppendOutcome, FitBridgeError> {
            self.rows
                .lock()
                .unwrap()
                .entry(workout_id)
                .or_default()
                .push(sample);
            Ok(AppendOutcome::Inserted)
        }

        async fn find_by_workout(
            &self,
            workout_id: WorkoutId,
        ) -> Result<Vec<Sample>, FitBridgeError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .get(&workout_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn find_by_workout_page(
            &self,
            workout_id: WorkoutId,
            limit: usize,
            offset: usize,
        ) -> Result<Vec<Sample>, FitBridgeError> {
            let all = self.find_by_workout(workout_id).await?;
            Ok(all.into_iter().skip(offset).take(limit).collect())
        }

        async fn count_by_workout(&self, workout_id: WorkoutId) -> Result<u64, FitBridgeError> {
            Ok(self.find_by_workout(workout_id).await?.len() as u64)
        }
    }

    /// Encoder stub that echoes how many samples it saw.
    struct CountingEncoder;

    impl ActivityEncoder for CountingEncoder {
        fn encode(
            &self,
            _workout: &Workout,
            samples: &[Sample],
            _summary: &fitbridge_domain::summary::WorkoutSummary,
        ) -> Result<Vec<u8>, FitBridgeError> {
            if samples.is_empty() {
                return Err(FitBridgeError::Encoding("no samples".into()));
            }
            Ok(vec![0xAB; samples.len()])
        }
    }

    fn service() -> ExportService<InMemoryWorkoutRepo, InMemorySampleRepo, CountingEncoder> {
        ExportService::new(
            InMemoryWorkoutRepo::default(),
            InMemorySampleRepo::default(),
            CountingEncoder,
            UserProfile::default(),
            None,
        )
    }

    async fn seed_ended_workout(
        service: &ExportService<InMemoryWorkoutRepo, InMemorySampleRepo, CountingEncoder>,
        sample_count: usize,
    ) -> WorkoutId {
        let workout = Workout::builder()
            .device_address("AA:BB")
            .device_name("Echo Bike")
            .kind(EquipmentKind::Bike)
            .build()
            .unwrap();
        let id = workout.id;
        service.workouts.create(workout).await.unwrap();

        for i in 0..sample_count {
            let mut sample = Sample::empty((i as i64 + 1) * 1_000_000, EquipmentKind::Bike);
            sample.instant_power_w = Some(150);
            service.samples.append(id, sample).await.unwrap();
        }

        service
            .workouts
            .finalize(
                id,
                time::now(),
                WorkoutState::Ended,
                WorkoutSummary::default(),
            )
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn should_export_ended_workout() {
        let service = service();
        let id = seed_ended_workout(&service, 3).await;

        let export = service.export_fit(id).await.unwrap();
        assert_eq!(export.bytes.len(), 3);
        assert!(export.filename.starts_with(&format!("workout_{id}_")));
        assert!(export.filename.ends_with(".fit"));
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_workout() {
        let service = service();
        let result = service.export_fit(WorkoutId::new()).await;
        assert!(matches!(result, Err(FitBridgeError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_reject_export_of_active_workout() {
        let service = service();
        let workout = Workout::builder()
            .device_address("AA:BB")
            .kind(EquipmentKind::Bike)
            .build()
            .unwrap();
        let id = workout.id;
        service.workouts.create(workout).await.unwrap();

        let result = service.export_fit(id).await;
        assert!(matches!(
            result,
            Err(FitBridgeError::Lifecycle(LifecycleError::NotEnded))
        ));
    }

    #[tokio::test]
    async fn should_propagate_encoder_refusal() {
        let service = service();
        let id = seed_ended_workout(&service, 0).await;

        let result = service.export_fit(id).await;
        assert!(matches!(result, Err(FitBridgeError::Encoding(_))));
    }

    #[tokio::test]
    async fn should_write_cache_copy_when_dir_configured() {
        let dir = std::env::temp_dir().join(format!("fitbridge-test-{}", uuid()));
        let service = ExportService::new(
            InMemoryWorkoutRepo::default(),
            InMemorySampleRepo::default(),
            CountingEncoder,
            UserProfile::default(),
            Some(dir.clone()),
        );
        let id = seed_ended_workout(&service, 2).await;

        let export = service.export_fit(id).await.unwrap();

        let cached = std::fs::read(dir.join(&export.filename)).unwrap();
        assert_eq!(cached, export.bytes);
        std::fs::remove_dir_all(&dir).ok();
    }

    fn uuid() -> String {
        WorkoutId::new().to_string()
    }
}
