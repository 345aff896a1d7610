//! Workout manager — the lifecycle state machine and sample ingest lane.
//!
//! Owns the single active-workout cell. All mutations go through this
//! service, which serializes them behind one async lock — the persisted
//! store, the in-memory summary, and the latest-sample cell can never
//! disagree about which workout is active.
//!
//! ```text
//!   idle ──start_workout──▶ active ──sample*──▶ active
//!                             │
//!                             ├──end_workout───▶ finalizing ──▶ ended
//!                             └──transport lost + grace window──▶ aborted
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{watch, Mutex};

use fitbridge_domain::device::{ConnectionState, DeviceDescriptor, DisconnectReason};
use fitbridge_domain::error::{FitBridgeError, LifecycleError};
use fitbridge_domain::event::{BridgeEvent, EventType};
use fitbridge_domain::id::WorkoutId;
use fitbridge_domain::profile::UserProfile;
use fitbridge_domain::sample::Sample;
use fitbridge_domain::summary::{SummaryBuilder, WorkoutSummary};
use fitbridge_domain::time;
use fitbridge_domain::workout::{Workout, WorkoutState};

use crate::ports::source::SourceEvent;
use crate::ports::storage::AppendOutcome;
use crate::ports::{EventPublisher, SampleRepository, WorkoutRepository};

/// The in-flight recording session.
struct ActiveWorkout {
    workout: Workout,
    builder: SummaryBuilder,
    last_t: i64,
}

/// Snapshot of the active workout for the status endpoint.
#[derive(Debug, Clone)]
pub struct ActiveStatus {
    pub workout_id: WorkoutId,
    pub summary: WorkoutSummary,
}

/// Lifecycle state machine plus per-sample aggregation.
pub struct WorkoutManager<WR, SR, EP> {
    workouts: WR,
    samples: SR,
    publisher: EP,
    profile: UserProfile,
    active: Mutex<Option<ActiveWorkout>>,
    latest: watch::Sender<Option<Sample>>,
    duplicate_drops: AtomicU64,
}

impl<WR, SR, EP> WorkoutManager<WR, SR, EP>
where
    WR: WorkoutRepository + Send + Sync,
    SR: SampleRepository + Send + Sync,
    EP: EventPublisher + Send + Sync,
{
    /// Create a manager over the given repositories and publisher.
    pub fn new(workouts: WR, samples: SR, publisher: EP, profile: UserProfile) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            workouts,
            samples,
            publisher,
            profile,
            active: Mutex::new(None),
            latest,
            duplicate_drops: AtomicU64::new(0),
        }
    }

    /// Start recording against the given device.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::AlreadyActive`] when a workout is already
    /// active, or a storage error from workout creation.
    #[tracing::instrument(skip(self, device), fields(address = %device.address))]
    pub async fn start_workout(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<WorkoutId, FitBridgeError> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(LifecycleError::AlreadyActive.into());
        }

        let workout = Workout::builder()
            .device_address(&device.address)
            .device_name(&device.name)
            .kind(device.kind)
            .build()?;
        let workout = self.workouts.create(workout).await?;
        let workout_id = workout.id;

        self.latest.send_replace(None);
        *active = Some(ActiveWorkout {
            workout,
            builder: SummaryBuilder::new(),
            last_t: 0,
        });
        drop(active);

        tracing::info!(%workout_id, "workout started");
        self.publisher
            .publish(BridgeEvent::new(
                EventType::WorkoutStarted,
                Some(workout_id),
                serde_json::json!({ "device": device.address, "kind": device.kind }),
            ))
            .await?;

        Ok(workout_id)
    }

    /// Ingest one stamped sample.
    ///
    /// Samples arriving while no workout is active are dropped — FTMS
    /// machines broadcast continuously, and only the start/end calls gate
    /// persistence.
    ///
    /// # Errors
    ///
    /// A storage failure is fatal for the active workout: it is flipped to
    /// `aborted` and the error is returned.
    pub async fn ingest(&self, mut sample: Sample) -> Result<(), FitBridgeError> {
        let mut active = self.active.lock().await;
        let Some(current) = active.as_mut() else {
            return Ok(());
        };

        // Monotonic rule, re-applied in case a source bypassed the facade.
        if sample.t <= current.last_t {
            sample.t = current.last_t + 1;
        }
        current.last_t = sample.t;

        match self.samples.append(current.workout.id, sample.clone()).await {
            Ok(AppendOutcome::Inserted) => {}
            Ok(AppendOutcome::DuplicateDropped) => {
                self.duplicate_drops.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(workout_id = %current.workout.id, t = sample.t, "duplicate sample dropped");
                return Ok(());
            }
            Err(err) => {
                tracing::error!(%err, workout_id = %current.workout.id, "sample write failed, aborting workout");
                if let Some(interrupted) = active.take() {
                    drop(active);
                    if let Err(finalize_err) =
                        self.finalize(interrupted, WorkoutState::Aborted).await
                    {
                        tracing::error!(%finalize_err, "failed to finalize aborted workout");
                    }
                }
                return Err(err);
            }
        }

        current.builder.push(&sample);
        self.latest.send_replace(Some(sample));
        Ok(())
    }

    /// End the active workout: snapshot the summary, persist, flip to
    /// `ended`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotActive`] when nothing is recording.
    #[tracing::instrument(skip(self))]
    pub async fn end_workout(&self) -> Result<WorkoutId, FitBridgeError> {
        let mut active = self.active.lock().await;
        let Some(current) = active.take() else {
            return Err(LifecycleError::NotActive.into());
        };
        drop(active);

        let workout_id = current.workout.id;
        self.finalize(current, WorkoutState::Ended).await?;
        tracing::info!(%workout_id, "workout ended");
        Ok(workout_id)
    }

    /// Abort the active workout (terminal transport loss, restart, …).
    ///
    /// Returns the aborted workout id, or `None` when nothing was active.
    ///
    /// # Errors
    ///
    /// Propagates the storage error from finalization.
    pub async fn abort_active(&self) -> Result<Option<WorkoutId>, FitBridgeError> {
        let mut active = self.active.lock().await;
        let Some(current) = active.take() else {
            return Ok(None);
        };
        drop(active);

        let workout_id = current.workout.id;
        self.finalize(current, WorkoutState::Aborted).await?;
        tracing::warn!(%workout_id, "workout aborted");
        Ok(Some(workout_id))
    }

    async fn finalize(
        &self,
        current: ActiveWorkout,
        state: WorkoutState,
    ) -> Result<(), FitBridgeError> {
        let summary = current.builder.finish(&self.profile);
        let workout_id = current.workout.id;
        self.workouts
            .finalize(workout_id, time::now(), state, summary.clone())
            .await?;
        self.latest.send_replace(None);

        let event_type = match state {
            WorkoutState::Ended => EventType::WorkoutEnded,
            _ => EventType::WorkoutAborted,
        };
        self.publisher
            .publish(BridgeEvent::new(
                event_type,
                Some(workout_id),
                serde_json::json!({
                    "state": state,
                    "sample_count": summary.sample_count,
                }),
            ))
            .await?;
        Ok(())
    }

    /// Route one facade event: samples go to ingest, a terminal
    /// connection state aborts the active workout.
    ///
    /// # Errors
    ///
    /// Propagates ingest/abort storage errors.
    pub async fn handle_event(&self, event: SourceEvent) -> Result<(), FitBridgeError> {
        match event {
            SourceEvent::Sample(sample) => self.ingest(sample).await,
            SourceEvent::State(ConnectionState::Disconnected {
                reason: DisconnectReason::GaveUp,
            }) => self.abort_active().await.map(|_| ()),
            SourceEvent::State(_) => Ok(()),
        }
    }

    /// Whether a workout is currently recording.
    pub async fn is_active(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Id and live summary of the active workout, if any.
    pub async fn active_status(&self) -> Option<ActiveStatus> {
        let active = self.active.lock().await;
        active.as_ref().map(|current| ActiveStatus {
            workout_id: current.workout.id,
            summary: current.builder.finish(&self.profile),
        })
    }

    /// The most recent ingested sample (the single-value cell read by the
    /// control API).
    #[must_use]
    pub fn latest_sample(&self) -> Option<Sample> {
        self.latest.borrow().clone()
    }

    /// Subscribe to latest-sample updates.
    #[must_use]
    pub fn watch_latest(&self) -> watch::Receiver<Option<Sample>> {
        self.latest.subscribe()
    }

    /// Samples silently dropped because their key already existed.
    #[must_use]
    pub fn duplicate_drops(&self) -> u64 {
        self.duplicate_drops.load(Ordering::Relaxed)
    }
}
