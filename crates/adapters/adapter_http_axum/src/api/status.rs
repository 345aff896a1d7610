//! The status endpoint — the single poll target for the UI.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use fitbridge_app::ports::source::DeviceSource;
use fitbridge_app::ports::{
    ActivityEncoder, DeviceCacheRepository, EventPublisher, SampleRepository, WorkoutRepository,
};
use fitbridge_domain::device::{ConnectionState, DeviceDescriptor};
use fitbridge_domain::id::WorkoutId;
use fitbridge_domain::sample::Sample;
use fitbridge_domain::summary::WorkoutSummary;

use crate::error::ApiError;
use crate::state::AppState;

/// Snapshot of everything the UI needs per poll.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub device_state: ConnectionState,
    pub connected_device: Option<DeviceDescriptor>,
    pub workout_active: bool,
    pub workout_id: Option<WorkoutId>,
    /// The single-value latest-sample cell.
    pub latest_sample: Option<Sample>,
    /// Live summary of the active workout.
    pub summary: Option<WorkoutSummary>,
}

/// `GET /api/status`
pub async fn get_status<L, S, WR, SR, DR, EP, E>(
    State(state): State<AppState<L, S, WR, SR, DR, EP, E>>,
) -> Result<Json<StatusResponse>, ApiError>
where
    L: DeviceSource + Send + Sync + 'static,
    S: DeviceSource + Send + Sync + 'static,
    WR: WorkoutRepository + Send + Sync + 'static,
    SR: SampleRepository + Send + Sync + 'static,
    DR: DeviceCacheRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    E: ActivityEncoder + Send + Sync + 'static,
{
    let active = state.manager.active_status().await;

    Ok(Json(StatusResponse {
        device_state: state.facade.connection_state(),
        connected_device: state.facade.connected_device(),
        workout_active: active.is_some(),
        workout_id: active.as_ref().map(|a| a.workout_id),
        latest_sample: state.manager.latest_sample(),
        summary: active.map(|a| a.summary),
    }))
}
