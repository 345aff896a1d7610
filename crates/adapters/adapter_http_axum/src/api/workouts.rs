//! JSON REST handlers for the workout lifecycle, history, and FIT export.

use std::str::FromStr;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use fitbridge_app::ports::source::DeviceSource;
use fitbridge_app::ports::{
    ActivityEncoder, DeviceCacheRepository, EventPublisher, SampleRepository, WorkoutRepository,
};
use fitbridge_domain::error::{FitBridgeError, LifecycleError, ValidationError};
use fitbridge_domain::id::WorkoutId;
use fitbridge_domain::sample::Sample;
use fitbridge_domain::workout::WorkoutRecord;

use crate::error::ApiError;
use crate::state::AppState;

/// Default page size for the samples endpoint.
const DEFAULT_SAMPLE_PAGE: usize = 1_000;

/// How long the end-workout handler lets the ingest lane drain the
/// source's closing sample before sealing the workout.
const END_DRAIN: Duration = Duration::from_millis(50);

/// Request body for starting a workout.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartRequest {
    /// Optional address check — must match the connected device.
    pub address: Option<String>,
}

/// Paging query parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Response carrying a workout id.
#[derive(Debug, Serialize)]
pub struct WorkoutIdResponse {
    pub workout_id: WorkoutId,
}

fn parse_id(id: &str) -> Result<WorkoutId, ApiError> {
    WorkoutId::from_str(id)
        .map_err(|_| ApiError::from(FitBridgeError::from(ValidationError::InvalidId(id.to_string()))))
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<WorkoutRecord>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `POST /api/workouts` — start recording on the connected device.
pub async fn start<L, S, WR, SR, DR, EP, E>(
    State(state): State<AppState<L, S, WR, SR, DR, EP, E>>,
    Json(request): Json<StartRequest>,
) -> Result<Json<WorkoutIdResponse>, ApiError>
where
    L: DeviceSource + Send + Sync + 'static,
    S: DeviceSource + Send + Sync + 'static,
    WR: WorkoutRepository + Send + Sync + 'static,
    SR: SampleRepository + Send + Sync + 'static,
    DR: DeviceCacheRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    E: ActivityEncoder + Send + Sync + 'static,
{
    let device = state
        .facade
        .connected_device()
        .ok_or(ApiError::from(FitBridgeError::from(LifecycleError::NotConnected)))?;

    if let Some(address) = request.address {
        if address != device.address {
            return Err(ApiError::from(FitBridgeError::from(LifecycleError::NotConnected)));
        }
    }

    let workout_id = state.manager.start_workout(&device).await?;

    if let Err(err) = state.facade.begin_workout().await {
        // Unwind the half-started workout so the machine stays consistent.
        let _ = state.manager.abort_active().await;
        return Err(err.into());
    }

    Ok(Json(WorkoutIdResponse { workout_id }))
}

/// `POST /api/workouts/end` — seal the active workout.
pub async fn end<L, S, WR, SR, DR, EP, E>(
    State(state): State<AppState<L, S, WR, SR, DR, EP, E>>,
) -> Result<Json<WorkoutIdResponse>, ApiError>
where
    L: DeviceSource + Send + Sync + 'static,
    S: DeviceSource + Send + Sync + 'static,
    WR: WorkoutRepository + Send + Sync + 'static,
    SR: SampleRepository + Send + Sync + 'static,
    DR: DeviceCacheRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    E: ActivityEncoder + Send + Sync + 'static,
{
    // Stop the source first so its closing totals sample can still reach
    // the ingest lane before the workout seals.
    state.facade.end_workout().await?;
    tokio::time::sleep(END_DRAIN).await;

    let workout_id = state.manager.end_workout().await?;
    Ok(Json(WorkoutIdResponse { workout_id }))
}

/// `GET /api/workouts?limit=&offset=`
pub async fn list<L, S, WR, SR, DR, EP, E>(
    State(state): State<AppState<L, S, WR, SR, DR, EP, E>>,
    Query(page): Query<PageQuery>,
) -> Result<ListResponse, ApiError>
where
    L: DeviceSource + Send + Sync + 'static,
    S: DeviceSource + Send + Sync + 'static,
    WR: WorkoutRepository + Send + Sync + 'static,
    SR: SampleRepository + Send + Sync + 'static,
    DR: DeviceCacheRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    E: ActivityEncoder + Send + Sync + 'static,
{
    let workouts = state.workouts.list_workouts(page.limit, page.offset).await?;
    Ok(ListResponse::Ok(Json(workouts)))
}

/// `GET /api/workouts/{id}`
pub async fn get_one<L, S, WR, SR, DR, EP, E>(
    State(state): State<AppState<L, S, WR, SR, DR, EP, E>>,
    Path(id): Path<String>,
) -> Result<Json<WorkoutRecord>, ApiError>
where
    L: DeviceSource + Send + Sync + 'static,
    S: DeviceSource + Send + Sync + 'static,
    WR: WorkoutRepository + Send + Sync + 'static,
    SR: SampleRepository + Send + Sync + 'static,
    DR: DeviceCacheRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    E: ActivityEncoder + Send + Sync + 'static,
{
    let record = state.workouts.get_workout(parse_id(&id)?).await?;
    Ok(Json(record))
}

/// `GET /api/workouts/{id}/samples?limit=&offset=`
pub async fn samples<L, S, WR, SR, DR, EP, E>(
    State(state): State<AppState<L, S, WR, SR, DR, EP, E>>,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Sample>>, ApiError>
where
    L: DeviceSource + Send + Sync + 'static,
    S: DeviceSource + Send + Sync + 'static,
    WR: WorkoutRepository + Send + Sync + 'static,
    SR: SampleRepository + Send + Sync + 'static,
    DR: DeviceCacheRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    E: ActivityEncoder + Send + Sync + 'static,
{
    let samples = state
        .workouts
        .get_samples_page(
            parse_id(&id)?,
            page.limit.unwrap_or(DEFAULT_SAMPLE_PAGE),
            page.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(samples))
}

/// `GET /api/workouts/{id}/fit` — download the encoded activity file.
pub async fn export_fit<L, S, WR, SR, DR, EP, E>(
    State(state): State<AppState<L, S, WR, SR, DR, EP, E>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError>
where
    L: DeviceSource + Send + Sync + 'static,
    S: DeviceSource + Send + Sync + 'static,
    WR: WorkoutRepository + Send + Sync + 'static,
    SR: SampleRepository + Send + Sync + 'static,
    DR: DeviceCacheRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    E: ActivityEncoder + Send + Sync + 'static,
{
    let export = state.exporter.export_fit(parse_id(&id)?).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename),
            ),
        ],
        export.bytes,
    )
        .into_response())
}
