//! JSON REST handlers for device discovery and connection.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use fitbridge_app::ports::source::DeviceSource;
use fitbridge_app::ports::{
    ActivityEncoder, DeviceCacheRepository, EventPublisher, SampleRepository, WorkoutRepository,
};
use fitbridge_domain::device::{CachedDevice, DeviceDescriptor};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for a discovery scan.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DiscoverRequest {
    /// Scan duration in seconds; the source's configured cap applies.
    pub duration_secs: Option<u64>,
}

/// Request body for connecting to a device.
#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub address: String,
}

/// Possible responses from the discover endpoint.
pub enum DiscoverResponse {
    Ok(Json<Vec<DeviceDescriptor>>),
}

impl IntoResponse for DiscoverResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the known-devices endpoint.
pub enum KnownResponse {
    Ok(Json<Vec<CachedDevice>>),
}

impl IntoResponse for KnownResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from connect/disconnect.
pub enum AckResponse {
    NoContent,
}

impl IntoResponse for AckResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `POST /api/devices/discover`
pub async fn discover<L, S, WR, SR, DR, EP, E>(
    State(state): State<AppState<L, S, WR, SR, DR, EP, E>>,
    Json(request): Json<DiscoverRequest>,
) -> Result<DiscoverResponse, ApiError>
where
    L: DeviceSource + Send + Sync + 'static,
    S: DeviceSource + Send + Sync + 'static,
    WR: WorkoutRepository + Send + Sync + 'static,
    SR: SampleRepository + Send + Sync + 'static,
    DR: DeviceCacheRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    E: ActivityEncoder + Send + Sync + 'static,
{
    let duration = request.duration_secs.map(Duration::from_secs);

    let found = state.facade.discover(duration).await?;
    let enriched = state.devices.record_discovery(found).await?;
    Ok(DiscoverResponse::Ok(Json(enriched)))
}

/// `GET /api/devices`
pub async fn known<L, S, WR, SR, DR, EP, E>(
    State(state): State<AppState<L, S, WR, SR, DR, EP, E>>,
) -> Result<KnownResponse, ApiError>
where
    L: DeviceSource + Send + Sync + 'static,
    S: DeviceSource + Send + Sync + 'static,
    WR: WorkoutRepository + Send + Sync + 'static,
    SR: SampleRepository + Send + Sync + 'static,
    DR: DeviceCacheRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    E: ActivityEncoder + Send + Sync + 'static,
{
    let devices = state.devices.known_devices().await?;
    Ok(KnownResponse::Ok(Json(devices)))
}

/// `POST /api/devices/connect`
pub async fn connect<L, S, WR, SR, DR, EP, E>(
    State(state): State<AppState<L, S, WR, SR, DR, EP, E>>,
    Json(request): Json<ConnectRequest>,
) -> Result<AckResponse, ApiError>
where
    L: DeviceSource + Send + Sync + 'static,
    S: DeviceSource + Send + Sync + 'static,
    WR: WorkoutRepository + Send + Sync + 'static,
    SR: SampleRepository + Send + Sync + 'static,
    DR: DeviceCacheRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    E: ActivityEncoder + Send + Sync + 'static,
{
    state.facade.connect(&request.address).await?;
    Ok(AckResponse::NoContent)
}

/// `POST /api/devices/disconnect`
pub async fn disconnect<L, S, WR, SR, DR, EP, E>(
    State(state): State<AppState<L, S, WR, SR, DR, EP, E>>,
) -> Result<AckResponse, ApiError>
where
    L: DeviceSource + Send + Sync + 'static,
    S: DeviceSource + Send + Sync + 'static,
    WR: WorkoutRepository + Send + Sync + 'static,
    SR: SampleRepository + Send + Sync + 'static,
    DR: DeviceCacheRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    E: ActivityEncoder + Send + Sync + 'static,
{
    state.facade.disconnect().await?;
    Ok(AckResponse::NoContent)
}
