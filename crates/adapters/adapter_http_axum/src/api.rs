//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod devices;
#[allow(clippy::missing_errors_doc)]
pub mod status;
#[allow(clippy::missing_errors_doc)]
pub mod stream;
#[allow(clippy::missing_errors_doc)]
pub mod workouts;

use axum::routing::{get, post};
use axum::Router;

use fitbridge_app::ports::source::DeviceSource;
use fitbridge_app::ports::{
    ActivityEncoder, DeviceCacheRepository, EventPublisher, SampleRepository, WorkoutRepository,
};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<L, S, WR, SR, DR, EP, E>() -> Router<AppState<L, S, WR, SR, DR, EP, E>>
where
    L: DeviceSource + Send + Sync + 'static,
    S: DeviceSource + Send + Sync + 'static,
    WR: WorkoutRepository + Send + Sync + 'static,
    SR: SampleRepository + Send + Sync + 'static,
    DR: DeviceCacheRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    E: ActivityEncoder + Send + Sync + 'static,
{
    Router::new()
        // Devices
        .route(
            "/devices",
            get(devices::known::<L, S, WR, SR, DR, EP, E>),
        )
        .route(
            "/devices/discover",
            post(devices::discover::<L, S, WR, SR, DR, EP, E>),
        )
        .route(
            "/devices/connect",
            post(devices::connect::<L, S, WR, SR, DR, EP, E>),
        )
        .route(
            "/devices/disconnect",
            post(devices::disconnect::<L, S, WR, SR, DR, EP, E>),
        )
        // Status
        .route("/status", get(status::get_status::<L, S, WR, SR, DR, EP, E>))
        // Workouts
        .route(
            "/workouts",
            get(workouts::list::<L, S, WR, SR, DR, EP, E>)
                .post(workouts::start::<L, S, WR, SR, DR, EP, E>),
        )
        .route(
            "/workouts/end",
            post(workouts::end::<L, S, WR, SR, DR, EP, E>),
        )
        .route(
            "/workouts/{id}",
            get(workouts::get_one::<L, S, WR, SR, DR, EP, E>),
        )
        .route(
            "/workouts/{id}/samples",
            get(workouts::samples::<L, S, WR, SR, DR, EP, E>),
        )
        .route(
            "/workouts/{id}/fit",
            get(workouts::export_fit::<L, S, WR, SR, DR, EP, E>),
        )
        // Push channel
        .route(
            "/events/stream",
            get(stream::stream::<L, S, WR, SR, DR, EP, E>),
        )
}
