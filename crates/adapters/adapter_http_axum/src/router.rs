//! Axum router assembly.

use axum::routing::get;
use axum::Router;

use fitbridge_app::ports::source::DeviceSource;
use fitbridge_app::ports::{
    ActivityEncoder, DeviceCacheRepository, EventPublisher, SampleRepository, WorkoutRepository,
};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
pub fn build<L, S, WR, SR, DR, EP, E>(state: AppState<L, S, WR, SR, DR, EP, E>) -> Router
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
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
