//! Shared application state for axum handlers.

use std::sync::Arc;

use fitbridge_app::event_bus::InProcessEventBus;
use fitbridge_app::ports::source::DeviceSource;
use fitbridge_app::ports::{
    ActivityEncoder, DeviceCacheRepository, EventPublisher, SampleRepository, WorkoutRepository,
};
use fitbridge_app::services::device_service::DeviceService;
use fitbridge_app::services::export_service::ExportService;
use fitbridge_app::services::source_facade::SourceFacade;
use fitbridge_app::services::workout_manager::WorkoutManager;
use fitbridge_app::services::workout_service::WorkoutService;

/// Application state shared across all axum handlers.
///
/// Generic over the backend and repository types to avoid dynamic
/// dispatch. `Clone` is implemented manually so the concrete types
/// themselves do not need to be `Clone` — only the `Arc` wrappers are
/// cloned.
pub struct AppState<L, S, WR, SR, DR, EP, E> {
    /// Unified device source (discovery, connection, reconnect policy).
    pub facade: Arc<SourceFacade<L, S>>,
    /// Lifecycle state machine and ingest lane.
    pub manager: Arc<WorkoutManager<WR, SR, EP>>,
    /// Read-side workout queries.
    pub workouts: Arc<WorkoutService<WR, SR>>,
    /// Discovery cache upkeep.
    pub devices: Arc<DeviceService<DR>>,
    /// FIT export use-case.
    pub exporter: Arc<ExportService<WR, SR, E>>,
    /// Push channel feeding the SSE stream.
    pub event_bus: Arc<InProcessEventBus>,
}

impl<L, S, WR, SR, DR, EP, E> Clone for AppState<L, S, WR, SR, DR, EP, E> {
    fn clone(&self) -> Self {
        Self {
            facade: Arc::clone(&self.facade),
            manager: Arc::clone(&self.manager),
            workouts: Arc::clone(&self.workouts),
            devices: Arc::clone(&self.devices),
            exporter: Arc::clone(&self.exporter),
            event_bus: Arc::clone(&self.event_bus),
        }
    }
}

impl<L, S, WR, SR, DR, EP, E> AppState<L, S, WR, SR, DR, EP, E>
where
    L: DeviceSource + Send + Sync + 'static,
    S: DeviceSource + Send + Sync + 'static,
    WR: WorkoutRepository + Send + Sync + 'static,
    SR: SampleRepository + Send + Sync + 'static,
    DR: DeviceCacheRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    E: ActivityEncoder + Send + Sync + 'static,
{
    /// Create a new application state from the wired services.
    pub fn new(
        facade: Arc<SourceFacade<L, S>>,
        manager: Arc<WorkoutManager<WR, SR, EP>>,
        workouts: WorkoutService<WR, SR>,
        devices: DeviceService<DR>,
        exporter: ExportService<WR, SR, E>,
        event_bus: Arc<InProcessEventBus>,
    ) -> Self {
        Self {
            facade,
            manager,
            workouts: Arc::new(workouts),
            devices: Arc::new(devices),
            exporter: Arc::new(exporter),
            event_bus,
        }
    }
}
