//! # fitbridged — fitbridge daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file, env vars)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Sweep workouts interrupted by the previous run
//! - Construct the device sources, facade, and workout manager
//! - Run the ingest task bridging facade events into the manager
//! - Build the axum router and serve
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use fitbridge_adapter_ble::{BleConfig, FtmsSource};
use fitbridge_adapter_fit::FitActivityEncoder;
use fitbridge_adapter_http_axum::state::AppState;
use fitbridge_adapter_simulator::{SimulatedSource, SimulatorConfig};
use fitbridge_adapter_storage_sqlite_sqlx::{
    Config as DbConfig, SqliteDeviceCacheRepository, SqliteSampleRepository,
    SqliteWorkoutRepository,
};
use fitbridge_app::event_bus::InProcessEventBus;
use fitbridge_app::ports::source::SourceEvent;
use fitbridge_app::ports::EventPublisher;
use fitbridge_app::services::device_service::DeviceService;
use fitbridge_app::services::export_service::ExportService;
use fitbridge_app::services::source_facade::SourceFacade;
use fitbridge_app::services::workout_manager::WorkoutManager;
use fitbridge_app::services::workout_service::WorkoutService;
use fitbridge_domain::event::{BridgeEvent, EventType};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration
    let config = Config::load()?;

    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    tracing::info!("configuration loaded");

    // Database
    std::fs::create_dir_all(&config.storage.data_dir)?;
    let db = DbConfig {
        database_url: config.database_url(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();
    tracing::info!("database ready");

    // Repositories (one instance per consuming service)
    let device_repo = SqliteDeviceCacheRepository::new(pool.clone());

    // Event bus
    let event_bus = Arc::new(InProcessEventBus::new(256));

    // Restart sweep before anything can write
    let workout_service = WorkoutService::new(
        SqliteWorkoutRepository::new(pool.clone()),
        SqliteSampleRepository::new(pool.clone()),
        config.profile.clone(),
    );
    let swept = workout_service.recover_interrupted().await?;
    if swept > 0 {
        tracing::warn!(count = swept, "swept interrupted workouts to aborted");
    }

    // Workout manager
    let manager = Arc::new(WorkoutManager::new(
        SqliteWorkoutRepository::new(pool.clone()),
        SqliteSampleRepository::new(pool.clone()),
        Arc::clone(&event_bus),
        config.profile.clone(),
    ));

    // Device sources behind the facade
    let live = config.ble.enabled.then(|| {
        FtmsSource::new(BleConfig {
            scan_duration_secs: config.ble.scan_duration_secs,
            connect_timeout_secs: config.ble.connect_timeout_secs,
        })
    });
    let simulated = config.simulator.enabled.then(|| {
        SimulatedSource::new(SimulatorConfig {
            bike: config.simulator.bike,
            rower: config.simulator.rower,
            tick_ms: config.simulator.tick_ms,
            seed: config.simulator.seed,
        })
    });
    if config.simulator.enabled {
        tracing::info!("simulator source enabled");
    }
    let facade = SourceFacade::start(
        live,
        simulated,
        Duration::from_secs(u64::from(config.ble.scan_duration_secs)),
    );

    // Ingest lane: facade events → manager (+ connection events to the bus)
    spawn_ingest_task(Arc::clone(&facade), Arc::clone(&manager), Arc::clone(&event_bus));

    // Export
    let exporter = ExportService::new(
        SqliteWorkoutRepository::new(pool.clone()),
        SqliteSampleRepository::new(pool),
        FitActivityEncoder::new(),
        config.profile.clone(),
        Some(config.fit_dir()),
    );

    // HTTP
    let state = AppState::new(
        facade,
        manager,
        workout_service,
        DeviceService::new(device_repo),
        exporter,
        event_bus,
    );
    let app = fitbridge_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    tracing::info!(addr = %bind_addr, "fitbridged listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Forward facade events into the workout manager, publishing connection
/// changes on the push channel along the way.
fn spawn_ingest_task<L, S, WR, SR, EP>(
    facade: Arc<SourceFacade<L, S>>,
    manager: Arc<WorkoutManager<WR, SR, EP>>,
    event_bus: Arc<InProcessEventBus>,
) where
    L: fitbridge_app::ports::source::DeviceSource + Send + Sync + 'static,
    S: fitbridge_app::ports::source::DeviceSource + Send + Sync + 'static,
    WR: fitbridge_app::ports::WorkoutRepository + Send + Sync + 'static,
    SR: fitbridge_app::ports::SampleRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
{
    let mut rx = facade.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let SourceEvent::State(state) = &event {
                        let _ = event_bus
                            .publish(BridgeEvent::new(
                                EventType::ConnectionChanged,
                                None,
                                serde_json::to_value(state).unwrap_or_default(),
                            ))
                            .await;
                    }
                    if let Err(err) = manager.handle_event(event).await {
                        tracing::error!(%err, "ingest failed");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "ingest lane lagged, oldest samples dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("ingest task stopped");
    });
}

/// Wait for a shutdown signal (Ctrl-C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
