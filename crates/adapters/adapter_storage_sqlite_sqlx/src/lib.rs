//! # fitbridge-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence for the workout store and device cache.
//!
//! ## Tables
//!
//! | Table | Contents |
//! |-------|----------|
//! | `workouts` | One row per recording session, summary JSON on finalize |
//! | `samples` | Append-only telemetry rows, pk `(workout_id, t)` |
//! | `devices` | Discovery cache by address |
//!
//! Single-writer discipline is enforced upstream (the workout manager);
//! this crate only guarantees statement-level atomicity and the
//! `INSERT OR IGNORE` duplicate-drop contract.
//!
//! ## Dependency rule
//!
//! Depends on `fitbridge-app` (port traits) and `fitbridge-domain` only.

mod device_repo;
mod error;
mod pool;
mod sample_repo;
mod workout_repo;

pub use device_repo::SqliteDeviceCacheRepository;
pub use error::StorageError;
pub use pool::{Config, Database};
pub use sample_repo::SqliteSampleRepository;
pub use workout_repo::SqliteWorkoutRepository;
