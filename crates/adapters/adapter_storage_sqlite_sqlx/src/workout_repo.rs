//! `SQLite` implementation of [`WorkoutRepository`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use fitbridge_app::ports::WorkoutRepository;
use fitbridge_domain::device::EquipmentKind;
use fitbridge_domain::error::FitBridgeError;
use fitbridge_domain::id::WorkoutId;
use fitbridge_domain::summary::WorkoutSummary;
use fitbridge_domain::time::Timestamp;
use fitbridge_domain::workout::{Workout, WorkoutRecord, WorkoutState};

use crate::error::StorageError;

/// Wrapper for converting database rows into domain types without
/// polluting domain structs with database concerns.
struct Wrapper(WorkoutRecord);

fn decode_error(err: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let device_address: String = row.try_get("device_address")?;
        let device_name: String = row.try_get("device_name")?;
        let kind: String = row.try_get("kind")?;
        let started_at: String = row.try_get("started_at")?;
        let ended_at: Option<String> = row.try_get("ended_at")?;
        let state: String = row.try_get("state")?;
        let summary: Option<String> = row.try_get("summary")?;

        let id = WorkoutId::from_str(&id).map_err(decode_error)?;
        let kind = EquipmentKind::from_str(&kind).map_err(decode_error)?;
        let state = WorkoutState::from_str(&state).map_err(decode_error)?;
        let started_at = chrono::DateTime::parse_from_rfc3339(&started_at)
            .map_err(decode_error)?
            .to_utc();
        let ended_at = ended_at
            .map(|s| chrono::DateTime::parse_from_rfc3339(&s).map(|t| t.to_utc()))
            .transpose()
            .map_err(decode_error)?;
        let summary: Option<WorkoutSummary> = summary
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(decode_error)?;

        Ok(Self(WorkoutRecord {
            workout: Workout {
                id,
                device_address,
                device_name,
                kind,
                started_at,
                ended_at,
                state,
            },
            summary,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO workouts (id, device_address, device_name, kind, started_at, ended_at, state, summary)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
";
const SELECT_BY_ID: &str = "SELECT * FROM workouts WHERE id = ?";
const SELECT_PAGE: &str = "SELECT * FROM workouts ORDER BY started_at DESC LIMIT ? OFFSET ?";
const SELECT_ACTIVE: &str = "SELECT * FROM workouts WHERE state = 'active'";
// One UPDATE statement — atomic in SQLite, so end time, state, and
// summary can never be observed half-written.
const FINALIZE: &str = "UPDATE workouts SET ended_at = ?, state = ?, summary = ? WHERE id = ?";

/// `SQLite`-backed workout repository.
pub struct SqliteWorkoutRepository {
    pool: SqlitePool,
}

impl SqliteWorkoutRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl WorkoutRepository for SqliteWorkoutRepository {
    async fn create(&self, workout: Workout) -> Result<Workout, FitBridgeError> {
        sqlx::query(INSERT)
            .bind(workout.id.to_string())
            .bind(&workout.device_address)
            .bind(&workout.device_name)
            .bind(workout.kind.as_str())
            .bind(workout.started_at.to_rfc3339())
            .bind(workout.ended_at.map(|t| t.to_rfc3339()))
            .bind(workout.state.as_str())
            .bind(None::<String>)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(workout)
    }

    async fn get_by_id(&self, id: WorkoutId) -> Result<Option<WorkoutRecord>, FitBridgeError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.map(|w| w.0))
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<WorkoutRecord>, FitBridgeError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_PAGE)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn find_active(&self) -> Result<Vec<Workout>, FitBridgeError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ACTIVE)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0.workout).collect())
    }

    async fn finalize(
        &self,
        id: WorkoutId,
        ended_at: Timestamp,
        state: WorkoutState,
        summary: WorkoutSummary,
    ) -> Result<(), FitBridgeError> {
        let summary_json = serde_json::to_string(&summary).map_err(StorageError::from)?;

        sqlx::query(FINALIZE)
            .bind(ended_at.to_rfc3339())
            .bind(state.as_str())
            .bind(summary_json)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }
}
