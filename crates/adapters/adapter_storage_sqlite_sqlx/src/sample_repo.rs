//! `SQLite` implementation of [`SampleRepository`].
//!
//! Append-only table keyed `(workout_id, t)`. Inserts use
//! `INSERT OR IGNORE`, so a key that already exists (clock regression
//! past the monotonic stamp) is dropped silently and reported as
//! [`AppendOutcome::DuplicateDropped`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use fitbridge_app::ports::storage::AppendOutcome;
use fitbridge_app::ports::SampleRepository;
use fitbridge_domain::error::FitBridgeError;
use fitbridge_domain::id::WorkoutId;
use fitbridge_domain::sample::Sample;

use crate::error::StorageError;

/// Wrapper for converting payload rows into domain [`Sample`]s.
struct Wrapper(Sample);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let payload: String = row.try_get("payload")?;
        let sample: Sample =
            serde_json::from_str(&payload).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        Ok(Self(sample))
    }
}

const INSERT: &str = "INSERT OR IGNORE INTO samples (workout_id, t, payload) VALUES (?, ?, ?)";
const SELECT_BY_WORKOUT: &str = "SELECT payload FROM samples WHERE workout_id = ? ORDER BY t ASC";
const SELECT_PAGE: &str =
    "SELECT payload FROM samples WHERE workout_id = ? ORDER BY t ASC LIMIT ? OFFSET ?";
const COUNT: &str = "SELECT COUNT(*) AS n FROM samples WHERE workout_id = ?";

/// `SQLite`-backed sample repository.
pub struct SqliteSampleRepository {
    pool: SqlitePool,
}

impl SqliteSampleRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SampleRepository for SqliteSampleRepository {
    async fn append(
        &self,
        workout_id: WorkoutId,
        sample: Sample,
    ) -> Result<AppendOutcome, FitBridgeError> {
        let payload = serde_json::to_string(&sample).map_err(StorageError::from)?;

        let result = sqlx::query(INSERT)
            .bind(workout_id.to_string())
            .bind(sample.t)
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            Ok(AppendOutcome::DuplicateDropped)
        } else {
            Ok(AppendOutcome::Inserted)
        }
    }

    async fn find_by_workout(&self, workout_id: WorkoutId) -> Result<Vec<Sample>, FitBridgeError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_WORKOUT)
            .bind(workout_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn find_by_workout_page(
        &self,
        workout_id: WorkoutId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Sample>, FitBridgeError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_PAGE)
            .bind(workout_id.to_string())
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn count_by_workout(&self, workout_id: WorkoutId) -> Result<u64, FitBridgeError> {
        let row = sqlx::query(COUNT)
            .bind(workout_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let count: i64 = row.try_get("n").map_err(StorageError::from)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
