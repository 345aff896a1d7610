//! `SQLite` implementation of [`DeviceCacheRepository`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use fitbridge_app::ports::DeviceCacheRepository;
use fitbridge_domain::device::{CachedDevice, DeviceDescriptor, EquipmentKind};
use fitbridge_domain::error::FitBridgeError;
use fitbridge_domain::time::Timestamp;

use crate::error::StorageError;

/// Wrapper for converting database rows into [`CachedDevice`].
struct Wrapper(CachedDevice);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let address: String = row.try_get("address")?;
        let name: String = row.try_get("name")?;
        let kind: String = row.try_get("kind")?;
        let last_seen: String = row.try_get("last_seen")?;

        let kind =
            EquipmentKind::from_str(&kind).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let last_seen = chrono::DateTime::parse_from_rfc3339(&last_seen)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();

        Ok(Self(CachedDevice {
            address,
            name,
            kind,
            last_seen,
        }))
    }
}

const UPSERT: &str = r"
    INSERT INTO devices (address, name, kind, last_seen)
    VALUES (?, ?, ?, ?)
    ON CONFLICT (address) DO UPDATE
    SET name = excluded.name, kind = excluded.kind, last_seen = excluded.last_seen
";
const SELECT_ALL: &str = "SELECT * FROM devices ORDER BY last_seen DESC";
const SELECT_BY_ADDRESS: &str = "SELECT * FROM devices WHERE address = ?";

/// `SQLite`-backed device cache.
pub struct SqliteDeviceCacheRepository {
    pool: SqlitePool,
}

impl SqliteDeviceCacheRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl DeviceCacheRepository for SqliteDeviceCacheRepository {
    async fn upsert(
        &self,
        descriptor: DeviceDescriptor,
        last_seen: Timestamp,
    ) -> Result<(), FitBridgeError> {
        sqlx::query(UPSERT)
            .bind(&descriptor.address)
            .bind(&descriptor.name)
            .bind(descriptor.kind.as_str())
            .bind(last_seen.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<CachedDevice>, FitBridgeError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn get_by_address(&self, address: &str) -> Result<Option<CachedDevice>, FitBridgeError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ADDRESS)
            .bind(address)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.map(|w| w.0))
    }
}
