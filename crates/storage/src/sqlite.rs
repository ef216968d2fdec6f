//! `SQLite` repository

use crate::schema::bootstrap_schema;
use crate::{
    Admin, DatabaseStats, Driver, DriverDirectory, DriverId, Journey, JourneyId, JourneyStatus,
    JourneyStore, NewDriver, StorageConfig, StorageError,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info};

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound,
            other => StorageError::DatabaseError(other.to_string()),
        }
    }
}

/// Repository backed by a `SQLite` pool
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct DriverRow {
    id: i64,
    name: String,
    age: i64,
    gender: String,
    license_no: String,
    place: String,
    phone: String,
    username: String,
    password_hash: String,
}

impl DriverRow {
    fn into_driver(self) -> Result<Driver, StorageError> {
        let age = u32::try_from(self.age)
            .map_err(|_| StorageError::DatabaseError(format!("invalid age: {}", self.age)))?;
        Ok(Driver {
            id: self.id,
            name: self.name,
            age,
            gender: self.gender,
            license_no: self.license_no,
            place: self.place,
            phone: self.phone,
            username: self.username,
            password_hash: self.password_hash,
        })
    }
}

#[derive(sqlx::FromRow)]
struct JourneyRow {
    id: i64,
    driver_id: i64,
    start_time: String,
    end_time: Option<String>,
    drowsiness_count: i64,
    journey_status: String,
}

impl JourneyRow {
    fn into_journey(self) -> Result<Journey, StorageError> {
        let drowsiness_count = u32::try_from(self.drowsiness_count).map_err(|_| {
            StorageError::DatabaseError(format!(
                "invalid drowsiness_count: {}",
                self.drowsiness_count
            ))
        })?;
        Ok(Journey {
            id: self.id,
            driver_id: self.driver_id,
            start_time: decode_time(&self.start_time)?,
            end_time: self.end_time.as_deref().map(decode_time).transpose()?,
            drowsiness_count,
            status: self.journey_status.parse()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AdminRow {
    id: i64,
    username: String,
    password_hash: String,
}

fn encode_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::DatabaseError(format!("invalid timestamp '{}': {}", raw, e)))
}

fn into_journeys(rows: Vec<JourneyRow>) -> Result<Vec<Journey>, StorageError> {
    rows.into_iter().map(JourneyRow::into_journey).collect()
}

fn as_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

const JOURNEY_COLUMNS: &str =
    "id, driver_id, start_time, end_time, drowsiness_count, journey_status";

impl SqliteRepository {
    /// Connect and bootstrap the schema
    pub async fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        info!("Opening database at {}", config.url);
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        bootstrap_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Private in-memory database (single connection)
    pub async fn in_memory() -> Result<Self, StorageError> {
        Self::connect(&StorageConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl JourneyStore for SqliteRepository {
    async fn insert_journey(
        &self,
        driver_id: DriverId,
        start_time: DateTime<Utc>,
    ) -> Result<JourneyId, StorageError> {
        let result = sqlx::query(
            "INSERT INTO journeys (driver_id, start_time, drowsiness_count, journey_status)
             VALUES (?1, ?2, 0, ?3)",
        )
        .bind(driver_id)
        .bind(encode_time(start_time))
        .bind(JourneyStatus::Active.as_str())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Inserted journey with ID {}", id);
        Ok(id)
    }

    async fn update_drowsiness_count(
        &self,
        journey_id: JourneyId,
        count: u32,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE journeys SET drowsiness_count = ?1 WHERE id = ?2 AND journey_status = ?3",
        )
        .bind(i64::from(count))
        .bind(journey_id)
        .bind(JourneyStatus::Active.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn finalize_journey(
        &self,
        journey_id: JourneyId,
        end_time: DateTime<Utc>,
        status: JourneyStatus,
    ) -> Result<(), StorageError> {
        let result =
            sqlx::query("UPDATE journeys SET end_time = ?1, journey_status = ?2 WHERE id = ?3")
                .bind(encode_time(end_time))
                .bind(status.as_str())
                .bind(journey_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_active_journey(
        &self,
        driver_id: DriverId,
    ) -> Result<Option<JourneyId>, StorageError> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM journeys WHERE driver_id = ?1 AND journey_status = ?2 LIMIT 1",
        )
        .bind(driver_id)
        .bind(JourneyStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn list_journeys(&self, driver_id: DriverId) -> Result<Vec<Journey>, StorageError> {
        let rows: Vec<JourneyRow> = sqlx::query_as(&format!(
            "SELECT {} FROM journeys WHERE driver_id = ?1 ORDER BY start_time DESC, id DESC",
            JOURNEY_COLUMNS
        ))
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await?;
        into_journeys(rows)
    }

    async fn list_active_journeys(&self) -> Result<Vec<Journey>, StorageError> {
        let rows: Vec<JourneyRow> = sqlx::query_as(&format!(
            "SELECT {} FROM journeys WHERE journey_status = ?1 ORDER BY id",
            JOURNEY_COLUMNS
        ))
        .bind(JourneyStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await?;
        into_journeys(rows)
    }
}

#[async_trait]
impl DriverDirectory for SqliteRepository {
    async fn insert_driver(&self, driver: &NewDriver) -> Result<Driver, StorageError> {
        let mut tx = self.pool.begin().await?;

        let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM drivers WHERE username = ?1")
            .bind(&driver.username)
            .fetch_optional(&mut *tx)
            .await?;
        if taken.is_some() {
            return Err(StorageError::Conflict(format!(
                "username '{}' already exists",
                driver.username
            )));
        }

        let result = sqlx::query(
            "INSERT INTO drivers (name, age, gender, license_no, place, phone, username, password_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&driver.name)
        .bind(i64::from(driver.age))
        .bind(&driver.gender)
        .bind(&driver.license_no)
        .bind(&driver.place)
        .bind(&driver.phone)
        .bind(&driver.username)
        .bind(&driver.password_hash)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let id = result.last_insert_rowid();
        debug!("Inserted driver with ID {}", id);
        Ok(driver.clone().into_driver(id))
    }

    async fn find_driver_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Driver>, StorageError> {
        let row: Option<DriverRow> = sqlx::query_as("SELECT * FROM drivers WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.map(DriverRow::into_driver).transpose()
    }

    async fn get_driver(&self, id: DriverId) -> Result<Option<Driver>, StorageError> {
        let row: Option<DriverRow> = sqlx::query_as("SELECT * FROM drivers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(DriverRow::into_driver).transpose()
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, StorageError> {
        let rows: Vec<DriverRow> = sqlx::query_as("SELECT * FROM drivers ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(DriverRow::into_driver).collect()
    }

    async fn delete_driver(&self, id: DriverId) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM journeys WHERE driver_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM drivers WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_journey(&self, id: JourneyId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM journeys WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_all_journeys(&self) -> Result<Vec<Journey>, StorageError> {
        let rows: Vec<JourneyRow> = sqlx::query_as(&format!(
            "SELECT {} FROM journeys ORDER BY start_time DESC, id DESC",
            JOURNEY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        into_journeys(rows)
    }

    async fn insert_admin_if_missing(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<bool, StorageError> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO admins (username, password_hash) VALUES (?1, ?2)")
                .bind(username)
                .bind(password_hash)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>, StorageError> {
        let row: Option<AdminRow> = sqlx::query_as("SELECT * FROM admins WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Admin {
            id: r.id,
            username: r.username,
            password_hash: r.password_hash,
        }))
    }

    async fn statistics(&self) -> Result<DatabaseStats, StorageError> {
        let (total_drivers, total_journeys, total_drowsiness_events, active_journeys): (
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM drivers),
                (SELECT COUNT(*) FROM journeys),
                (SELECT COALESCE(SUM(drowsiness_count), 0) FROM journeys),
                (SELECT COUNT(*) FROM journeys WHERE journey_status = 'Active')",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DatabaseStats {
            total_drivers: as_count(total_drivers),
            total_journeys: as_count(total_journeys),
            total_drowsiness_events: as_count(total_drowsiness_events),
            active_journeys: as_count(active_journeys),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_driver(username: &str) -> NewDriver {
        NewDriver {
            name: "Meera Nair".to_string(),
            age: 41,
            gender: "Female".to_string(),
            license_no: "KL-1120090001234".to_string(),
            place: "Thrissur".to_string(),
            phone: "9447001122".to_string(),
            username: username.to_string(),
            password_hash: "digest".to_string(),
        }
    }

    #[tokio::test]
    async fn test_schema_bootstrap_is_idempotent() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        bootstrap_schema(&repo.pool).await.unwrap();
        assert_eq!(repo.statistics().await.unwrap(), DatabaseStats::default());
    }

    #[tokio::test]
    async fn test_journey_round_trip() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let driver = repo.insert_driver(&new_driver("meera")).await.unwrap();
        let start = Utc::now();

        let id = repo.insert_journey(driver.id, start).await.unwrap();
        assert_eq!(repo.get_active_journey(driver.id).await.unwrap(), Some(id));
        repo.update_drowsiness_count(id, 6).await.unwrap();
        repo.finalize_journey(id, start + Duration::seconds(30), JourneyStatus::Completed)
            .await
            .unwrap();

        let journeys = repo.list_journeys(driver.id).await.unwrap();
        assert_eq!(journeys.len(), 1);
        let journey = &journeys[0];
        assert_eq!(journey.drowsiness_count, 6);
        assert_eq!(journey.status, JourneyStatus::Completed);
        assert_eq!(
            journey.start_time.timestamp_micros(),
            start.timestamp_micros()
        );
        assert!(journey.end_time.unwrap() >= journey.start_time);
        assert_eq!(repo.get_active_journey(driver.id).await.unwrap(), None);
        assert_eq!(
            repo.update_drowsiness_count(id, 7).await,
            Err(StorageError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_journey_requires_driver() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let err = repo.insert_journey(99, Utc::now()).await.unwrap_err();
        assert!(matches!(err, StorageError::DatabaseError(_)));
    }

    #[tokio::test]
    async fn test_list_journeys_newest_first() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let driver = repo.insert_driver(&new_driver("meera")).await.unwrap();
        let base = Utc::now();

        let older = repo.insert_journey(driver.id, base).await.unwrap();
        let newer = repo
            .insert_journey(driver.id, base + Duration::hours(2))
            .await
            .unwrap();

        let ids: Vec<_> = repo
            .list_all_journeys()
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(ids, vec![newer, older]);
        assert_eq!(repo.list_active_journeys().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        repo.insert_driver(&new_driver("meera")).await.unwrap();

        let err = repo.insert_driver(&new_driver("meera")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert_eq!(repo.list_drivers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_driver_removes_journeys() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let driver = repo.insert_driver(&new_driver("meera")).await.unwrap();
        let journey = repo.insert_journey(driver.id, Utc::now()).await.unwrap();

        assert!(repo.delete_driver(driver.id).await.unwrap());
        assert!(repo.get_driver(driver.id).await.unwrap().is_none());
        assert!(!repo.delete_journey(journey).await.unwrap());
        assert_eq!(repo.statistics().await.unwrap().total_journeys, 0);
    }

    #[tokio::test]
    async fn test_statistics_and_admin() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let driver = repo.insert_driver(&new_driver("meera")).await.unwrap();
        let first = repo.insert_journey(driver.id, Utc::now()).await.unwrap();
        repo.update_drowsiness_count(first, 4).await.unwrap();
        repo.insert_journey(driver.id, Utc::now()).await.unwrap();

        let stats = repo.statistics().await.unwrap();
        assert_eq!(stats.total_drivers, 1);
        assert_eq!(stats.total_journeys, 2);
        assert_eq!(stats.total_drowsiness_events, 4);
        assert_eq!(stats.active_journeys, 2);

        assert!(repo.insert_admin_if_missing("admin", "d").await.unwrap());
        assert!(!repo.insert_admin_if_missing("admin", "e").await.unwrap());
        let admin = repo.find_admin_by_username("admin").await.unwrap().unwrap();
        assert_eq!(admin.password_hash, "d");
    }
}
