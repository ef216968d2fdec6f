//! Storage Layer
//!
//! Two narrow ports over the driver/journey/admin tables:
//! - [`JourneyStore`]: the writes and reads the monitoring session needs
//! - [`DriverDirectory`]: registration, login lookups and administration
//!
//! Both are implemented by the in-memory [`Repository`] and by
//! [`SqliteRepository`].

mod models;
mod repository;
mod schema;
mod sqlite;

pub use models::{
    Admin, DatabaseStats, Driver, DriverId, Journey, JourneyId, JourneyStatus, NewDriver,
};
pub use repository::Repository;
pub use sqlite::SqliteRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Record not found")]
    NotFound,
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// sqlx connection URL, e.g. `sqlite://drowsy-guard.db`
    pub url: String,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://drowsy-guard.db".to_string(),
            max_connections: 4,
        }
    }
}

/// Journey persistence used by the monitoring session
#[async_trait]
pub trait JourneyStore: Send + Sync {
    /// Insert an `Active` journey with a zero count and no end time
    async fn insert_journey(
        &self,
        driver_id: DriverId,
        start_time: DateTime<Utc>,
    ) -> Result<JourneyId, StorageError>;

    /// Overwrite the drowsiness count of an `Active` journey.
    ///
    /// Returns `NotFound` if no active journey has this id.
    async fn update_drowsiness_count(
        &self,
        journey_id: JourneyId,
        count: u32,
    ) -> Result<(), StorageError>;

    async fn finalize_journey(
        &self,
        journey_id: JourneyId,
        end_time: DateTime<Utc>,
        status: JourneyStatus,
    ) -> Result<(), StorageError>;

    async fn get_active_journey(&self, driver_id: DriverId)
        -> Result<Option<JourneyId>, StorageError>;

    /// Journeys of one driver, newest first
    async fn list_journeys(&self, driver_id: DriverId) -> Result<Vec<Journey>, StorageError>;

    /// Every journey still marked `Active`, across drivers
    async fn list_active_journeys(&self) -> Result<Vec<Journey>, StorageError>;
}

/// Driver and admin records
#[async_trait]
pub trait DriverDirectory: Send + Sync {
    /// Fails with `Conflict` if the username is taken
    async fn insert_driver(&self, driver: &NewDriver) -> Result<Driver, StorageError>;

    async fn find_driver_by_username(&self, username: &str)
        -> Result<Option<Driver>, StorageError>;

    async fn get_driver(&self, id: DriverId) -> Result<Option<Driver>, StorageError>;

    async fn list_drivers(&self) -> Result<Vec<Driver>, StorageError>;

    /// Delete a driver and all of their journeys. Returns false if absent.
    async fn delete_driver(&self, id: DriverId) -> Result<bool, StorageError>;

    /// Returns false if absent
    async fn delete_journey(&self, id: JourneyId) -> Result<bool, StorageError>;

    /// All journeys, newest first
    async fn list_all_journeys(&self) -> Result<Vec<Journey>, StorageError>;

    /// Returns true if the admin was created
    async fn insert_admin_if_missing(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<bool, StorageError>;

    async fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>, StorageError>;

    async fn statistics(&self) -> Result<DatabaseStats, StorageError>;
}
