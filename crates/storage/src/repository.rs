//! In-memory Repository Implementation

use crate::{
    Admin, DatabaseStats, Driver, DriverDirectory, DriverId, Journey, JourneyId, JourneyStatus,
    JourneyStore, NewDriver, StorageError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Repository for data access, kept entirely in memory
pub struct Repository {
    /// Driver records
    drivers: Mutex<Vec<Driver>>,
    /// Journey records
    journeys: Mutex<Vec<Journey>>,
    /// Admin records
    admins: Mutex<Vec<Admin>>,
    next_driver_id: AtomicI64,
    next_journey_id: AtomicI64,
    next_admin_id: AtomicI64,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
}

/// Newest first; ids break ties between identical start times
fn newest_first(journeys: &mut [Journey]) {
    journeys.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
}

impl Repository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        info!("Creating in-memory repository");
        Self {
            drivers: Mutex::new(Vec::new()),
            journeys: Mutex::new(Vec::with_capacity(64)),
            admins: Mutex::new(Vec::new()),
            next_driver_id: AtomicI64::new(1),
            next_journey_id: AtomicI64::new(1),
            next_admin_id: AtomicI64::new(1),
        }
    }

    /// Look up a journey by id
    pub fn journey(&self, id: JourneyId) -> Result<Option<Journey>, StorageError> {
        let journeys = lock(&self.journeys)?;
        Ok(journeys.iter().find(|j| j.id == id).cloned())
    }

    /// Get total journey count
    pub fn journey_count(&self) -> usize {
        self.journeys.lock().map(|j| j.len()).unwrap_or(0)
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JourneyStore for Repository {
    async fn insert_journey(
        &self,
        driver_id: DriverId,
        start_time: DateTime<Utc>,
    ) -> Result<JourneyId, StorageError> {
        if !lock(&self.drivers)?.iter().any(|d| d.id == driver_id) {
            return Err(StorageError::NotFound);
        }

        let id = self.next_journey_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.journeys)?.push(Journey {
            id,
            driver_id,
            start_time,
            end_time: None,
            drowsiness_count: 0,
            status: JourneyStatus::Active,
        });

        debug!("Inserted journey with ID {}", id);
        Ok(id)
    }

    async fn update_drowsiness_count(
        &self,
        journey_id: JourneyId,
        count: u32,
    ) -> Result<(), StorageError> {
        let mut journeys = lock(&self.journeys)?;
        let journey = journeys
            .iter_mut()
            .find(|j| j.id == journey_id && j.is_active())
            .ok_or(StorageError::NotFound)?;

        journey.drowsiness_count = count;
        Ok(())
    }

    async fn finalize_journey(
        &self,
        journey_id: JourneyId,
        end_time: DateTime<Utc>,
        status: JourneyStatus,
    ) -> Result<(), StorageError> {
        let mut journeys = lock(&self.journeys)?;
        let journey = journeys
            .iter_mut()
            .find(|j| j.id == journey_id)
            .ok_or(StorageError::NotFound)?;

        journey.end_time = Some(end_time);
        journey.status = status;
        Ok(())
    }

    async fn get_active_journey(
        &self,
        driver_id: DriverId,
    ) -> Result<Option<JourneyId>, StorageError> {
        let journeys = lock(&self.journeys)?;
        Ok(journeys
            .iter()
            .find(|j| j.driver_id == driver_id && j.is_active())
            .map(|j| j.id))
    }

    async fn list_journeys(&self, driver_id: DriverId) -> Result<Vec<Journey>, StorageError> {
        let journeys = lock(&self.journeys)?;
        let mut found: Vec<_> = journeys
            .iter()
            .filter(|j| j.driver_id == driver_id)
            .cloned()
            .collect();
        newest_first(&mut found);
        Ok(found)
    }

    async fn list_active_journeys(&self) -> Result<Vec<Journey>, StorageError> {
        let journeys = lock(&self.journeys)?;
        Ok(journeys.iter().filter(|j| j.is_active()).cloned().collect())
    }
}

#[async_trait]
impl DriverDirectory for Repository {
    async fn insert_driver(&self, driver: &NewDriver) -> Result<Driver, StorageError> {
        let mut drivers = lock(&self.drivers)?;
        if drivers.iter().any(|d| d.username == driver.username) {
            return Err(StorageError::Conflict(format!(
                "username '{}' already exists",
                driver.username
            )));
        }

        let id = self.next_driver_id.fetch_add(1, Ordering::SeqCst);
        let created = driver.clone().into_driver(id);
        drivers.push(created.clone());
        debug!("Inserted driver with ID {}", id);
        Ok(created)
    }

    async fn find_driver_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Driver>, StorageError> {
        let drivers = lock(&self.drivers)?;
        Ok(drivers.iter().find(|d| d.username == username).cloned())
    }

    async fn get_driver(&self, id: DriverId) -> Result<Option<Driver>, StorageError> {
        let drivers = lock(&self.drivers)?;
        Ok(drivers.iter().find(|d| d.id == id).cloned())
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, StorageError> {
        Ok(lock(&self.drivers)?.clone())
    }

    async fn delete_driver(&self, id: DriverId) -> Result<bool, StorageError> {
        let mut drivers = lock(&self.drivers)?;
        let mut journeys = lock(&self.journeys)?;

        let before = drivers.len();
        drivers.retain(|d| d.id != id);
        if drivers.len() == before {
            return Ok(false);
        }
        journeys.retain(|j| j.driver_id != id);
        Ok(true)
    }

    async fn delete_journey(&self, id: JourneyId) -> Result<bool, StorageError> {
        let mut journeys = lock(&self.journeys)?;
        let before = journeys.len();
        journeys.retain(|j| j.id != id);
        Ok(journeys.len() != before)
    }

    async fn list_all_journeys(&self) -> Result<Vec<Journey>, StorageError> {
        let mut all = lock(&self.journeys)?.clone();
        newest_first(&mut all);
        Ok(all)
    }

    async fn insert_admin_if_missing(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<bool, StorageError> {
        let mut admins = lock(&self.admins)?;
        if admins.iter().any(|a| a.username == username) {
            return Ok(false);
        }

        admins.push(Admin {
            id: self.next_admin_id.fetch_add(1, Ordering::SeqCst),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        });
        Ok(true)
    }

    async fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>, StorageError> {
        let admins = lock(&self.admins)?;
        Ok(admins.iter().find(|a| a.username == username).cloned())
    }

    async fn statistics(&self) -> Result<DatabaseStats, StorageError> {
        let drivers = lock(&self.drivers)?;
        let journeys = lock(&self.journeys)?;

        Ok(DatabaseStats {
            total_drivers: drivers.len() as u64,
            total_journeys: journeys.len() as u64,
            total_drowsiness_events: journeys.iter().map(|j| u64::from(j.drowsiness_count)).sum(),
            active_journeys: journeys.iter().filter(|j| j.is_active()).count() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_driver(username: &str) -> NewDriver {
        NewDriver {
            name: "Ravi Kumar".to_string(),
            age: 34,
            gender: "Male".to_string(),
            license_no: "DL-0420110012345".to_string(),
            place: "Delhi".to_string(),
            phone: "9810012345".to_string(),
            username: username.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_journey_lifecycle() {
        let repo = Repository::new();
        let driver = repo.insert_driver(&new_driver("ravi")).await.unwrap();

        let start = Utc::now();
        let id = repo.insert_journey(driver.id, start).await.unwrap();
        assert_eq!(repo.get_active_journey(driver.id).await.unwrap(), Some(id));

        repo.update_drowsiness_count(id, 3).await.unwrap();
        repo.finalize_journey(id, start + Duration::seconds(90), JourneyStatus::Completed)
            .await
            .unwrap();

        let journey = repo.journey(id).unwrap().unwrap();
        assert_eq!(journey.drowsiness_count, 3);
        assert_eq!(journey.status, JourneyStatus::Completed);
        assert_eq!(repo.get_active_journey(driver.id).await.unwrap(), None);

        // completed journeys no longer accept count updates
        assert_eq!(
            repo.update_drowsiness_count(id, 4).await,
            Err(StorageError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_journeys_newest_first() {
        let repo = Repository::new();
        let driver = repo.insert_driver(&new_driver("ravi")).await.unwrap();
        let base = Utc::now();

        let older = repo.insert_journey(driver.id, base).await.unwrap();
        let newer = repo
            .insert_journey(driver.id, base + Duration::minutes(5))
            .await
            .unwrap();

        let ids: Vec<_> = repo
            .list_journeys(driver.id)
            .await
            .unwrap()
            .iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(ids, vec![newer, older]);
    }

    #[tokio::test]
    async fn test_unknown_driver_rejected() {
        let repo = Repository::new();
        assert_eq!(
            repo.insert_journey(42, Utc::now()).await,
            Err(StorageError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let repo = Repository::new();
        repo.insert_driver(&new_driver("ravi")).await.unwrap();

        let err = repo.insert_driver(&new_driver("ravi")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_driver_cascades() {
        let repo = Repository::new();
        let ravi = repo.insert_driver(&new_driver("ravi")).await.unwrap();
        let meera = repo.insert_driver(&new_driver("meera")).await.unwrap();
        repo.insert_journey(ravi.id, Utc::now()).await.unwrap();
        let kept = repo.insert_journey(meera.id, Utc::now()).await.unwrap();

        assert!(repo.delete_driver(ravi.id).await.unwrap());
        assert!(!repo.delete_driver(ravi.id).await.unwrap());

        assert_eq!(repo.journey_count(), 1);
        assert!(repo.journey(kept).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_statistics() {
        let repo = Repository::new();
        assert_eq!(repo.statistics().await.unwrap(), DatabaseStats::default());

        let driver = repo.insert_driver(&new_driver("ravi")).await.unwrap();
        let first = repo.insert_journey(driver.id, Utc::now()).await.unwrap();
        repo.update_drowsiness_count(first, 2).await.unwrap();
        repo.finalize_journey(first, Utc::now(), JourneyStatus::Completed)
            .await
            .unwrap();
        let second = repo.insert_journey(driver.id, Utc::now()).await.unwrap();
        repo.update_drowsiness_count(second, 5).await.unwrap();

        let stats = repo.statistics().await.unwrap();
        assert_eq!(stats.total_drivers, 1);
        assert_eq!(stats.total_journeys, 2);
        assert_eq!(stats.total_drowsiness_events, 7);
        assert_eq!(stats.active_journeys, 1);
    }

    #[tokio::test]
    async fn test_admin_seeded_once() {
        let repo = Repository::new();
        assert!(repo.insert_admin_if_missing("admin", "h1").await.unwrap());
        assert!(!repo.insert_admin_if_missing("admin", "h2").await.unwrap());

        let admin = repo.find_admin_by_username("admin").await.unwrap().unwrap();
        assert_eq!(admin.password_hash, "h1");
    }
}
