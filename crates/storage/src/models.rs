//! Persisted records

use crate::StorageError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub type DriverId = i64;
pub type JourneyId = i64;

/// Registered driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub license_no: String,
    pub place: String,
    pub phone: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// Driver record before insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDriver {
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub license_no: String,
    pub place: String,
    pub phone: String,
    pub username: String,
    pub password_hash: String,
}

impl NewDriver {
    pub(crate) fn into_driver(self, id: DriverId) -> Driver {
        Driver {
            id,
            name: self.name,
            age: self.age,
            gender: self.gender,
            license_no: self.license_no,
            place: self.place,
            phone: self.phone,
            username: self.username,
            password_hash: self.password_hash,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JourneyStatus {
    Active,
    Completed,
}

impl JourneyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JourneyStatus::Active => "Active",
            JourneyStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for JourneyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JourneyStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(JourneyStatus::Active),
            "Completed" => Ok(JourneyStatus::Completed),
            other => Err(StorageError::DatabaseError(format!(
                "invalid journey status: {}",
                other
            ))),
        }
    }
}

/// One monitoring session of one driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Journey {
    pub id: JourneyId,
    pub driver_id: DriverId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub drowsiness_count: u32,
    pub status: JourneyStatus,
}

impl Journey {
    pub fn is_active(&self) -> bool {
        self.status == JourneyStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// Totals shown on the admin dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    pub total_drivers: u64,
    pub total_journeys: u64,
    pub total_drowsiness_events: u64,
    pub active_journeys: u64,
}
