//! Journey history reports

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use storage::{Driver, DriverId, Journey, JourneyId, JourneyStatus, JourneyStore, StorageError};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub journey_id: JourneyId,
    pub start: DateTime<Utc>,
    /// `None` while the journey is still running
    pub end: Option<DateTime<Utc>>,
    pub drowsiness_count: u32,
    pub status: JourneyStatus,
}

impl From<Journey> for ReportEntry {
    fn from(journey: Journey) -> Self {
        Self {
            journey_id: journey.id,
            start: journey.start_time,
            end: journey.end_time,
            drowsiness_count: journey.drowsiness_count,
            status: journey.status,
        }
    }
}

/// A driver's journeys, newest first. May be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JourneyReport {
    pub driver_id: DriverId,
    pub driver_name: String,
    pub journeys: Vec<ReportEntry>,
}

impl JourneyReport {
    pub fn is_empty(&self) -> bool {
        self.journeys.is_empty()
    }

    pub fn total_drowsiness_events(&self) -> u64 {
        self.journeys
            .iter()
            .map(|j| u64::from(j.drowsiness_count))
            .sum()
    }
}

impl fmt::Display for JourneyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No journeys found for this driver");
        }

        writeln!(f, "Driver: {}", self.driver_name)?;
        writeln!(f)?;
        writeln!(f, "Journey History:")?;
        for entry in &self.journeys {
            writeln!(f)?;
            writeln!(f, "Start: {}", entry.start.format(TIME_FORMAT))?;
            match entry.end {
                Some(end) => writeln!(f, "End: {}", end.format(TIME_FORMAT))?,
                None => writeln!(f, "End: Ongoing")?,
            }
            writeln!(f, "Drowsiness Events: {}", entry.drowsiness_count)?;
            writeln!(f, "Status: {}", entry.status)?;
        }
        Ok(())
    }
}

/// Build the journey report for one driver
pub async fn generate_report(
    store: &dyn JourneyStore,
    driver: &Driver,
) -> Result<JourneyReport, StorageError> {
    let journeys = store.list_journeys(driver.id).await?;

    Ok(JourneyReport {
        driver_id: driver.id,
        driver_name: driver.name.clone(),
        journeys: journeys.into_iter().map(ReportEntry::from).collect(),
    })
}
