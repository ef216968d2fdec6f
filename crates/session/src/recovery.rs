//! Crash recovery for journeys left `Active`

use chrono::Utc;
use storage::{DriverId, JourneyId, JourneyStatus, JourneyStore, StorageError};
use tracing::warn;

/// Mark every `Active` journey as `Completed`, except those of drivers in
/// `live_drivers`. Returns the ids of the journeys completed.
pub async fn complete_orphaned_journeys(
    store: &dyn JourneyStore,
    live_drivers: &[DriverId],
) -> Result<Vec<JourneyId>, StorageError> {
    let mut recovered = Vec::new();

    for journey in store.list_active_journeys().await? {
        if live_drivers.contains(&journey.driver_id) {
            continue;
        }
        let end_time = Utc::now().max(journey.start_time);
        store
            .finalize_journey(journey.id, end_time, JourneyStatus::Completed)
            .await?;
        warn!(
            driver_id = journey.driver_id,
            journey_id = journey.id,
            count = journey.drowsiness_count,
            "Completed orphaned journey"
        );
        recovered.push(journey.id);
    }
    Ok(recovered)
}
