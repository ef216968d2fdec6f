//! Drowsiness event recording
//!
//! The recorder is the only writer of a journey's drowsiness count. It
//! consumes [`DetectionEvent`]s from the frame loop's channel, or from
//! any other producer, so the count can be driven without a camera.

use crate::notice::SessionNotice;
use dms::DetectionEvent;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use storage::{DriverId, JourneyId, JourneyStore, StorageError};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

pub struct JourneyRecorder {
    driver_id: DriverId,
    journey_id: JourneyId,
    store: Arc<dyn JourneyStore>,
    count: AtomicU32,
    /// Set once finalization starts; later events are dropped
    closed: AtomicBool,
    notices: broadcast::Sender<SessionNotice>,
}

impl JourneyRecorder {
    pub fn new(
        driver_id: DriverId,
        journey_id: JourneyId,
        store: Arc<dyn JourneyStore>,
        notices: broadcast::Sender<SessionNotice>,
    ) -> Self {
        Self {
            driver_id,
            journey_id,
            store,
            count: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            notices,
        }
    }

    pub fn journey_id(&self) -> JourneyId {
        self.journey_id
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Count one drowsy frame and persist the new total.
    ///
    /// The absolute count is written, so a failed update is repaired by the
    /// next successful one. Returns the in-memory count.
    pub async fn record_event(&self, event: &DetectionEvent) -> u32 {
        if self.is_closed() {
            debug!(
                journey_id = self.journey_id,
                sequence = event.sequence,
                "Event after finalization dropped"
            );
            return self.count();
        }

        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Err(e) = self
            .store
            .update_drowsiness_count(self.journey_id, count)
            .await
        {
            warn!(
                journey_id = self.journey_id,
                count, "Failed to persist drowsiness count, will retry on next event: {}", e
            );
        }

        let _ = self.notices.send(SessionNotice::DrowsinessDetected {
            driver_id: self.driver_id,
            journey_id: self.journey_id,
            count,
        });
        count
    }

    /// Record every event until all senders are gone
    pub async fn drain(&self, events: &mut mpsc::Receiver<DetectionEvent>) -> u32 {
        while let Some(event) = events.recv().await {
            self.record_event(&event).await;
        }
        self.count()
    }

    /// Stop accepting events and write the final count
    pub(crate) async fn close_and_flush(&self) -> Result<u32, StorageError> {
        self.closed.store(true, Ordering::SeqCst);
        let count = self.count();
        self.store
            .update_drowsiness_count(self.journey_id, count)
            .await?;
        Ok(count)
    }
}
