//! Session notices for observers (UI, logs)

use serde::Serialize;
use storage::{DriverId, JourneyId};

/// Why a journey was finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EndReason {
    /// `end_session` or `shutdown`
    Requested,
    /// Camera disconnected or classifier failed mid-session
    StreamEnded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum SessionNotice {
    Started {
        driver_id: DriverId,
        journey_id: JourneyId,
    },
    DrowsinessDetected {
        driver_id: DriverId,
        journey_id: JourneyId,
        count: u32,
    },
    Ended {
        driver_id: DriverId,
        journey_id: JourneyId,
        drowsiness_count: u32,
        reason: EndReason,
    },
}

impl SessionNotice {
    pub fn journey_id(&self) -> JourneyId {
        match self {
            SessionNotice::Started { journey_id, .. }
            | SessionNotice::DrowsinessDetected { journey_id, .. }
            | SessionNotice::Ended { journey_id, .. } => *journey_id,
        }
    }
}
