//! Alerting System
//!
//! Provides the alarm capability used by the detection loop, with
//! cooldown-based deduplication and an hourly cap.

mod bell;
mod manager;

pub use bell::BellAlerter;
pub use manager::{AlertConfig, AlertManager, AlertState, ThrottledAlerter};

use thiserror::Error;

/// Alert errors
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Alarm playback failed: {0}")]
    Playback(String),
}

/// Something that can get the driver's attention.
///
/// Callers treat alerts as fire-and-forget: an error is logged and never
/// stops monitoring.
pub trait Alerter: Send + Sync {
    fn raise_alert(&self) -> Result<(), AlertError>;
}
