//! Journey Session Lifecycle
//!
//! Ties a driver's persisted journey to a running drowsiness detection
//! loop:
//! - At most one live session per driver
//! - Drowsiness events counted and persisted as they arrive
//! - Bounded, join-before-finalize shutdown
//! - Automatic completion when the camera disconnects
//! - Journey reports

mod config;
mod controller;
mod error;
mod notice;
mod recorder;
mod recovery;
mod report;

pub use config::SessionConfig;
pub use controller::SessionController;
pub use error::SessionError;
pub use notice::{EndReason, SessionNotice};
pub use recorder::JourneyRecorder;
pub use recovery::complete_orphaned_journeys;
pub use report::{generate_report, JourneyReport, ReportEntry};
