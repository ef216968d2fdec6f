//! Camera Capture Contract
//!
//! The monitor never talks to a webcam driver directly. Backends implement
//! [`CameraSource`] (acquire a handle) and [`Camera`] (read frames, release
//! the device). Provides:
//! - Decoded RGB frames ([`VideoFrame`])
//! - Replay camera for deterministic sessions ([`ReplayCamera`])

pub mod frame;
pub mod replay;

pub use frame::VideoFrame;
pub use replay::{ReplayCamera, ReplaySource};

use std::time::Duration;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Camera stream ended")]
    EndOfStream,

    #[error("Capture timeout after {0}ms")]
    Timeout(u64),

    #[error("Streaming error: {0}")]
    Stream(String),
}

impl CameraError {
    /// Whether the device is gone for good (no further frames will arrive)
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CameraError::Timeout(_))
    }
}

/// An acquired camera handle.
///
/// Implementations must bound `read_frame` by `timeout` so that a cancelled
/// session is never stuck behind a silent device.
pub trait Camera: Send {
    /// Read the next frame, waiting at most `timeout`
    fn read_frame(&mut self, timeout: Duration) -> Result<VideoFrame, CameraError>;

    /// Release the underlying device. Called exactly once per handle.
    fn release(&mut self);
}

/// Factory for camera handles (one per monitoring session)
pub trait CameraSource: Send + Sync {
    /// Open the device and start streaming
    fn acquire(&self) -> Result<Box<dyn Camera>, CameraError>;
}
