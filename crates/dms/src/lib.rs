//! Driver Monitoring System (DMS)
//!
//! Drowsiness monitoring over a camera feed:
//! - Pluggable per-frame classifier ([`FrameClassifier`])
//! - Cooperative, cancellable detection loop ([`FrameLoop`])
//! - Loop lifecycle tracking ([`LoopState`])
//!
//! How a frame is judged drowsy (eye cropping, thresholds, smoothing) is
//! owned entirely by the classifier implementation.

pub mod config;
pub mod detection;
pub mod scripted;
pub mod state;

pub use config::DmsConfig;
pub use detection::{DetectionEvent, FrameLoop, LoopError, LoopExit, LoopHandle};
pub use scripted::{ScriptedClassifier, ScriptedLoader};
pub use state::{LoopState, LoopStatus};

use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// DMS error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DmsError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Verdict for a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Alert,
    Drowsy,
}

impl Classification {
    pub fn is_drowsy(self) -> bool {
        self == Classification::Drowsy
    }
}

/// A loaded drowsiness classifier.
///
/// Model resources are released when the value is dropped.
pub trait FrameClassifier: Send {
    fn classify(&mut self, frame: &VideoFrame) -> Result<Classification, DmsError>;
}

/// Loads classifier resources (one instance per monitoring session)
pub trait ClassifierLoader: Send + Sync {
    fn load(&self) -> Result<Box<dyn FrameClassifier>, DmsError>;
}
