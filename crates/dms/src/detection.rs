//! Frame processing loop
//!
//! Runs on a blocking worker thread. Each iteration checks the
//! cancellation token, reads one frame with a bounded wait, classifies it
//! and reports drowsy frames on a bounded channel. The loop never touches
//! persistence: the receiver of [`DetectionEvent`]s owns that.

use crate::state::{LoopState, LoopStatus};
use crate::{ClassifierLoader, DmsConfig, DmsError, FrameClassifier};
use alerting::Alerter;
use camera_capture::{Camera, CameraError, CameraSource, VideoFrame};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// One frame classified as drowsy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// Camera sequence number of the frame
    pub sequence: u32,
    /// Capture timestamp of the frame (nanoseconds)
    pub timestamp_ns: u64,
}

impl DetectionEvent {
    fn from_frame(frame: &VideoFrame) -> Self {
        Self {
            sequence: frame.sequence,
            timestamp_ns: frame.timestamp_ns,
        }
    }
}

/// Why the loop stopped (or never started)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoopError {
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(CameraError),

    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(DmsError),

    #[error("Camera disconnected: {0}")]
    StreamEnded(CameraError),

    #[error("Classification failed: {0}")]
    Classification(DmsError),
}

impl LoopError {
    /// Resource acquisition failed before any frame was read
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            LoopError::CameraUnavailable(_) | LoopError::ClassifierUnavailable(_)
        )
    }
}

/// Summary returned when the worker exits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopExit {
    pub frames_processed: u64,
    pub drowsy_frames: u64,
    /// `None` when the loop stopped because it was cancelled
    pub error: Option<LoopError>,
}

/// Handles to a spawned loop
#[derive(Debug)]
pub struct LoopHandle {
    /// Live loop state
    pub state: watch::Receiver<LoopState>,
    /// Resolves once initialization succeeded or failed
    pub ready: oneshot::Receiver<Result<(), LoopError>>,
    /// Resolves when the worker has released its resources
    pub join: JoinHandle<LoopExit>,
}

/// Camera and classifier held for the duration of a run.
/// Dropping it releases both, on every exit path.
struct Resources {
    classifier: Box<dyn FrameClassifier>,
    camera: Box<dyn Camera>,
}

impl Drop for Resources {
    fn drop(&mut self) {
        self.camera.release();
        debug!("Detection resources released");
    }
}

/// Drowsiness detection loop for one monitoring session
pub struct FrameLoop {
    camera: Arc<dyn CameraSource>,
    classifier: Arc<dyn ClassifierLoader>,
    alerter: Option<Arc<dyn Alerter>>,
    config: DmsConfig,
}

impl FrameLoop {
    pub fn new(
        camera: Arc<dyn CameraSource>,
        classifier: Arc<dyn ClassifierLoader>,
        config: DmsConfig,
    ) -> Self {
        Self {
            camera,
            classifier,
            alerter: None,
            config,
        }
    }

    /// Sound this alarm on drowsy frames (if enabled in config)
    pub fn with_alerter(mut self, alerter: Arc<dyn Alerter>) -> Self {
        self.alerter = Some(alerter);
        self
    }

    /// Run the loop on a blocking worker thread
    pub fn spawn(
        self,
        cancel: CancellationToken,
        events: mpsc::Sender<DetectionEvent>,
    ) -> LoopHandle {
        let (status, state) = LoopStatus::channel();
        let (ready_tx, ready) = oneshot::channel();

        let join = tokio::task::spawn_blocking(move || self.run(&cancel, &events, &status, ready_tx));

        LoopHandle { state, ready, join }
    }

    /// Run the loop on the calling thread until cancelled or failed.
    ///
    /// Must not be called from an async context (event delivery blocks).
    pub fn run(
        self,
        cancel: &CancellationToken,
        events: &mpsc::Sender<DetectionEvent>,
        status: &LoopStatus,
        ready: oneshot::Sender<Result<(), LoopError>>,
    ) -> LoopExit {
        status.advance(LoopState::Initializing);

        let mut resources = match self.acquire() {
            Ok(resources) => resources,
            Err(e) => {
                warn!("Detection loop failed to initialize: {}", e);
                status.advance(LoopState::Stopped);
                let _ = ready.send(Err(e.clone()));
                return LoopExit {
                    error: Some(e),
                    ..Default::default()
                };
            }
        };

        status.advance(LoopState::Running);
        if ready.send(Ok(())).is_err() {
            debug!("Loop starter went away before initialization completed");
        }
        info!("Detection loop running");

        let exit = self.process_frames(&mut resources, cancel, events, status);

        drop(resources);
        status.advance(LoopState::Stopped);
        info!(
            frames = exit.frames_processed,
            drowsy = exit.drowsy_frames,
            "Detection loop stopped"
        );
        exit
    }

    fn acquire(&self) -> Result<Resources, LoopError> {
        let classifier = self
            .classifier
            .load()
            .map_err(LoopError::ClassifierUnavailable)?;
        let camera = self.camera.acquire().map_err(LoopError::CameraUnavailable)?;

        Ok(Resources { classifier, camera })
    }

    fn process_frames(
        &self,
        resources: &mut Resources,
        cancel: &CancellationToken,
        events: &mpsc::Sender<DetectionEvent>,
        status: &LoopStatus,
    ) -> LoopExit {
        let mut exit = LoopExit::default();
        let mut consecutive_timeouts = 0u32;
        let frame_timeout = self.config.frame_timeout();
        let max_latency = self.config.max_frame_latency();

        loop {
            if cancel.is_cancelled() {
                status.advance(LoopState::Stopping);
                return exit;
            }

            let frame = match resources.camera.read_frame(frame_timeout) {
                Ok(frame) => {
                    consecutive_timeouts = 0;
                    frame
                }
                Err(e) if !e.is_fatal() => {
                    consecutive_timeouts += 1;
                    if consecutive_timeouts >= self.config.max_consecutive_timeouts {
                        warn!("Camera silent for {} reads; treating as disconnected", consecutive_timeouts);
                        exit.error = Some(LoopError::StreamEnded(e));
                        return exit;
                    }
                    debug!("Frame read timed out ({} in a row)", consecutive_timeouts);
                    continue;
                }
                Err(e) => {
                    warn!("Camera stream ended: {}", e);
                    exit.error = Some(LoopError::StreamEnded(e));
                    return exit;
                }
            };

            if !frame.is_well_formed() {
                warn!(sequence = frame.sequence, "Skipping malformed frame");
                continue;
            }

            let started = Instant::now();
            let verdict = resources.classifier.classify(&frame);
            let elapsed = started.elapsed();
            if elapsed > max_latency {
                warn!(sequence = frame.sequence, "Slow classification: {:?}", elapsed);
            }

            match verdict {
                Ok(verdict) => {
                    exit.frames_processed += 1;
                    if verdict.is_drowsy() {
                        exit.drowsy_frames += 1;
                        self.report(events, &frame);
                        self.sound_alarm();
                    }
                }
                Err(e) => {
                    error!(sequence = frame.sequence, "Classifier failed: {}", e);
                    exit.error = Some(LoopError::Classification(e));
                    return exit;
                }
            }
        }
    }

    fn report(&self, events: &mpsc::Sender<DetectionEvent>, frame: &VideoFrame) {
        debug!(sequence = frame.sequence, "Drowsy frame");
        if events.blocking_send(DetectionEvent::from_frame(frame)).is_err() {
            debug!("Event receiver closed; drowsy frame not reported");
        }
    }

    fn sound_alarm(&self) {
        if !self.config.raise_alerts {
            return;
        }
        if let Some(alerter) = &self.alerter {
            if let Err(e) = alerter.raise_alert() {
                debug!("Alarm failed, continuing: {}", e);
            }
        }
    }
}
