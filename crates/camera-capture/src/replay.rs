//! Replay camera
//!
//! Plays back a fixed list of frames. Used for bench runs of the
//! detection pipeline and for session tests, where a real webcam is not
//! available. Once the list is exhausted the camera either reports
//! [`CameraError::EndOfStream`] (device unplugged) or keeps timing out
//! like an idle device, depending on [`ReplaySource::hold_open`].

use crate::{Camera, CameraError, CameraSource, VideoFrame};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct ReplayStats {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

/// Camera source that hands out replay cameras
#[derive(Debug, Clone)]
pub struct ReplaySource {
    frames: Arc<Vec<VideoFrame>>,
    frame_interval: Duration,
    hold_open: bool,
    open_error: Option<String>,
    stats: Arc<ReplayStats>,
}

impl ReplaySource {
    /// Replay the given frames in order
    pub fn new(frames: Vec<VideoFrame>) -> Self {
        Self {
            frames: Arc::new(frames),
            frame_interval: Duration::ZERO,
            hold_open: false,
            open_error: None,
            stats: Arc::new(ReplayStats::default()),
        }
    }

    /// Replay `count` black 8x8 frames
    pub fn blank(count: u32) -> Self {
        Self::new((0..count).map(|seq| VideoFrame::blank(8, 8, seq)).collect())
    }

    /// Sleep between frames (should stay below the loop's read timeout)
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Keep the device open after the last frame instead of ending the stream
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Make every acquisition fail with the given reason
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.open_error = Some(reason.into());
        self
    }

    /// Number of handles acquired so far
    pub fn acquired_count(&self) -> usize {
        self.stats.acquired.load(Ordering::SeqCst)
    }

    /// Number of handles released so far
    pub fn released_count(&self) -> usize {
        self.stats.released.load(Ordering::SeqCst)
    }
}

impl CameraSource for ReplaySource {
    fn acquire(&self) -> Result<Box<dyn Camera>, CameraError> {
        if let Some(reason) = &self.open_error {
            return Err(CameraError::Open(reason.clone()));
        }
        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        debug!("Replay camera acquired with {} frames", self.frames.len());

        Ok(Box::new(ReplayCamera {
            frames: Arc::clone(&self.frames),
            cursor: 0,
            frame_interval: self.frame_interval,
            hold_open: self.hold_open,
            stats: Arc::clone(&self.stats),
            released: false,
        }))
    }
}

/// Handle produced by [`ReplaySource`]
#[derive(Debug)]
pub struct ReplayCamera {
    frames: Arc<Vec<VideoFrame>>,
    cursor: usize,
    frame_interval: Duration,
    hold_open: bool,
    stats: Arc<ReplayStats>,
    released: bool,
}

impl Camera for ReplayCamera {
    fn read_frame(&mut self, timeout: Duration) -> Result<VideoFrame, CameraError> {
        if self.released {
            return Err(CameraError::Stream("camera already released".into()));
        }

        if let Some(frame) = self.frames.get(self.cursor) {
            if !self.frame_interval.is_zero() {
                std::thread::sleep(self.frame_interval);
            }
            self.cursor += 1;
            return Ok(frame.clone());
        }

        if self.hold_open {
            std::thread::sleep(timeout);
            Err(CameraError::Timeout(timeout.as_millis() as u64))
        } else {
            Err(CameraError::EndOfStream)
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.stats.released.fetch_add(1, Ordering::SeqCst);
            debug!("Replay camera released after {} frames", self.cursor);
        }
    }
}

impl Drop for ReplayCamera {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(5);

    #[test]
    fn test_replays_then_ends() {
        let source = ReplaySource::blank(2);
        let mut camera = source.acquire().unwrap();

        assert_eq!(camera.read_frame(TIMEOUT).unwrap().sequence, 0);
        assert_eq!(camera.read_frame(TIMEOUT).unwrap().sequence, 1);
        assert_eq!(camera.read_frame(TIMEOUT).unwrap_err(), CameraError::EndOfStream);
    }

    #[test]
    fn test_hold_open_times_out() {
        let source = ReplaySource::blank(0).hold_open();
        let mut camera = source.acquire().unwrap();

        assert_eq!(camera.read_frame(TIMEOUT).unwrap_err(), CameraError::Timeout(5));
    }

    #[test]
    fn test_release_counted_once() {
        let source = ReplaySource::blank(1);
        let mut camera = source.acquire().unwrap();
        camera.release();
        camera.release();
        drop(camera);

        assert_eq!(source.acquired_count(), 1);
        assert_eq!(source.released_count(), 1);
    }

    #[test]
    fn test_failing_source() {
        let source = ReplaySource::blank(1).failing("no device");
        let err = source.acquire().err().unwrap();

        assert_eq!(err, CameraError::Open("no device".into()));
        assert_eq!(source.acquired_count(), 0);
    }
}
