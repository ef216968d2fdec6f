//! Scripted classifier
//!
//! Returns a predetermined verdict per frame. Paired with
//! `camera_capture::ReplaySource` it drives the whole pipeline without
//! a model file.

use crate::{Classification, ClassifierLoader, DmsError, FrameClassifier};
use camera_capture::VideoFrame;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct ScriptStats {
    loaded: AtomicUsize,
    released: AtomicUsize,
}

/// Loader for [`ScriptedClassifier`]
#[derive(Debug, Clone)]
pub struct ScriptedLoader {
    script: Arc<Vec<Classification>>,
    fail_at: Option<usize>,
    load_error: Option<String>,
    latency: Duration,
    stats: Arc<ScriptStats>,
}

impl ScriptedLoader {
    /// Verdicts in frame order; frames past the end are `Alert`
    pub fn new(script: Vec<Classification>) -> Self {
        Self {
            script: Arc::new(script),
            fail_at: None,
            load_error: None,
            latency: Duration::ZERO,
            stats: Arc::new(ScriptStats::default()),
        }
    }

    /// Classify every frame as `Alert`
    pub fn alert() -> Self {
        Self::new(Vec::new())
    }

    /// Fail inference on the frame with this index
    pub fn failing_at(mut self, frame_index: usize) -> Self {
        self.fail_at = Some(frame_index);
        self
    }

    /// Fail every load with the given reason
    pub fn failing_load(mut self, reason: impl Into<String>) -> Self {
        self.load_error = Some(reason.into());
        self
    }

    /// Spend this long on every frame
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn loaded_count(&self) -> usize {
        self.stats.loaded.load(Ordering::SeqCst)
    }

    pub fn released_count(&self) -> usize {
        self.stats.released.load(Ordering::SeqCst)
    }
}

impl ClassifierLoader for ScriptedLoader {
    fn load(&self) -> Result<Box<dyn FrameClassifier>, DmsError> {
        if let Some(reason) = &self.load_error {
            return Err(DmsError::ModelLoad(reason.clone()));
        }
        self.stats.loaded.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(ScriptedClassifier {
            script: Arc::clone(&self.script),
            cursor: 0,
            fail_at: self.fail_at,
            latency: self.latency,
            stats: Arc::clone(&self.stats),
        }))
    }
}

/// Classifier that replays a verdict script
#[derive(Debug)]
pub struct ScriptedClassifier {
    script: Arc<Vec<Classification>>,
    cursor: usize,
    fail_at: Option<usize>,
    latency: Duration,
    stats: Arc<ScriptStats>,
}

impl FrameClassifier for ScriptedClassifier {
    fn classify(&mut self, _frame: &VideoFrame) -> Result<Classification, DmsError> {
        let index = self.cursor;
        self.cursor += 1;

        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if self.fail_at == Some(index) {
            return Err(DmsError::Inference(format!("scripted failure at frame {}", index)));
        }

        Ok(self
            .script
            .get(index)
            .copied()
            .unwrap_or(Classification::Alert))
    }
}

impl Drop for ScriptedClassifier {
    fn drop(&mut self) {
        self.stats.released.fetch_add(1, Ordering::SeqCst);
    }
}
