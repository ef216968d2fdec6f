//! Detection loop state tracking

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Lifecycle of one detection loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoopState {
    #[default]
    Idle,
    /// Loading the classifier and opening the camera
    Initializing,
    /// Reading and classifying frames
    Running,
    /// Stop requested; releasing resources
    Stopping,
    Stopped,
}

impl LoopState {
    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: LoopState) -> bool {
        use LoopState::*;

        matches!(
            (self, next),
            (Idle, Initializing)
                | (Initializing, Running)
                | (Initializing, Stopped)
                | (Running, Stopping)
                | (Running, Stopped)
                | (Stopping, Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == LoopState::Stopped
    }
}

/// Publishes loop state changes to any number of observers
#[derive(Debug)]
pub struct LoopStatus {
    tx: watch::Sender<LoopState>,
}

impl LoopStatus {
    pub fn channel() -> (Self, watch::Receiver<LoopState>) {
        let (tx, rx) = watch::channel(LoopState::Idle);
        (Self { tx }, rx)
    }

    /// Current state
    pub fn current(&self) -> LoopState {
        *self.tx.borrow()
    }

    /// Move to `next`, logging illegal transitions
    pub fn advance(&self, next: LoopState) {
        let current = self.current();
        if !current.can_transition_to(next) {
            warn!("Illegal loop transition {:?} -> {:?}", current, next);
        }
        debug!("Detection loop {:?} -> {:?}", current, next);
        self.tx.send_replace(next);
    }
}
