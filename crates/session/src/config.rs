use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session controller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long `end_session` waits for the worker before force-finalizing
    pub join_timeout_ms: u64,

    /// Capacity of the worker -> controller event channel
    pub event_buffer: usize,

    /// Capacity of the notice broadcast channel
    pub notice_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            join_timeout_ms: 5000,
            event_buffer: 64,
            notice_capacity: 128,
        }
    }
}

impl SessionConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}
