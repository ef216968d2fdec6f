//! DMS configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Detection loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Maximum wait for a single camera frame (milliseconds)
    pub frame_timeout_ms: u64,

    /// Read timeouts in a row before the camera counts as disconnected
    pub max_consecutive_timeouts: u32,

    /// Classification time above which a frame is logged as slow (milliseconds)
    pub max_frame_latency_ms: u64,

    /// Sound the alarm on drowsy frames
    pub raise_alerts: bool,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            frame_timeout_ms: 500,
            max_consecutive_timeouts: 10,
            max_frame_latency_ms: 250,
            raise_alerts: true,
        }
    }
}

impl DmsConfig {
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn max_frame_latency(&self) -> Duration {
        Duration::from_millis(self.max_frame_latency_ms)
    }
}
