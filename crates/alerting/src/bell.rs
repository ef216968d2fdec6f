//! Terminal bell alarm

use crate::{AlertError, Alerter};
use std::io::Write;

/// Rings the terminal bell on stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct BellAlerter;

impl Alerter for BellAlerter {
    fn raise_alert(&self) -> Result<(), AlertError> {
        let mut stderr = std::io::stderr().lock();
        stderr
            .write_all(b"\x07")
            .and_then(|_| stderr.flush())
            .map_err(|e| AlertError::Playback(e.to_string()))
    }
}
