//! Alert Manager Implementation

use crate::{AlertError, Alerter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Minimum gap between two alarms of the same kind (milliseconds)
    pub cooldown_ms: u64,
    /// Maximum alarms per hour before throttling
    pub max_alerts_per_hour: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 3000,
            max_alerts_per_hour: 240,
        }
    }
}

/// State of an alert
#[derive(Debug, Clone)]
pub struct AlertState {
    /// Last time this alert was fired
    pub last_fired: Instant,
    /// Number of times fired
    pub fire_count: usize,
}

/// Alert manager for deduplication and throttling
pub struct AlertManager {
    /// Configuration
    config: AlertConfig,
    /// Alert states by kind
    states: HashMap<String, AlertState>,
    /// Alerts fired in current hour
    hourly_count: usize,
    /// Hour start time
    hour_start: Instant,
}

impl AlertManager {
    /// Create a new alert manager
    pub fn new(config: AlertConfig) -> Self {
        info!("Creating alert manager with config: {:?}", config);
        Self {
            config,
            states: HashMap::new(),
            hourly_count: 0,
            hour_start: Instant::now(),
        }
    }

    /// Check if an alert of this kind may fire now
    pub fn should_fire(&mut self, kind: &str) -> bool {
        // Reset hourly counter if needed
        if self.hour_start.elapsed() > Duration::from_secs(3600) {
            self.hourly_count = 0;
            self.hour_start = Instant::now();
        }

        if self.hourly_count >= self.config.max_alerts_per_hour {
            warn!("Alert throttled: max alerts per hour reached");
            return false;
        }

        if let Some(state) = self.states.get(kind) {
            let cooldown = Duration::from_millis(self.config.cooldown_ms);
            if state.last_fired.elapsed() < cooldown {
                debug!("Alert suppressed: in cooldown period");
                return false;
            }
        }

        true
    }

    /// Record that an alert was fired
    pub fn record_fire(&mut self, kind: &str) {
        self.hourly_count += 1;

        let state = self.states.entry(kind.to_string()).or_insert(AlertState {
            last_fired: Instant::now(),
            fire_count: 0,
        });

        state.last_fired = Instant::now();
        state.fire_count += 1;

        debug!("Alert recorded: {} (count: {})", kind, state.fire_count);
    }

    /// Get state for an alert kind
    pub fn state(&self, kind: &str) -> Option<&AlertState> {
        self.states.get(kind)
    }

    /// Get hourly alert count
    pub fn hourly_count(&self) -> usize {
        self.hourly_count
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}

/// Wraps an [`Alerter`] so that repeated drowsy frames do not ring the
/// alarm on every frame.
pub struct ThrottledAlerter<A> {
    inner: A,
    manager: Mutex<AlertManager>,
}

impl<A: Alerter> ThrottledAlerter<A> {
    const KIND: &'static str = "drowsiness";

    pub fn new(inner: A, config: AlertConfig) -> Self {
        Self {
            inner,
            manager: Mutex::new(AlertManager::new(config)),
        }
    }

    /// Number of alarms actually raised in the current hour
    pub fn hourly_count(&self) -> usize {
        self.manager.lock().map(|m| m.hourly_count()).unwrap_or(0)
    }
}

impl<A: Alerter> Alerter for ThrottledAlerter<A> {
    fn raise_alert(&self) -> Result<(), AlertError> {
        let mut manager = self
            .manager
            .lock()
            .map_err(|e| AlertError::Playback(format!("Lock error: {}", e)))?;

        if !manager.should_fire(Self::KIND) {
            return Ok(());
        }

        self.inner.raise_alert()?;
        manager.record_fire(Self::KIND);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default, Clone)]
    struct CountingAlerter(Arc<AtomicUsize>);

    impl Alerter for CountingAlerter {
        fn raise_alert(&self) -> Result<(), AlertError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct BrokenAlerter;

    impl Alerter for BrokenAlerter {
        fn raise_alert(&self) -> Result<(), AlertError> {
            Err(AlertError::Playback("no audio device".into()))
        }
    }

    #[test]
    fn test_deduplication() {
        let config = AlertConfig {
            cooldown_ms: 60_000,
            ..Default::default()
        };
        let mut manager = AlertManager::new(config);

        // First alert should fire
        assert!(manager.should_fire("drowsiness"));
        manager.record_fire("drowsiness");

        // Immediate duplicate should not fire
        assert!(!manager.should_fire("drowsiness"));

        // Other kinds are independent
        assert!(manager.should_fire("camera"));
    }

    #[test]
    fn test_hourly_cap() {
        let config = AlertConfig {
            cooldown_ms: 0,
            max_alerts_per_hour: 2,
        };
        let mut manager = AlertManager::new(config);

        manager.record_fire("drowsiness");
        manager.record_fire("drowsiness");

        assert!(!manager.should_fire("drowsiness"));
        assert_eq!(manager.hourly_count(), 2);
        assert_eq!(manager.state("drowsiness").unwrap().fire_count, 2);
    }

    #[test]
    fn test_throttled_alerter_suppresses_within_cooldown() {
        let counter = CountingAlerter::default();
        let alerter = ThrottledAlerter::new(counter.clone(), AlertConfig::default());

        for _ in 0..5 {
            alerter.raise_alert().unwrap();
        }

        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(alerter.hourly_count(), 1);
    }

    #[test]
    fn test_failed_alarm_is_not_recorded() {
        let alerter = ThrottledAlerter::new(BrokenAlerter, AlertConfig::default());

        assert!(alerter.raise_alert().is_err());
        assert_eq!(alerter.hourly_count(), 0);
    }
}
