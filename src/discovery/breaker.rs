use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::DiscoveryError;

/// Source of "now" for cooldown arithmetic.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(delta) = chrono::Duration::from_std(by) {
            let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
            *now += delta;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit stays open, in seconds.
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_secs: 15 * 60,
        }
    }
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { until: DateTime<Utc> },
}

#[derive(Debug, Default)]
struct BreakerInner {
    consecutive_failures: u32,
    open_until: Option<DateTime<Utc>>,
}

/// Suspends one discovery strategy after repeated failures.
///
/// Closes again lazily: the first check after `open_until` resets the
/// failure count and lets calls through.
pub struct CircuitBreaker {
    name: String,
    threshold: u32,
    cooldown: chrono::Duration,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    pub fn with_clock(name: impl Into<String>, config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let cooldown =
            chrono::Duration::from_std(config.cooldown()).unwrap_or_else(|_| chrono::Duration::days(1));
        Self {
            name: name.into(),
            threshold: config.failure_threshold.max(1),
            cooldown,
            clock,
            inner: Mutex::new(BreakerInner::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether calls must be skipped right now.
    pub fn is_open(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.lock();
        match inner.open_until {
            Some(until) if now < until => true,
            Some(_) => {
                inner.open_until = None;
                inner.consecutive_failures = 0;
                info!("{} circuit closed after cooldown", self.name);
                false
            }
            None => false,
        }
    }

    /// `Err(CircuitOpen)` while the circuit is open.
    pub fn check(&self) -> Result<(), DiscoveryError> {
        if self.is_open() {
            if let Some(until) = self.lock().open_until {
                return Err(DiscoveryError::CircuitOpen(until));
            }
        }
        Ok(())
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = 0;
    }

    /// Count a failure. Returns true if this failure opened the circuit.
    pub fn record_failure(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        if inner.open_until.is_some() || inner.consecutive_failures < self.threshold {
            return false;
        }

        let until = now + self.cooldown;
        inner.open_until = Some(until);
        warn!(
            "{} circuit opened after {} consecutive failures, retrying after {}",
            self.name,
            inner.consecutive_failures,
            until.format("%H:%M:%S")
        );
        true
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn state(&self) -> BreakerState {
        let open = self.is_open();
        let inner = self.lock();
        match inner.open_until {
            Some(until) if open => BreakerState::Open { until },
            _ => BreakerState::Closed {
                consecutive_failures: inner.consecutive_failures,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let breaker = CircuitBreaker::with_clock("test", BreakerConfig::default(), clock.clone());
        (breaker, clock)
    }

    #[test]
    fn test_trips_on_fifth_failure() {
        let (breaker, _) = breaker();
        for _ in 0..4 {
            assert!(!breaker.record_failure());
            assert!(!breaker.is_open());
        }
        assert!(breaker.record_failure());
        assert!(breaker.is_open());
        assert!(matches!(breaker.check(), Err(DiscoveryError::CircuitOpen(_))));
    }

    #[test]
    fn test_success_resets_count() {
        let (breaker, _) = breaker();
        for _ in 0..4 {
            breaker.record_failure();
        }
        breaker.record_success();
        assert_eq!(breaker.consecutive_failures(), 0);
        assert!(!breaker.record_failure());
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_closes_after_cooldown() {
        let (breaker, clock) = breaker();
        for _ in 0..5 {
            breaker.record_failure();
        }

        clock.advance(Duration::from_secs(15 * 60 - 1));
        assert!(breaker.is_open());

        clock.advance(Duration::from_secs(1));
        assert!(!breaker.is_open());
        assert_eq!(breaker.consecutive_failures(), 0);
        assert_eq!(
            breaker.state(),
            BreakerState::Closed {
                consecutive_failures: 0
            }
        );
        assert!(breaker.check().is_ok());
    }

    #[test]
    fn test_open_state_reports_deadline() {
        let (breaker, clock) = breaker();
        let start = clock.now();
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert_eq!(
            breaker.state(),
            BreakerState::Open {
                until: start + chrono::Duration::minutes(15)
            }
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = BreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.cooldown(), Duration::from_secs(900));
    }
}
