use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::core::config::CircuitBreakerSettings;
use crate::core::types::ProviderId;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Provider calls go through
    Closed,
    /// Provider is considered down; calls fail fast into the local fallback
    Open,
    /// Recovery window elapsed; trial calls decide whether to close again
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: usize,
    /// How long to stay open before allowing a trial call
    pub recovery_timeout: Duration,
    /// Consecutive half-open successes needed to close the circuit
    pub success_threshold: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            recovery_timeout: Duration::from_secs(settings.recovery_seconds),
            success_threshold: settings.success_threshold,
        }
    }
}

/// Per-provider circuit breaker.
///
/// A provider that keeps failing is skipped for `recovery_timeout`, so
/// requests go straight to local compositing instead of waiting on a dead
/// endpoint.
#[derive(Clone)]
pub struct CircuitBreaker {
    provider: ProviderId,
    inner: Arc<RwLock<CircuitBreakerInner>>,
    config: CircuitBreakerConfig,
}

struct CircuitBreakerInner {
    state: CircuitState,
    consecutive_failures: usize,
    consecutive_successes: usize,
    opened_at: Option<Instant>,
    total_failures: usize,
    total_successes: usize,
}

impl CircuitBreaker {
    pub fn new(provider: ProviderId, config: CircuitBreakerConfig) -> Self {
        Self {
            provider,
            inner: Arc::new(RwLock::new(CircuitBreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                total_failures: 0,
                total_successes: 0,
            })),
            config,
        }
    }

    /// Whether a call may be attempted now
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.write();

        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => match inner.opened_at {
                Some(opened) if opened.elapsed() >= self.config.recovery_timeout => {
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    info!("Circuit for {} half-open, allowing trial request", self.provider);
                    true
                }
                _ => false,
            },
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.write();
        inner.total_successes += 1;
        inner.consecutive_failures = 0;

        match inner.state {
            CircuitState::Closed => {}
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_successes = 0;
                    inner.opened_at = None;
                    info!("Circuit for {} closed, provider recovered", self.provider);
                }
            }
            CircuitState::Open => {
                // A call that started before the trip came back fine
                inner.state = CircuitState::HalfOpen;
                inner.consecutive_successes = 1;
            }
        }
    }

    /// Record a failed call. Returns true when this failure opened the circuit.
    pub fn record_failure(&self) -> bool {
        let mut inner = self.inner.write();
        inner.total_failures += 1;
        inner.consecutive_successes = 0;
        inner.consecutive_failures += 1;

        let tripped = match inner.state {
            CircuitState::Closed => inner.consecutive_failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };

        if tripped {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            warn!(
                "Circuit for {} opened after {} consecutive failures",
                self.provider, inner.consecutive_failures
            );
        }
        tripped
    }

    pub fn state(&self) -> CircuitState {
        self.inner.read().state
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.read();
        CircuitBreakerStats {
            provider: self.provider,
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            total_failures: inner.total_failures,
            total_successes: inner.total_successes,
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.opened_at = None;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStats {
    pub provider: ProviderId,
    pub state: CircuitState,
    pub consecutive_failures: usize,
    pub total_failures: usize,
    pub total_successes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: usize, recovery_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            ProviderId::NanoBanana,
            CircuitBreakerConfig {
                failure_threshold,
                recovery_timeout: Duration::from_millis(recovery_ms),
                success_threshold: 2,
            },
        )
    }

    #[test]
    fn test_opens_after_threshold() {
        let breaker = breaker(3, 1000);
        assert!(breaker.allow_request());

        assert!(!breaker.record_failure());
        assert!(!breaker.record_failure());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.record_failure());
        assert_eq!(breaker.state(), CircuitState::Open);

        assert!(!breaker.allow_request());
        // Further failures while open do not count as new trips
        assert!(!breaker.record_failure());
    }

    #[test]
    fn test_recovers_through_half_open() {
        let breaker = breaker(2, 100);
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(150));

        assert!(breaker.allow_request());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let breaker = breaker(2, 100);
        breaker.record_failure();
        breaker.record_failure();

        std::thread::sleep(Duration::from_millis(150));
        assert!(breaker.allow_request());

        assert!(breaker.record_failure());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.stats().total_failures, 3);
    }
}
