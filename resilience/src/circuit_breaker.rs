//! Per-operation circuit breaker, trimmed down from the teacher's
//! `CircuitBreaker`/`CircuitBreakerManager` in `indexers::execution::error_handling`
//! to the state machine distilled §5 actually calls for: `closed → open → half_open
//! → closed`, with no dead-letter queue or pluggable error-reporting hook.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Consecutive successes in `HalfOpen` before the circuit closes.
    pub success_threshold: u32,
    /// How long the circuit stays `Open` before probing with a `HalfOpen` call.
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

/// A single named operation's breaker state.
#[derive(Debug)]
struct CircuitBreaker {
    state: CircuitBreakerState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
            config,
        }
    }

    fn is_call_allowed(&mut self) -> bool {
        match self.state {
            CircuitBreakerState::Closed => true,
            CircuitBreakerState::HalfOpen => true,
            CircuitBreakerState::Open => {
                let elapsed = self.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.recovery_timeout {
                    self.state = CircuitBreakerState::HalfOpen;
                    self.success_count = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&mut self) {
        match self.state {
            CircuitBreakerState::Closed => {
                self.failure_count = 0;
            }
            CircuitBreakerState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.config.success_threshold {
                    self.state = CircuitBreakerState::Closed;
                    self.failure_count = 0;
                    self.success_count = 0;
                    self.opened_at = None;
                }
            }
            CircuitBreakerState::Open => {}
        }
    }

    fn record_failure(&mut self) {
        match self.state {
            CircuitBreakerState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= self.config.failure_threshold {
                    self.state = CircuitBreakerState::Open;
                    self.opened_at = Some(Instant::now());
                }
            }
            CircuitBreakerState::HalfOpen => {
                self.state = CircuitBreakerState::Open;
                self.opened_at = Some(Instant::now());
                self.success_count = 0;
            }
            CircuitBreakerState::Open => {}
        }
    }

    fn state(&self) -> CircuitBreakerState {
        self.state
    }
}

/// Tracks one [`CircuitBreaker`] per named operation (`graph_store`,
/// `vector_store`, `embedder`, `llm`, ...).
pub struct CircuitBreakerManager {
    config: CircuitBreakerConfig,
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
}

impl CircuitBreakerManager {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_call_allowed(&self, operation: &str) -> bool {
        let mut breakers = self.breakers.lock().unwrap();
        let breaker = breakers
            .entry(operation.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.config.clone()));
        let allowed = breaker.is_call_allowed();
        if !allowed {
            tracing::warn!(target: "circuit_breaker", operation, "call rejected: circuit open");
        }
        allowed
    }

    pub fn record_success(&self, operation: &str) {
        let mut breakers = self.breakers.lock().unwrap();
        breakers
            .entry(operation.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.config.clone()))
            .record_success();
    }

    pub fn record_failure(&self, operation: &str) {
        let mut breakers = self.breakers.lock().unwrap();
        let breaker = breakers
            .entry(operation.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.config.clone()));
        breaker.record_failure();
        if breaker.state() == CircuitBreakerState::Open {
            tracing::warn!(target: "circuit_breaker", operation, "circuit opened");
        }
    }

    pub fn state_of(&self, operation: &str) -> CircuitBreakerState {
        let mut breakers = self.breakers.lock().unwrap();
        breakers
            .entry(operation.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.config.clone()))
            .state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            success_threshold: 2,
            recovery_timeout: Duration::from_millis(10),
        }
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let manager = CircuitBreakerManager::new(fast_config());
        for _ in 0..3 {
            manager.record_failure("graph_store");
        }
        assert_eq!(manager.state_of("graph_store"), CircuitBreakerState::Open);
        assert!(!manager.is_call_allowed("graph_store"));
    }

    #[test]
    fn half_opens_after_recovery_timeout_then_closes_on_success() {
        let manager = CircuitBreakerManager::new(fast_config());
        for _ in 0..3 {
            manager.record_failure("vector_store");
        }
        std::thread::sleep(Duration::from_millis(15));
        assert!(manager.is_call_allowed("vector_store"));
        assert_eq!(
            manager.state_of("vector_store"),
            CircuitBreakerState::HalfOpen
        );
        manager.record_success("vector_store");
        manager.record_success("vector_store");
        assert_eq!(manager.state_of("vector_store"), CircuitBreakerState::Closed);
    }

    #[test]
    fn any_failure_in_half_open_reopens() {
        let manager = CircuitBreakerManager::new(fast_config());
        for _ in 0..3 {
            manager.record_failure("llm");
        }
        std::thread::sleep(Duration::from_millis(15));
        assert!(manager.is_call_allowed("llm"));
        manager.record_failure("llm");
        assert_eq!(manager.state_of("llm"), CircuitBreakerState::Open);
    }

    #[test]
    fn independent_breakers_per_operation() {
        let manager = CircuitBreakerManager::new(fast_config());
        for _ in 0..3 {
            manager.record_failure("graph_store");
        }
        assert_eq!(manager.state_of("graph_store"), CircuitBreakerState::Open);
        assert_eq!(manager.state_of("embedder"), CircuitBreakerState::Closed);
    }
}
