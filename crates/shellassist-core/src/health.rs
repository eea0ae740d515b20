//! Circuit breaker state machine and latency tracker, grounded in
//! `api/claude/src/circuit_breaker.rs`'s `CircuitState`/`CircuitBreaker`
//! shape but pinned to the spec's fixed policy (3 consecutive failures
//! opens the circuit, 30s cooldown, single unserialized probe in
//! half-open) rather than the teacher's configurable thresholds.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const FAILURE_THRESHOLD: u32 = 3;
const COOLDOWN: Duration = Duration::from_secs(30);
const MAX_LATENCY_SAMPLES: usize = 10;
const HIGH_LATENCY_MS: f64 = 2000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Tracks consecutive failures, circuit state, and recent latency samples
/// for one provider connection.
pub struct HealthState {
    circuit: CircuitState,
    consecutive_failures: u32,
    circuit_opened_at: Option<Instant>,
    latency_samples: VecDeque<f64>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            circuit: CircuitState::Closed,
            consecutive_failures: 0,
            circuit_opened_at: None,
            latency_samples: VecDeque::with_capacity(MAX_LATENCY_SAMPLES),
        }
    }

    pub fn circuit(&self) -> CircuitState {
        self.circuit
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// True if a request may be sent. In `Open`, transitions to `HalfOpen`
    /// and allows the single probe once the cooldown has elapsed.
    pub fn should_allow_request(&mut self) -> bool {
        match self.circuit {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self
                    .circuit_opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= COOLDOWN {
                    self.circuit = CircuitState::HalfOpen;
                    tracing::info!("circuit breaker half-open — allowing probe request");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call: clears the failure streak, closes the
    /// circuit unconditionally, and stores the latency sample.
    pub fn record_success(&mut self, latency_ms: f64) {
        self.consecutive_failures = 0;
        if self.circuit != CircuitState::Closed {
            tracing::info!("circuit breaker closed — connection recovered");
        }
        self.circuit = CircuitState::Closed;
        self.circuit_opened_at = None;
        self.latency_samples.push_back(latency_ms);
        if self.latency_samples.len() > MAX_LATENCY_SAMPLES {
            self.latency_samples.pop_front();
        }
    }

    /// Record a failed call: bumps the failure streak and, depending on
    /// current state, opens or re-opens the circuit.
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        match self.circuit {
            CircuitState::Closed => {
                if self.consecutive_failures >= FAILURE_THRESHOLD {
                    self.circuit = CircuitState::Open;
                    self.circuit_opened_at = Some(Instant::now());
                    tracing::warn!(
                        failures = self.consecutive_failures,
                        "circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                self.circuit = CircuitState::Open;
                self.circuit_opened_at = Some(Instant::now());
                tracing::warn!("circuit breaker re-opened — probe failed");
            }
            CircuitState::Open => {}
        }
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.latency_samples.is_empty() {
            return 0.0;
        }
        self.latency_samples.iter().sum::<f64>() / self.latency_samples.len() as f64
    }

    pub fn is_high_latency(&self) -> bool {
        self.avg_latency_ms() > HIGH_LATENCY_MS
    }
}
