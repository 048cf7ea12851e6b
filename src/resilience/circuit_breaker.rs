//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through and outcomes are recorded
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a limited number of trial calls test whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: window holds >= minimum_samples and failure rate >= threshold
//! Open → Half-Open: wait_open elapsed (checked lazily on the next call)
//! Half-Open → Closed: every permitted trial call succeeded
//! Half-Open → Open: any trial call failed
//! ```
//!
//! # Design Decisions
//! - One breaker per resource (not global)
//! - Fail fast in Open state (the operation is never invoked)
//! - State and window are guarded by one short critical section; the
//!   operation runs outside it
//! - Every admitted call holds a permit tagged with the state generation it
//!   was admitted in; results from an older generation are discarded

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Outcome of one call as seen by the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallResult {
    Success,
    Failure,
}

/// A state change, reported so the caller can emit it outside the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// The call was rejected without being admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotPermitted {
    pub state: CircuitState,
    /// Remaining open time, when the breaker is open.
    pub retry_after: Option<Duration>,
}

/// Point-in-time view of a breaker, for status output.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub buffered_calls: usize,
    pub failed_calls: usize,
    /// Failure percentage of the window, once it holds enough samples.
    pub failure_rate: Option<f64>,
}

/// Sliding window of the most recent call results.
#[derive(Debug)]
struct CallRecord {
    outcomes: VecDeque<CallResult>,
    capacity: usize,
    failures: usize,
}

impl CallRecord {
    fn new(capacity: usize) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
            failures: 0,
        }
    }

    fn push(&mut self, result: CallResult) {
        if self.outcomes.len() == self.capacity {
            if let Some(CallResult::Failure) = self.outcomes.pop_front() {
                self.failures -= 1;
            }
        }
        if result == CallResult::Failure {
            self.failures += 1;
        }
        self.outcomes.push_back(result);
    }

    fn len(&self) -> usize {
        self.outcomes.len()
    }

    fn failure_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.failures as f64 * 100.0 / self.outcomes.len() as f64
    }

    fn clear(&mut self) {
        self.outcomes.clear();
        self.failures = 0;
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    record: CallRecord,
    opened_at: Option<Instant>,
    generation: u64,
    trials_issued: u32,
    trial_successes: u32,
}

impl BreakerState {
    fn transition(&mut self, to: CircuitState, now: Instant) -> Transition {
        let from = self.state;
        self.state = to;
        self.generation += 1;
        self.trials_issued = 0;
        self.trial_successes = 0;
        match to {
            CircuitState::Open => self.opened_at = Some(now),
            CircuitState::HalfOpen => {}
            CircuitState::Closed => {
                self.opened_at = None;
                self.record.clear();
            }
        }
        Transition { from, to }
    }
}

/// Failure-rate circuit breaker for one resource.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let window = config.window_size.max(1);
        Self {
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                record: CallRecord::new(window),
                opened_at: None,
                generation: 0,
                trials_issued: 0,
                trial_successes: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state as the next call would see it.
    ///
    /// An open breaker whose wait has elapsed reports `HalfOpen`; the
    /// transition itself still happens on the next `try_acquire`.
    pub fn state(&self) -> CircuitState {
        self.effective_state(&self.lock(), Instant::now())
    }

    fn effective_state(&self, inner: &BreakerState, now: Instant) -> CircuitState {
        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at))
                if now.saturating_duration_since(opened_at) >= self.config.wait_open() =>
            {
                CircuitState::HalfOpen
            }
            (state, _) => state,
        }
    }

    /// Ask to run a call.
    ///
    /// On success the returned permit must be used to record the call's
    /// result. A transition is reported when this check moved the breaker
    /// from Open to Half-Open.
    pub fn try_acquire(&self) -> Result<(CallPermit<'_>, Option<Transition>), NotPermitted> {
        if !self.config.enabled {
            return Ok((CallPermit::detached(self), None));
        }

        let now = Instant::now();
        let mut inner = self.lock();
        let mut transition = None;

        if inner.state == CircuitState::Open {
            let opened_at = inner.opened_at.unwrap_or(now);
            let open_for = now.saturating_duration_since(opened_at);
            let wait = self.config.wait_open();
            if open_for < wait {
                return Err(NotPermitted {
                    state: CircuitState::Open,
                    retry_after: Some(wait - open_for),
                });
            }
            transition = Some(inner.transition(CircuitState::HalfOpen, now));
        }

        let trial = match inner.state {
            CircuitState::HalfOpen => {
                if inner.trials_issued >= self.config.permitted_calls_half_open {
                    return Err(NotPermitted {
                        state: CircuitState::HalfOpen,
                        retry_after: None,
                    });
                }
                inner.trials_issued += 1;
                true
            }
            _ => false,
        };

        let permit = CallPermit {
            breaker: self,
            generation: Some(inner.generation),
            trial,
        };
        Ok((permit, transition))
    }

    fn on_result(&self, generation: u64, result: CallResult) -> Option<Transition> {
        let now = Instant::now();
        let mut inner = self.lock();
        if inner.generation != generation {
            return None;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.record.push(result);
                let opens = inner.record.len() >= self.config.minimum_samples
                    && inner.record.failure_rate() >= self.config.failure_rate_threshold;
                opens.then(|| inner.transition(CircuitState::Open, now))
            }
            CircuitState::HalfOpen => match result {
                CallResult::Failure => Some(inner.transition(CircuitState::Open, now)),
                CallResult::Success => {
                    inner.trial_successes += 1;
                    let recovered = inner.trial_successes >= self.config.permitted_calls_half_open;
                    recovered.then(|| inner.transition(CircuitState::Closed, now))
                }
            },
            CircuitState::Open => None,
        }
    }

    fn release_trial(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation && inner.state == CircuitState::HalfOpen {
            inner.trials_issued = inner.trials_issued.saturating_sub(1);
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        let buffered = inner.record.len();
        BreakerSnapshot {
            state: self.effective_state(&inner, Instant::now()),
            buffered_calls: buffered,
            failed_calls: inner.record.failures,
            failure_rate: (buffered >= self.config.minimum_samples)
                .then(|| inner.record.failure_rate()),
        }
    }
}

/// Admission ticket for one call.
///
/// Dropping a permit without recording (e.g. the call was cancelled) hands a
/// Half-Open trial slot back.
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    /// `None` when the breaker is disabled.
    generation: Option<u64>,
    trial: bool,
}

impl<'a> CallPermit<'a> {
    fn detached(breaker: &'a CircuitBreaker) -> Self {
        Self {
            breaker,
            generation: None,
            trial: false,
        }
    }

    /// Record the call's result, returning any transition it caused.
    pub fn record(mut self, result: CallResult) -> Option<Transition> {
        let generation = self.generation.take()?;
        self.breaker.on_result(generation, result)
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if let (Some(generation), true) = (self.generation, self.trial) {
            self.breaker.release_trial(generation);
        }
    }
}
