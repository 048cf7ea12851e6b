//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failed attempt may be retried
//! - Execute retries with exponential backoff + jitter
//! - Enforce the per-call attempt budget
//!
//! # Design Decisions
//! - Only operation errors and timeouts are retryable; admission rejections
//!   never reach this layer
//! - Callers can veto retries for their own error values
//! - A budget is created per call and dropped with it
//! - Backoff waits hold no lock
//! - Timeouts share the attempt budget and backoff schedule of operation
//!   errors; `retry_on_timeout` is the only timeout-specific control

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::observability::events::{EventEmitter, EventType};
use crate::resilience::backoff::Backoff;
use crate::resilience::error::ResilienceError;
use crate::resilience::operation::Operation;
use crate::resilience::timeouts::TimeLimiter;

/// Attempt accounting for one call.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    attempts_made: u32,
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryBudget {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            attempts_made: 0,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Count a new attempt and return its 1-based number.
    pub fn start_attempt(&mut self) -> u32 {
        self.attempts_made += 1;
        self.attempts_made
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn has_remaining(&self) -> bool {
        self.attempts_made < self.max_attempts
    }

    /// Delay before the next attempt.
    pub fn next_delay(&self) -> Duration {
        self.backoff.delay(self.attempts_made)
    }
}

/// Retry policy of one resource.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    retry_on_timeout: bool,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: if config.enabled { config.max_attempts.max(1) } else { 1 },
            backoff: Backoff::from_config(config),
            retry_on_timeout: config.retry_on_timeout,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn budget(&self) -> RetryBudget {
        RetryBudget::new(self.max_attempts, self.backoff)
    }

    fn should_retry<E, R>(&self, error: &ResilienceError<E>, retry_if: &R) -> bool
    where
        R: Fn(&E) -> bool,
    {
        match error {
            ResilienceError::Operation(e) => retry_if(e),
            ResilienceError::Timeout(_) => self.retry_on_timeout,
            _ => false,
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the budget is spent.
    ///
    /// When more than one attempt was allowed and all were used, the last
    /// error is wrapped in `RetriesExhausted`.
    pub async fn execute<T, E, O, R>(
        &self,
        operation: &O,
        limiter: &TimeLimiter,
        retry_if: &R,
        events: &EventEmitter,
    ) -> Result<T, ResilienceError<E>>
    where
        O: Operation<T, E> + ?Sized,
        R: Fn(&E) -> bool,
        E: fmt::Display,
    {
        let mut budget = self.budget();

        loop {
            let attempt = budget.start_attempt();
            events.emit_attempt(EventType::Attempt, attempt, None);

            let started = Instant::now();
            let error = match limiter.run(operation, CancellationToken::new()).await {
                Ok(value) => {
                    events.emit_attempt(EventType::Success, attempt, Some(started.elapsed()));
                    return Ok(value);
                }
                Err(error) => error,
            };

            let kind = if error.is_timeout() { EventType::Timeout } else { EventType::Failure };
            events.emit_attempt(kind, attempt, Some(started.elapsed()));

            if !self.should_retry(&error, retry_if) {
                tracing::debug!(resource = events.resource(), attempt, error = %error, "Error is not retryable");
                return Err(error);
            }

            if !budget.has_remaining() {
                if self.max_attempts == 1 {
                    return Err(error);
                }
                tracing::warn!(resource = events.resource(), attempts = attempt, error = %error, "Retries exhausted");
                return Err(ResilienceError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let delay = budget.next_delay();
            events.emit_attempt(EventType::Retry, attempt, None);
            tracing::info!(resource = events.resource(), attempt, delay = ?delay, error = %error, "Retrying operation");
            tokio::time::sleep(delay).await;
        }
    }
}
