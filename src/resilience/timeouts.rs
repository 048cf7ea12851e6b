//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap each attempt with a deadline
//! - Cancel the attempt cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from operation errors
//! - The attempt's token is cancelled on timeout and when the caller drops
//!   the call, then the attempt's future is dropped

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::TimeLimitConfig;
use crate::resilience::error::ResilienceError;
use crate::resilience::operation::Operation;

/// Per-attempt deadline.
#[derive(Debug, Clone, Copy)]
pub struct TimeLimiter {
    timeout: Option<Duration>,
}

impl TimeLimiter {
    pub fn new(config: &TimeLimitConfig) -> Self {
        Self {
            timeout: config.enabled.then(|| config.timeout()),
        }
    }

    /// A limiter that never times out.
    pub fn unbounded() -> Self {
        Self { timeout: None }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run one attempt of `operation` under the deadline.
    pub async fn run<T, E, O>(
        &self,
        operation: &O,
        cancel: CancellationToken,
    ) -> Result<T, ResilienceError<E>>
    where
        O: Operation<T, E> + ?Sized,
    {
        let guard = cancel.clone().drop_guard();
        let attempt = operation.invoke(cancel);

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, attempt).await {
                Ok(result) => result.map_err(ResilienceError::Operation),
                // `guard` drops here and cancels the token.
                Err(_) => return Err(ResilienceError::Timeout(limit)),
            },
            None => attempt.await.map_err(ResilienceError::Operation),
        };

        guard.disarm();
        result
    }
}
