//! Error taxonomy of the engine.

use std::fmt;
use std::time::Duration;

/// Errors produced while executing an operation under a resource's policy.
///
/// `E` is the error type of the wrapped operation.
#[derive(Debug)]
pub enum ResilienceError<E> {
    /// The operation itself failed.
    Operation(E),

    /// The attempt did not finish before its deadline.
    Timeout(Duration),

    /// The rate limiter had no permit left in the current window.
    RateLimited { resource: String },

    /// The circuit breaker rejected the call without invoking the operation.
    CircuitOpen { resource: String },

    /// Every allowed attempt failed; `last` is the final attempt's error.
    RetriesExhausted {
        attempts: u32,
        last: Box<ResilienceError<E>>,
    },
}

impl<E: fmt::Display> fmt::Display for ResilienceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operation(e) => write!(f, "operation failed: {}", e),
            Self::Timeout(after) => write!(f, "operation timed out after {:?}", after),
            Self::RateLimited { resource } => {
                write!(f, "rate limit exceeded for resource '{}'", resource)
            }
            Self::CircuitOpen { resource } => {
                write!(f, "circuit breaker is open for resource '{}'", resource)
            }
            Self::RetriesExhausted { attempts, last } => {
                write!(f, "retries exhausted after {} attempts: {}", attempts, last)
            }
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for ResilienceError<E> {}

impl<E> ResilienceError<E> {
    /// Whether the retry policy may re-invoke the operation after this error.
    ///
    /// Admission rejections are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Operation(_) | Self::Timeout(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Whether the call was refused before the operation ran.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::CircuitOpen { .. })
    }

    /// The innermost error, looking through `RetriesExhausted`.
    pub fn root(&self) -> &Self {
        match self {
            Self::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }

    /// The operation's own error, if the failure originated there.
    pub fn operation_error(&self) -> Option<&E> {
        match self.root() {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Stable label used for logs and metrics.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Operation(_) => ErrorKind::Operation,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Self::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
        }
    }
}

/// Payload-free discriminant of [`ResilienceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Operation,
    Timeout,
    RateLimited,
    CircuitOpen,
    RetriesExhausted,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Operation => "operation",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::RetriesExhausted => "retries_exhausted",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
