//! Result surface returned to callers.

use crate::resilience::error::ResilienceError;

/// Where an outcome's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Operation,
    Fallback,
}

/// Final outcome of one executor call.
///
/// A `Fallback` is a successful substitute: [`Outcome::into_result`] turns it
/// into `Ok`. Callers that care where the value came from match on the
/// variant or check [`Outcome::provenance`].
#[derive(Debug)]
pub enum Outcome<T, E> {
    /// The operation produced the value.
    Success(T),
    /// The registered fallback produced the value after `cause`.
    Fallback { value: T, cause: ResilienceError<E> },
    /// No value could be produced.
    Failure(ResilienceError<E>),
}

impl<T, E> Outcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Outcome::Fallback { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// `None` for failures.
    pub fn provenance(&self) -> Option<Provenance> {
        match self {
            Outcome::Success(_) => Some(Provenance::Operation),
            Outcome::Fallback { .. } => Some(Provenance::Fallback),
            Outcome::Failure(_) => None,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) | Outcome::Fallback { value, .. } => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    /// The error behind a fallback or failure.
    pub fn error(&self) -> Option<&ResilienceError<E>> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Fallback { cause, .. } => Some(cause),
            Outcome::Failure(error) => Some(error),
        }
    }

    /// Collapse to a `Result`, treating fallbacks as success.
    pub fn into_result(self) -> Result<T, ResilienceError<E>> {
        match self {
            Outcome::Success(value) | Outcome::Fallback { value, .. } => Ok(value),
            Outcome::Failure(error) => Err(error),
        }
    }
}
