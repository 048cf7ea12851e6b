//! Policy composition.
//!
//! # Data Flow
//! ```text
//! Executor::call(resource, operation)
//!     → registry.rs (resolve per-resource state)
//!     → rate_limit.rs (admit or reject, never blocks)
//!     → circuit_breaker.rs (acquire a permit or fail fast)
//!     → retries.rs
//!         → timeouts.rs (deadline per attempt)
//!         → operation
//!     → circuit_breaker.rs (record the call's final result)
//!     → fallback.rs (on rejection or terminal failure)
//!     → Outcome
//! ```
//!
//! # Design Decisions
//! - The order is fixed: the breaker sits outside retry, so one call is one
//!   breaker sample regardless of how many attempts it made
//! - Rejections skip retry entirely and go straight to the fallback
//! - Events are emitted after the relevant lock has been released

use std::fmt;
use std::sync::Arc;

use crate::config::{ConfigError, EngineConfig, ResourcePolicy};
use crate::observability::events::{EventEmitter, EventListener, EventType, TracingListener};
use crate::resilience::circuit_breaker::CallResult;
use crate::resilience::error::ResilienceError;
use crate::resilience::fallback::FallbackResolver;
use crate::resilience::operation::Operation;
use crate::resilience::outcome::Outcome;
use crate::resilience::registry::{ResourceRegistry, ResourceState};

/// Runs operations under the policies of named resources.
///
/// An `Executor` is shared by reference (typically in an `Arc`) between all
/// tasks that call the same dependencies.
pub struct Executor {
    registry: ResourceRegistry,
    fallbacks: FallbackResolver,
    listener: Arc<dyn EventListener>,
}

impl Executor {
    /// Create an executor over `registry`. Events are logged via `tracing`.
    pub fn new(registry: ResourceRegistry) -> Self {
        Self {
            registry,
            fallbacks: FallbackResolver::new(),
            listener: Arc::new(TracingListener),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(ResourceRegistry::from_config(config)?))
    }

    /// Replace the event listener.
    pub fn with_listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Register a resource with an explicit policy.
    pub fn register(&self, resource: &str, policy: ResourcePolicy) -> Result<Arc<ResourceState>, ConfigError> {
        self.registry.register(resource, policy)
    }

    /// Register the fallback used for `resource` when a call of type
    /// `Result<T, E>` cannot produce a value.
    pub fn register_fallback<T, E, F>(&self, resource: &str, fallback: F)
    where
        F: Fn(&ResilienceError<E>) -> T + Send + Sync + 'static,
        T: 'static,
        E: 'static,
    {
        self.fallbacks.register(resource, fallback);
    }

    /// Run `operation` under the policies of `resource`, retrying every
    /// operation error.
    pub async fn call<T, E, O>(&self, resource: &str, operation: O) -> Outcome<T, E>
    where
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        O: Operation<T, E>,
    {
        self.call_with(resource, operation, |_: &E| true).await
    }

    /// Like [`Executor::call`], but operation errors are only retried when
    /// `retry_if` returns true.
    pub async fn call_with<T, E, O, R>(&self, resource: &str, operation: O, retry_if: R) -> Outcome<T, E>
    where
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        O: Operation<T, E>,
        R: Fn(&E) -> bool + Send + Sync,
    {
        let events = EventEmitter::new(resource, Arc::clone(&self.listener));
        match self.execute(&events, operation, retry_if).await {
            Ok(value) => Outcome::Success(value),
            Err(error) => self.recover(&events, error),
        }
    }

    /// Like [`Executor::call`], but `fallback` is used for this call instead
    /// of the resource's registered one. It can capture call arguments.
    pub async fn call_with_fallback<T, E, O, F>(&self, resource: &str, operation: O, fallback: F) -> Outcome<T, E>
    where
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        O: Operation<T, E>,
        F: FnOnce(&ResilienceError<E>) -> T + Send,
    {
        let events = EventEmitter::new(resource, Arc::clone(&self.listener));
        match self.execute(&events, operation, |_: &E| true).await {
            Ok(value) => Outcome::Success(value),
            Err(cause) => {
                let value = fallback(&cause);
                events.emit(EventType::FallbackInvoked);
                tracing::debug!(resource, cause = %cause, "Call fallback invoked");
                Outcome::Fallback { value, cause }
            }
        }
    }

    async fn execute<T, E, O, R>(&self, events: &EventEmitter, operation: O, retry_if: R) -> Result<T, ResilienceError<E>>
    where
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        O: Operation<T, E>,
        R: Fn(&E) -> bool + Send + Sync,
    {
        let resource = events.resource();
        let state = self.registry.resolve(resource);

        if !state.rate_limiter().try_acquire() {
            events.emit(EventType::RateRejected);
            tracing::debug!(
                resource,
                reset_in = ?state.rate_limiter().time_until_reset(),
                "Rate limit exceeded"
            );
            return Err(ResilienceError::RateLimited { resource: resource.to_string() });
        }

        let permit = match state.circuit_breaker().try_acquire() {
            Ok((permit, transition)) => {
                if let Some(transition) = transition {
                    events.emit_transition(transition);
                }
                permit
            }
            Err(rejected) => {
                events.emit(EventType::CallNotPermitted);
                tracing::debug!(
                    resource,
                    state = rejected.state.as_str(),
                    retry_after = ?rejected.retry_after,
                    "Circuit breaker rejected call"
                );
                return Err(ResilienceError::CircuitOpen { resource: resource.to_string() });
            }
        };

        let result = state
            .retry_policy()
            .execute(&operation, state.time_limiter(), &retry_if, events)
            .await;

        let call_result = if result.is_ok() { CallResult::Success } else { CallResult::Failure };
        if let Some(transition) = permit.record(call_result) {
            events.emit_transition(transition);
        }
        result
    }

    fn recover<T, E>(&self, events: &EventEmitter, cause: ResilienceError<E>) -> Outcome<T, E>
    where
        T: 'static,
        E: fmt::Display + 'static,
    {
        match self.fallbacks.resolve::<T, E>(events.resource(), &cause) {
            Some(value) => {
                events.emit(EventType::FallbackInvoked);
                tracing::debug!(resource = events.resource(), cause = %cause, "Fallback invoked");
                Outcome::Fallback { value, cause }
            }
            None => Outcome::Failure(cause),
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(ResourceRegistry::default())
    }
}
