//! Structured resilience events.
//!
//! # Responsibilities
//! - Define the event vocabulary emitted by the executor
//! - Fan events out to registered listeners
//!
//! # Design Decisions
//! - Emission is one-way: listeners cannot influence the call
//! - Events are emitted outside every policy lock

use std::sync::Arc;
use std::time::{Duration, SystemTime};
use serde::Serialize;

use crate::observability::metrics;
use crate::resilience::circuit_breaker::{CircuitState, Transition};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Attempt,
    Success,
    Failure,
    Timeout,
    Retry,
    CircuitOpen,
    CircuitHalfOpen,
    CircuitClosed,
    /// The breaker refused a call (Open, or Half-Open with no trial left).
    CallNotPermitted,
    RateRejected,
    FallbackInvoked,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Attempt => "attempt",
            EventType::Success => "success",
            EventType::Failure => "failure",
            EventType::Timeout => "timeout",
            EventType::Retry => "retry",
            EventType::CircuitOpen => "circuit_open",
            EventType::CircuitHalfOpen => "circuit_half_open",
            EventType::CircuitClosed => "circuit_closed",
            EventType::CallNotPermitted => "call_not_permitted",
            EventType::RateRejected => "rate_rejected",
            EventType::FallbackInvoked => "fallback_invoked",
        }
    }

    /// Event announcing that the breaker entered `state`.
    pub fn for_state(state: CircuitState) -> Self {
        match state {
            CircuitState::Open => EventType::CircuitOpen,
            CircuitState::HalfOpen => EventType::CircuitHalfOpen,
            CircuitState::Closed => EventType::CircuitClosed,
        }
    }
}

/// One emitted event.
#[derive(Debug, Clone, Serialize)]
pub struct ResilienceEvent {
    pub resource: String,
    pub event_type: EventType,
    pub timestamp: SystemTime,
    /// 1-based attempt number for per-attempt events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    /// Attempt duration for success, failure and timeout events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

/// Consumer of resilience events.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &ResilienceEvent);
}

impl<F> EventListener for F
where
    F: Fn(&ResilienceEvent) + Send + Sync,
{
    fn on_event(&self, event: &ResilienceEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl EventListener for NoopListener {
    fn on_event(&self, _event: &ResilienceEvent) {}
}

/// Logs events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl EventListener for TracingListener {
    fn on_event(&self, event: &ResilienceEvent) {
        let resource = event.resource.as_str();
        let kind = event.event_type.as_str();
        match event.event_type {
            EventType::Attempt | EventType::Success => {
                tracing::trace!(resource, event = kind, attempt = ?event.attempt, elapsed_ms = ?event.elapsed_ms, "Resilience event");
            }
            EventType::Failure | EventType::Timeout | EventType::Retry => {
                tracing::debug!(resource, event = kind, attempt = ?event.attempt, elapsed_ms = ?event.elapsed_ms, "Resilience event");
            }
            EventType::CircuitOpen | EventType::RateRejected | EventType::CallNotPermitted => {
                tracing::warn!(resource, event = kind, "Resilience event");
            }
            EventType::CircuitHalfOpen | EventType::CircuitClosed | EventType::FallbackInvoked => {
                tracing::info!(resource, event = kind, "Resilience event");
            }
        }
    }
}

/// Records events as Prometheus metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsListener;

impl EventListener for MetricsListener {
    fn on_event(&self, event: &ResilienceEvent) {
        metrics::record_event(&event.resource, event.event_type);
        if let Some(ms) = event.elapsed_ms {
            metrics::record_attempt_duration(&event.resource, event.event_type, Duration::from_millis(ms));
        }
        if let Some(state) = match event.event_type {
            EventType::CircuitOpen => Some(CircuitState::Open),
            EventType::CircuitHalfOpen => Some(CircuitState::HalfOpen),
            EventType::CircuitClosed => Some(CircuitState::Closed),
            _ => None,
        } {
            metrics::record_circuit_state(&event.resource, state);
        }
    }
}

/// Fans events out to several listeners, in registration order.
#[derive(Default, Clone)]
pub struct ListenerSet {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl EventListener for ListenerSet {
    fn on_event(&self, event: &ResilienceEvent) {
        for listener in &self.listeners {
            listener.on_event(event);
        }
    }
}

/// Emits events for one resource.
#[derive(Clone)]
pub struct EventEmitter {
    resource: Arc<str>,
    listener: Arc<dyn EventListener>,
}

impl EventEmitter {
    pub fn new(resource: &str, listener: Arc<dyn EventListener>) -> Self {
        Self {
            resource: Arc::from(resource),
            listener,
        }
    }

    /// An emitter whose events go nowhere.
    pub fn noop(resource: &str) -> Self {
        Self::new(resource, Arc::new(NoopListener))
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn emit(&self, event_type: EventType) {
        self.send(event_type, None, None);
    }

    pub fn emit_attempt(&self, event_type: EventType, attempt: u32, elapsed: Option<Duration>) {
        self.send(event_type, Some(attempt), elapsed);
    }

    pub fn emit_transition(&self, transition: Transition) {
        self.emit(EventType::for_state(transition.to));
    }

    fn send(&self, event_type: EventType, attempt: Option<u32>, elapsed: Option<Duration>) {
        let event = ResilienceEvent {
            resource: self.resource.to_string(),
            event_type,
            timestamp: SystemTime::now(),
            attempt,
            elapsed_ms: elapsed.map(|d| d.as_millis() as u64),
        };
        self.listener.on_event(&event);
    }
}
