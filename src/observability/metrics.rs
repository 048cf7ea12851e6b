//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define engine metrics (events, attempt latency, breaker state)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-resource metrics
//!
//! # Metrics
//! - `resilience_events_total` (counter): events by resource, event type
//! - `resilience_attempt_duration_seconds` (histogram): attempt latency by outcome
//! - `resilience_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels for resource and event type

use std::net::SocketAddr;
use std::time::Duration;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

use crate::observability::events::EventType;
use crate::resilience::circuit_breaker::CircuitState;

const ATTEMPT_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Install the Prometheus exporter and serve `/metrics` on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full("resilience_attempt_duration_seconds".to_string()),
            ATTEMPT_BUCKETS,
        )?
        .install()?;

    metrics::describe_counter!("resilience_events_total", "Resilience events by resource and type");
    metrics::describe_histogram!(
        "resilience_attempt_duration_seconds",
        metrics::Unit::Seconds,
        "Duration of individual operation attempts"
    );
    metrics::describe_gauge!("resilience_circuit_state", "Circuit state: 0=closed, 1=half-open, 2=open");

    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_event(resource: &str, event: EventType) {
    metrics::counter!(
        "resilience_events_total",
        "resource" => resource.to_string(),
        "event" => event.as_str()
    )
    .increment(1);
}

pub fn record_attempt_duration(resource: &str, outcome: EventType, elapsed: Duration) {
    metrics::histogram!(
        "resilience_attempt_duration_seconds",
        "resource" => resource.to_string(),
        "outcome" => outcome.as_str()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_circuit_state(resource: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    metrics::gauge!("resilience_circuit_state", "resource" => resource.to_string()).set(value);
}
