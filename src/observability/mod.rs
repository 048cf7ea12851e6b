//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Executor decisions:
//!     → events.rs (ResilienceEvent via EventEmitter)
//!     → EventListener implementations:
//!         TracingListener → logging.rs subscriber
//!         MetricsListener → metrics.rs (counters, gauges, histograms)
//!         caller-supplied listeners
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Events never feed back into control flow
//! - Metrics are cheap (atomic increments)

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{
    EventEmitter, EventListener, EventType, ListenerSet, MetricsListener, NoopListener,
    ResilienceEvent, TracingListener,
};
