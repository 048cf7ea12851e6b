//! Resilience execution engine.
//!
//! Wraps calls to unreliable dependencies in rate limiting, timeouts,
//! retries and circuit breaking, with an optional fallback per resource.
//!
//! # Architecture Overview
//!
//! ```text
//!     caller
//!       │  Executor::call("product-api", operation)
//!       ▼
//!  ┌───────────────────────────────────────────────────────────┐
//!  │  resilience                                               │
//!  │  ┌────────────┐   ┌─────────────────┐   ┌──────────────┐  │
//!  │  │ rate_limit │──▶│ circuit_breaker │──▶│   retries    │  │
//!  │  └────────────┘   └─────────────────┘   │ ┌──────────┐ │  │
//!  │        │                  │             │ │ timeouts │─┼──┼──▶ operation
//!  │        │ rejected         │ rejected    │ └──────────┘ │  │
//!  │        ▼                  ▼             └──────┬───────┘  │
//!  │  ┌─────────────────────────────────────────────▼───────┐  │
//!  │  │                 fallback → Outcome                  │  │
//!  │  └─────────────────────────────────────────────────────┘  │
//!  └───────────────────────────────────────────────────────────┘
//!         │ events                         ▲ policies
//!         ▼                                │
//!  observability (tracing, metrics)      config (TOML)
//! ```

pub mod config;
pub mod observability;
pub mod resilience;

pub use config::schema::{EngineConfig, ResourcePolicy};
pub use resilience::{Executor, Operation, Outcome, ResilienceError};
