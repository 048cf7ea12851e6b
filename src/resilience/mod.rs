//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call for resource R:
//!     → rate_limit.rs (fixed-window admission)
//!     → circuit_breaker.rs (fail fast while the dependency is down)
//!     → retries.rs (bounded attempts with backoff)
//!         → timeouts.rs (deadline + cancellation per attempt)
//!     → fallback.rs (substitute value on terminal failure)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - State is per resource, held in an explicit registry (no globals)
//! - Only operation errors and timeouts are retried
//! - executor.rs is the only place that knows the composition order

pub mod backoff;
pub mod circuit_breaker;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod operation;
pub mod outcome;
pub mod rate_limit;
pub mod registry;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use error::{ErrorKind, ResilienceError};
pub use executor::Executor;
pub use fallback::{FallbackFn, FallbackResolver};
pub use operation::{blocking, BlockingError, Operation};
pub use outcome::{Outcome, Provenance};
pub use rate_limit::RateLimiter;
pub use registry::{ResourceRegistry, ResourceState, ResourceStatus};
pub use retries::{RetryBudget, RetryPolicy};
pub use timeouts::TimeLimiter;
