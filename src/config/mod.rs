//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!     → ResourceRegistry (one ResourcePolicy per resource name)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a resource's policy is fixed at registration
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CircuitBreakerConfig, EngineConfig, ObservabilityConfig, RateLimitConfig, ResourceConfig,
    ResourcePolicy, RetryConfig, TimeLimitConfig,
};
pub use validation::ValidationError;
