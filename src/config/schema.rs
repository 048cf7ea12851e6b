//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Root configuration for the resilience engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Policy applied to resources that are used without being registered.
    pub defaults: ResourcePolicy,

    /// Resource definitions, one per protected dependency.
    pub resources: Vec<ResourceConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// A named resource and the policy protecting it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceConfig {
    /// Resource identifier (e.g., "product-api"). Keys all policy state.
    pub name: String,

    #[serde(flatten)]
    pub policy: ResourcePolicy,
}

/// The four policy sections applied to one resource.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ResourcePolicy {
    /// Admission control.
    pub rate_limit: RateLimitConfig,

    /// Per-attempt deadline.
    pub time_limit: TimeLimitConfig,

    /// Retry with backoff.
    pub retry: RetryConfig,

    /// Failure-rate circuit breaker.
    pub circuit_breaker: CircuitBreakerConfig,
}

/// Rate limiting configuration (fixed window).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Calls admitted per window.
    pub permits: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            permits: 10,
            window_ms: 1000,
        }
    }
}

/// Time limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeLimitConfig {
    /// Enable the per-attempt deadline.
    pub enabled: bool,

    /// Deadline for one attempt in milliseconds.
    pub timeout_ms: u64,
}

impl TimeLimitConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for TimeLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 2000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries. When disabled every call makes exactly one attempt.
    pub enabled: bool,

    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub backoff_base_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub backoff_max_ms: u64,

    /// Jitter as a fraction of the delay (0.1 adds up to 10%).
    pub jitter: f64,

    /// Whether a timed-out attempt is retried.
    pub retry_on_timeout: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 5000,
            jitter: 0.1,
            retry_on_timeout: true,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Enable the circuit breaker.
    pub enabled: bool,

    /// Failure percentage (0-100] at or above which the circuit opens.
    pub failure_rate_threshold: f64,

    /// Samples required before the failure rate is evaluated.
    pub minimum_samples: usize,

    /// Size of the sliding window of recorded outcomes.
    pub window_size: usize,

    /// Time spent open before trial calls are allowed, in milliseconds.
    pub wait_open_ms: u64,

    /// Trial calls admitted while half-open.
    pub permitted_calls_half_open: u32,
}

impl CircuitBreakerConfig {
    pub fn wait_open(&self) -> Duration {
        Duration::from_millis(self.wait_open_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_rate_threshold: 50.0,
            minimum_samples: 5,
            window_size: 10,
            wait_open_ms: 10_000,
            permitted_calls_half_open: 3,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
