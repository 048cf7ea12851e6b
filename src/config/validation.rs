//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows, timeouts and attempts > 0)
//! - Detect duplicate resource names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::{EngineConfig, ResourcePolicy};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("resource name must not be empty")]
    EmptyName,

    #[error("resource '{0}' is defined more than once")]
    DuplicateResource(String),

    #[error("{scope}: {field} must be greater than zero")]
    Zero { scope: String, field: &'static str },

    #[error("{scope}: backoff_base_ms ({base}) exceeds backoff_max_ms ({max})")]
    BackoffRange { scope: String, base: u64, max: u64 },

    #[error("{scope}: jitter {jitter} is outside [0, 1]")]
    Jitter { scope: String, jitter: f64 },

    #[error("{scope}: failure_rate_threshold {threshold} is outside (0, 100]")]
    Threshold { scope: String, threshold: f64 },

    #[error("{scope}: minimum_samples ({minimum}) exceeds window_size ({window})")]
    SamplesExceedWindow { scope: String, minimum: usize, window: usize },
}

/// Validate a full engine configuration.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_policy("defaults", &config.defaults, &mut errors);

    let mut seen = HashSet::new();
    for resource in &config.resources {
        if resource.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName);
        } else if !seen.insert(resource.name.as_str()) {
            errors.push(ValidationError::DuplicateResource(resource.name.clone()));
        }
        check_policy(&resource.name, &resource.policy, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the policy of a single resource.
pub fn validate_policy(name: &str, policy: &ResourcePolicy) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_policy(name, policy, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// Disabled sections are still range-checked so flipping `enabled` never
// activates a broken policy.
fn check_policy(scope: &str, policy: &ResourcePolicy, errors: &mut Vec<ValidationError>) {
    let zero = |field| ValidationError::Zero { scope: scope.to_string(), field };

    let rate = &policy.rate_limit;
    if rate.permits == 0 {
        errors.push(zero("rate_limit.permits"));
    }
    if rate.window_ms == 0 {
        errors.push(zero("rate_limit.window_ms"));
    }

    if policy.time_limit.timeout_ms == 0 {
        errors.push(zero("time_limit.timeout_ms"));
    }

    let retry = &policy.retry;
    if retry.max_attempts == 0 {
        errors.push(zero("retry.max_attempts"));
    }
    if retry.backoff_base_ms > retry.backoff_max_ms {
        errors.push(ValidationError::BackoffRange {
            scope: scope.to_string(),
            base: retry.backoff_base_ms,
            max: retry.backoff_max_ms,
        });
    }
    if !(0.0..=1.0).contains(&retry.jitter) {
        errors.push(ValidationError::Jitter { scope: scope.to_string(), jitter: retry.jitter });
    }

    let cb = &policy.circuit_breaker;
    if !(cb.failure_rate_threshold > 0.0 && cb.failure_rate_threshold <= 100.0) {
        errors.push(ValidationError::Threshold {
            scope: scope.to_string(),
            threshold: cb.failure_rate_threshold,
        });
    }
    if cb.minimum_samples == 0 {
        errors.push(zero("circuit_breaker.minimum_samples"));
    }
    if cb.window_size == 0 {
        errors.push(zero("circuit_breaker.window_size"));
    } else if cb.minimum_samples > cb.window_size {
        errors.push(ValidationError::SamplesExceedWindow {
            scope: scope.to_string(),
            minimum: cb.minimum_samples,
            window: cb.window_size,
        });
    }
    if cb.permitted_calls_half_open == 0 {
        errors.push(zero("circuit_breaker.permitted_calls_half_open"));
    }
}
