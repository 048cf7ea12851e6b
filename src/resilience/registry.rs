//! Resource registry.
//!
//! # Responsibilities
//! - Hold the policy instances of every resource, keyed by name
//! - Create resources on first use from the default policy
//! - Report per-resource status
//!
//! # Design Decisions
//! - Registration is get-or-create; an existing resource is never rebuilt
//!   so concurrent callers always share one set of limiter/breaker state
//! - The map lock only covers lookup; each policy instance guards its own
//!   state, so resources never contend with each other

use std::sync::Arc;
use dashmap::DashMap;
use serde::Serialize;

use crate::config::validation::validate_policy;
use crate::config::{ConfigError, EngineConfig, ResourcePolicy};
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker};
use crate::resilience::rate_limit::RateLimiter;
use crate::resilience::retries::RetryPolicy;
use crate::resilience::timeouts::TimeLimiter;

/// Live policy instances of one resource.
pub struct ResourceState {
    name: String,
    policy: ResourcePolicy,
    rate_limiter: RateLimiter,
    time_limiter: TimeLimiter,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl ResourceState {
    pub fn new(name: &str, policy: ResourcePolicy) -> Self {
        Self {
            name: name.to_string(),
            rate_limiter: RateLimiter::new(&policy.rate_limit),
            time_limiter: TimeLimiter::new(&policy.time_limit),
            retry: RetryPolicy::new(&policy.retry),
            breaker: CircuitBreaker::new(policy.circuit_breaker.clone()),
            policy,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &ResourcePolicy {
        &self.policy
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn time_limiter(&self) -> &TimeLimiter {
        &self.time_limiter
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn status(&self) -> ResourceStatus {
        ResourceStatus {
            name: self.name.clone(),
            available_permits: self.rate_limiter.available_permits(),
            circuit: self.breaker.snapshot(),
        }
    }
}

/// Serializable status of one resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceStatus {
    pub name: String,
    pub available_permits: u32,
    pub circuit: BreakerSnapshot,
}

/// All resources known to an executor.
pub struct ResourceRegistry {
    defaults: ResourcePolicy,
    resources: DashMap<String, Arc<ResourceState>>,
}

impl ResourceRegistry {
    /// An empty registry whose implicit resources use `defaults`.
    pub fn new(defaults: ResourcePolicy) -> Self {
        Self {
            defaults,
            resources: DashMap::new(),
        }
    }

    /// Build a registry with every resource declared in `config`.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        validate_policy("defaults", &config.defaults).map_err(ConfigError::Validation)?;

        let registry = Self::new(config.defaults.clone());
        for resource in &config.resources {
            registry.register(&resource.name, resource.policy.clone())?;
        }
        Ok(registry)
    }

    pub fn defaults(&self) -> &ResourcePolicy {
        &self.defaults
    }

    /// Register `name` with an explicit policy.
    ///
    /// If the resource already exists its live state is kept and returned;
    /// the new policy is ignored.
    pub fn register(&self, name: &str, policy: ResourcePolicy) -> Result<Arc<ResourceState>, ConfigError> {
        validate_policy(name, &policy).map_err(ConfigError::Validation)?;

        let entry = self.resources.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(resource = name, "Registered resource");
            Arc::new(ResourceState::new(name, policy.clone()))
        });
        if entry.value().policy != policy {
            tracing::warn!(resource = name, "Resource already registered; keeping existing policy");
        }
        Ok(Arc::clone(entry.value()))
    }

    /// Look up `name`, creating it from the default policy on first use.
    pub fn resolve(&self, name: &str) -> Arc<ResourceState> {
        if let Some(state) = self.resources.get(name) {
            return Arc::clone(state.value());
        }

        let entry = self.resources.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(resource = name, "Created resource from default policy");
            Arc::new(ResourceState::new(name, self.defaults.clone()))
        });
        Arc::clone(entry.value())
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResourceState>> {
        self.resources.get(name).map(|state| Arc::clone(state.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Status of every resource, sorted by name.
    pub fn statuses(&self) -> Vec<ResourceStatus> {
        let mut statuses: Vec<ResourceStatus> =
            self.resources.iter().map(|entry| entry.value().status()).collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new(ResourcePolicy::default())
    }
}
