//! Fallback resolution.
//!
//! Fallbacks are registered per resource and per call type: one resource
//! can serve calls returning different `Result<T, E>` types (a product list
//! and a single product, say), each with its own fallback, while sharing
//! one breaker and limiter.

use std::any::{Any, TypeId};
use std::sync::Arc;
use dashmap::DashMap;

use crate::resilience::error::ResilienceError;

/// A value-producing function invoked with the error that made it necessary.
pub type FallbackFn<T, E> = Arc<dyn Fn(&ResilienceError<E>) -> T + Send + Sync>;

type FallbackKey = (String, TypeId);

fn key<T: 'static, E: 'static>(resource: &str) -> FallbackKey {
    (resource.to_string(), TypeId::of::<(T, E)>())
}

/// Fallbacks keyed by resource name and call type.
#[derive(Default)]
pub struct FallbackResolver {
    fallbacks: DashMap<FallbackKey, Box<dyn Any + Send + Sync>>,
}

impl FallbackResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the fallback for `Result<T, E>` calls on
    /// `resource`. Fallbacks of other call types are left alone.
    pub fn register<T, E, F>(&self, resource: &str, fallback: F)
    where
        F: Fn(&ResilienceError<E>) -> T + Send + Sync + 'static,
        T: 'static,
        E: 'static,
    {
        let fallback: FallbackFn<T, E> = Arc::new(fallback);
        if self.fallbacks.insert(key::<T, E>(resource), Box::new(fallback)).is_some() {
            tracing::debug!(resource, "Replaced fallback");
        }
    }

    /// Register a fallback that always returns a clone of `value`.
    pub fn register_value<T, E>(&self, resource: &str, value: T)
    where
        T: Clone + Send + Sync + 'static,
        E: 'static,
    {
        self.register::<T, E, _>(resource, move |_| value.clone());
    }

    /// Whether `resource` has a fallback for `Result<T, E>` calls.
    pub fn contains<T: 'static, E: 'static>(&self, resource: &str) -> bool {
        self.fallbacks.contains_key(&key::<T, E>(resource))
    }

    /// Produce a substitute value for a failed call, if a fallback for its
    /// type is registered.
    pub fn resolve<T, E>(&self, resource: &str, cause: &ResilienceError<E>) -> Option<T>
    where
        T: 'static,
        E: 'static,
    {
        // Clone the function out so the map shard is not locked while it runs.
        let fallback = {
            let entry = self.fallbacks.get(&key::<T, E>(resource))?;
            match entry.downcast_ref::<FallbackFn<T, E>>() {
                Some(fallback) => Arc::clone(fallback),
                None => {
                    tracing::error!(resource, "Fallback stored under the wrong call type");
                    return None;
                }
            }
        };
        Some(fallback(cause))
    }
}
