//! End-to-end tests of the policy composition.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use resilience_engine::config::{
    CircuitBreakerConfig, RateLimitConfig, ResourcePolicy, RetryConfig, TimeLimitConfig,
};
use resilience_engine::observability::EventType;
use resilience_engine::resilience::{blocking, CircuitState, Executor, Outcome, ResilienceError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

mod common;
use common::{CallCounter, EventLog};

fn no_rate_limit() -> RateLimitConfig {
    RateLimitConfig {
        enabled: false,
        ..RateLimitConfig::default()
    }
}

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        backoff_base_ms: 10,
        backoff_max_ms: 100,
        jitter: 0.0,
        ..RetryConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_and_fallback_serves_rejections() {
    let log = EventLog::new();
    let executor = Executor::default().with_listener(log.listener());
    executor
        .register(
            "svc",
            ResourcePolicy {
                retry: fast_retry(2),
                circuit_breaker: CircuitBreakerConfig {
                    failure_rate_threshold: 50.0,
                    minimum_samples: 4,
                    window_size: 4,
                    ..CircuitBreakerConfig::default()
                },
                ..ResourcePolicy::default()
            },
        )
        .unwrap();
    executor.register_fallback("svc", |_: &ResilienceError<String>| "X".to_string());
    let counter = CallCounter::new();

    for call in 1..=4u32 {
        let outcome = executor.call("svc", common::always_failing(&counter, "down")).await;

        assert_eq!(counter.get(), call * 2, "call {} should make two attempts", call);
        match outcome {
            Outcome::Fallback { value, cause: ResilienceError::RetriesExhausted { attempts, .. } } => {
                assert_eq!(value, "X");
                assert_eq!(attempts, 2);
            }
            other => panic!("call {}: unexpected outcome {:?}", call, other),
        }
    }

    let state = executor.registry().get("svc").unwrap();
    assert_eq!(state.circuit_breaker().state(), CircuitState::Open);

    let outcome = executor.call("svc", common::always_failing(&counter, "down")).await;

    assert_eq!(counter.get(), 8, "open circuit must not invoke the operation");
    assert!(matches!(
        outcome,
        Outcome::Fallback { ref value, cause: ResilienceError::CircuitOpen { .. } } if value == "X"
    ));
    assert_eq!(log.count(EventType::CircuitOpen), 1);
    assert_eq!(log.count(EventType::CallNotPermitted), 1);
    assert_eq!(log.count(EventType::FallbackInvoked), 5);
    assert_eq!(log.count(EventType::Attempt), 8);
}

#[tokio::test(start_paused = true)]
async fn test_open_circuit_recovers_after_wait() {
    let log = EventLog::new();
    let executor = Executor::default().with_listener(log.listener());
    executor
        .register(
            "svc",
            ResourcePolicy {
                rate_limit: no_rate_limit(),
                retry: fast_retry(1),
                circuit_breaker: CircuitBreakerConfig {
                    minimum_samples: 2,
                    window_size: 2,
                    wait_open_ms: 1000,
                    permitted_calls_half_open: 1,
                    ..CircuitBreakerConfig::default()
                },
                ..ResourcePolicy::default()
            },
        )
        .unwrap();
    let counter = CallCounter::new();

    for _ in 0..2 {
        let _ = executor.call("svc", common::always_failing(&counter, "down")).await;
    }
    assert_eq!(counter.get(), 2);

    // Still open just before the wait elapses.
    tokio::time::advance(Duration::from_millis(999)).await;
    let outcome = executor.call("svc", common::slow(&counter, Duration::ZERO, "ok")).await;
    assert!(matches!(outcome, Outcome::Failure(ResilienceError::CircuitOpen { .. })));
    assert_eq!(counter.get(), 2);

    tokio::time::advance(Duration::from_millis(1)).await;
    let outcome = executor.call("svc", common::slow(&counter, Duration::ZERO, "ok")).await;

    assert_eq!(outcome.into_result().unwrap(), "ok");
    assert_eq!(counter.get(), 3);
    let state = executor.registry().get("svc").unwrap();
    assert_eq!(state.circuit_breaker().state(), CircuitState::Closed);
    assert_eq!(
        log.types()
            .into_iter()
            .filter(|t| matches!(t, EventType::CircuitOpen | EventType::CircuitHalfOpen | EventType::CircuitClosed))
            .collect::<Vec<_>>(),
        vec![EventType::CircuitOpen, EventType::CircuitHalfOpen, EventType::CircuitClosed]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_rejects_then_recovers() {
    let executor = Executor::default();
    executor
        .register(
            "svc",
            ResourcePolicy {
                rate_limit: RateLimitConfig {
                    permits: 2,
                    window_ms: 1000,
                    ..RateLimitConfig::default()
                },
                ..ResourcePolicy::default()
            },
        )
        .unwrap();
    let counter = CallCounter::new();

    let mut results = Vec::new();
    for _ in 0..4 {
        results.push(executor.call("svc", common::slow(&counter, Duration::ZERO, "ok")).await);
    }

    assert!(results[0].is_success() && results[1].is_success());
    for rejected in &results[2..] {
        assert!(matches!(rejected, Outcome::Failure(ResilienceError::RateLimited { .. })));
    }
    assert_eq!(counter.get(), 2);

    tokio::time::advance(Duration::from_millis(1000)).await;
    let outcome = executor.call("svc", common::slow(&counter, Duration::ZERO, "ok")).await;
    assert!(outcome.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_resources_are_isolated() {
    let policy = ResourcePolicy {
        rate_limit: RateLimitConfig {
            permits: 2,
            window_ms: 60_000,
            ..RateLimitConfig::default()
        },
        ..ResourcePolicy::default()
    };
    let executor = Executor::new(resilience_engine::resilience::ResourceRegistry::new(policy));
    let counter = CallCounter::new();

    for _ in 0..5 {
        let _ = executor.call("a", common::slow(&counter, Duration::ZERO, "ok")).await;
    }

    let a = executor.registry().get("a").unwrap();
    let b = executor.registry().resolve("b");
    assert_eq!(a.rate_limiter().available_permits(), 0);
    assert_eq!(b.rate_limiter().available_permits(), 2);

    let outcome = executor.call("b", common::slow(&counter, Duration::ZERO, "ok")).await;
    assert!(outcome.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_times_out_slow_operation() {
    let executor = Executor::default();
    executor
        .register(
            "svc",
            ResourcePolicy {
                time_limit: TimeLimitConfig {
                    enabled: true,
                    timeout_ms: 100,
                },
                retry: fast_retry(1),
                ..ResourcePolicy::default()
            },
        )
        .unwrap();
    let counter = CallCounter::new();

    let start = Instant::now();
    let outcome = executor
        .call("svc", common::slow(&counter, Duration::from_millis(500), "late"))
        .await;
    let elapsed = start.elapsed();

    assert!(matches!(outcome, Outcome::Failure(ResilienceError::Timeout(d)) if d == Duration::from_millis(100)));
    assert!(elapsed >= Duration::from_millis(100) && elapsed < Duration::from_millis(110));
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_attempt_is_cancelled() {
    let executor = Executor::default();
    executor
        .register(
            "svc",
            ResourcePolicy {
                time_limit: TimeLimitConfig {
                    enabled: true,
                    timeout_ms: 100,
                },
                retry: fast_retry(1),
                ..ResourcePolicy::default()
            },
        )
        .unwrap();
    let seen: Arc<Mutex<Option<CancellationToken>>> = Arc::new(Mutex::new(None));
    let sink = seen.clone();

    let outcome = executor
        .call("svc", move |cancel: CancellationToken| {
            *sink.lock().unwrap() = Some(cancel.clone());
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, String>(())
            }
        })
        .await;

    assert!(matches!(outcome, Outcome::Failure(ResilienceError::Timeout(_))));
    let token = seen.lock().unwrap().take().unwrap();
    assert!(token.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_share_rate_window() {
    let executor = Arc::new(Executor::default());
    executor
        .register(
            "svc",
            ResourcePolicy {
                rate_limit: RateLimitConfig {
                    permits: 10,
                    window_ms: 60_000,
                    ..RateLimitConfig::default()
                },
                ..ResourcePolicy::default()
            },
        )
        .unwrap();
    let counter = CallCounter::new();

    let mut handles = Vec::new();
    for _ in 0..25 {
        let executor = executor.clone();
        let op = common::slow(&counter, Duration::from_millis(5), "ok");
        handles.push(tokio::spawn(async move { executor.call("svc", op).await }));
    }

    let mut admitted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Outcome::Success(_) => admitted += 1,
            Outcome::Failure(ResilienceError::RateLimited { .. }) => rejected += 1,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    assert_eq!(admitted, 10);
    assert_eq!(rejected, 15);
    assert_eq!(counter.get(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_breaker_state_is_consistent_across_threads() {
    let executor = Arc::new(Executor::default());
    let state = executor
        .register(
            "svc",
            ResourcePolicy {
                rate_limit: no_rate_limit(),
                retry: fast_retry(1),
                circuit_breaker: CircuitBreakerConfig {
                    minimum_samples: 10,
                    window_size: 10,
                    wait_open_ms: 60_000,
                    ..CircuitBreakerConfig::default()
                },
                ..ResourcePolicy::default()
            },
        )
        .unwrap();
    let counter = CallCounter::new();

    let mut handles = Vec::new();
    for _ in 0..64 {
        let executor = executor.clone();
        let op = common::always_failing(&counter, "down");
        handles.push(tokio::spawn(async move { executor.call("svc", op).await }));
    }
    let mut not_permitted = 0;
    for handle in handles {
        if let Outcome::Failure(ResilienceError::CircuitOpen { .. }) = handle.await.unwrap() {
            not_permitted += 1;
        }
    }

    assert_eq!(state.circuit_breaker().state(), CircuitState::Open);
    assert_eq!(counter.get() + not_permitted, 64);
    assert!(counter.get() >= 10);
}

#[tokio::test]
async fn test_blocking_operation_runs_through_executor() {
    let executor = Executor::default();

    let outcome = executor
        .call("svc", blocking(|cancel: &CancellationToken| {
            if cancel.is_cancelled() {
                return Err("cancelled".to_string());
            }
            Ok(7u32)
        }))
        .await;

    assert_eq!(outcome.into_result().unwrap(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_call_types_share_breaker_with_own_fallbacks() {
    let executor = Executor::default();
    let state = executor
        .register(
            "product-api",
            ResourcePolicy {
                retry: fast_retry(1),
                circuit_breaker: CircuitBreakerConfig {
                    minimum_samples: 3,
                    window_size: 3,
                    ..CircuitBreakerConfig::default()
                },
                ..ResourcePolicy::default()
            },
        )
        .unwrap();
    executor.register_fallback("product-api", |_: &ResilienceError<String>| vec!["Fallback Product".to_string()]);
    executor.register_fallback("product-api", |_: &ResilienceError<String>| "Fallback Product".to_string());
    let counter = CallCounter::new();

    let list = executor
        .call("product-api", common::failing::<Vec<String>>(&counter, "down"))
        .await;
    let single = executor.call("product-api", common::always_failing(&counter, "down")).await;

    let id = "42".to_string();
    let by_id = executor
        .call_with_fallback("product-api", common::always_failing(&counter, "down"), move |_| {
            format!("Fallback Product {}", id)
        })
        .await;

    assert!(matches!(list, Outcome::Fallback { ref value, .. } if value == &vec!["Fallback Product".to_string()]));
    assert!(matches!(single, Outcome::Fallback { ref value, .. } if value == "Fallback Product"));
    assert!(matches!(by_id, Outcome::Fallback { ref value, .. } if value == "Fallback Product 42"));

    // All three calls counted against the one breaker.
    assert_eq!(counter.get(), 3);
    assert_eq!(state.circuit_breaker().state(), CircuitState::Open);
}
