//! Shared utilities for integration testing.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use resilience_engine::observability::{EventListener, EventType, ResilienceEvent};
use resilience_engine::Operation;
use tokio_util::sync::CancellationToken;

/// Counts how many times an operation was invoked.
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicU32>);

#[allow(dead_code)]
impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// An operation that always fails with `message`.
pub fn always_failing(counter: &CallCounter, message: &'static str) -> impl Operation<String, String> {
    failing(counter, message)
}

/// Like [`always_failing`], for any value type.
pub fn failing<T: Send + 'static>(counter: &CallCounter, message: &'static str) -> impl Operation<T, String> {
    let counter = counter.clone();
    move |_cancel: CancellationToken| {
        counter.next();
        async move { Err::<T, _>(message.to_string()) }
    }
}

/// An operation that succeeds with `value` after `delay`.
#[allow(dead_code)]
pub fn slow(counter: &CallCounter, delay: Duration, value: &'static str) -> impl Operation<String, String> {
    let counter = counter.clone();
    move |_cancel: CancellationToken| {
        counter.next();
        async move {
            tokio::time::sleep(delay).await;
            Ok(value.to_string())
        }
    }
}

/// An operation whose n-th invocation (0-based) is answered by `f(n)`.
#[allow(dead_code)]
pub fn programmable<F, Fut>(counter: &CallCounter, f: F) -> impl Operation<String, String>
where
    F: Fn(u32) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, String>> + Send + 'static,
{
    let counter = counter.clone();
    move |_cancel: CancellationToken| f(counter.next())
}

/// An operation that fails with probability `failure_rate` after a random
/// delay in `latency_ms`.
#[allow(dead_code)]
pub fn flaky(counter: &CallCounter, failure_rate: f64, latency_ms: (u64, u64)) -> impl Operation<String, String> {
    let counter = counter.clone();
    move |cancel: CancellationToken| {
        counter.next();
        let (delay, fails) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(latency_ms.0..=latency_ms.1), rng.gen_bool(failure_rate))
        };
        async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                _ = cancel.cancelled() => return Err("cancelled".to_string()),
            }
            if fails {
                Err("injected failure".to_string())
            } else {
                Ok("product".to_string())
            }
        }
    }
}

/// Listener that keeps every event it sees.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<ResilienceEvent>>>);

#[allow(dead_code)]
impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener(&self) -> Arc<dyn EventListener> {
        Arc::new(self.clone())
    }

    pub fn types(&self) -> Vec<EventType> {
        self.0.lock().unwrap().iter().map(|e| e.event_type).collect()
    }

    pub fn count(&self, event_type: EventType) -> usize {
        self.0.lock().unwrap().iter().filter(|e| e.event_type == event_type).count()
    }

    pub fn for_resource(&self, resource: &str) -> Vec<EventType> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.resource == resource)
            .map(|e| e.event_type)
            .collect()
    }
}

impl EventListener for EventLog {
    fn on_event(&self, event: &ResilienceEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}
