//! Fixed-window rate limiting.
//!
//! # Design Decisions
//! - K permits per window, counted per resource
//! - Never blocks: an exhausted window rejects immediately
//! - Windows roll over lazily inside `try_acquire`, so idle resources cost nothing
//! - No smoothing: a burst straddling a boundary can admit up to 2K calls in
//!   arbitrarily little wall time (K at the end of one window, K at the start
//!   of the next)

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Admitted-call counter for the current window.
#[derive(Debug)]
struct RateWindow {
    started_at: Instant,
    admitted: u32,
}

impl RateWindow {
    fn new(now: Instant) -> Self {
        Self {
            started_at: now,
            admitted: 0,
        }
    }

    /// Advance the window by whole periods if `now` is past its end.
    fn roll(&mut self, now: Instant, period: Duration) {
        let elapsed = now.saturating_duration_since(self.started_at);
        if elapsed < period {
            return;
        }
        // Re-anchor on the boundary at or before `now`; no period count to overflow.
        let into_window = elapsed.as_nanos() % period.as_nanos();
        self.started_at = now - Duration::from_nanos(into_window as u64);
        self.admitted = 0;
    }
}

/// Admission gate for a single resource.
#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    permits: u32,
    period: Duration,
    window: Mutex<RateWindow>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            permits: config.permits,
            period: config.window().max(Duration::from_nanos(1)),
            window: Mutex::new(RateWindow::new(Instant::now())),
        }
    }

    /// Try to take a permit from the current window.
    pub fn try_acquire(&self) -> bool {
        if !self.enabled {
            return true;
        }

        let now = Instant::now();
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        window.roll(now, self.period);

        if window.admitted < self.permits {
            window.admitted += 1;
            true
        } else {
            false
        }
    }

    /// Permits left in the current window.
    pub fn available_permits(&self) -> u32 {
        if !self.enabled {
            return self.permits;
        }
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        window.roll(Instant::now(), self.period);
        self.permits.saturating_sub(window.admitted)
    }

    /// Time until the current window ends.
    pub fn time_until_reset(&self) -> Duration {
        let window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(window.started_at);
        let into_window = Duration::from_nanos((elapsed.as_nanos() % self.period.as_nanos()) as u64);
        self.period - into_window
    }
}
