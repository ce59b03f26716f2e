use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Sliding-window admission gate shared by every call on one client.
///
/// At most `max_requests` acquisitions complete within any trailing window of
/// length `window`. When the window is full the caller waits until the oldest
/// counted admission ages out. Waiters queue on a fair mutex, so admission is
/// granted in the order `acquire` was called.
///
/// A granted admission is never handed back, even if the caller is later
/// cancelled. A limiter built with zero requests or a zero window admits
/// everything immediately.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_requests` per `window`.
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let max_requests = usize::try_from(max_requests).unwrap_or(usize::MAX);
        Self {
            max_requests,
            window,
            admitted: Mutex::new(VecDeque::with_capacity(max_requests.min(1024))),
        }
    }

    /// A limiter that never waits.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Whether this limiter ever makes callers wait.
    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        self.max_requests == 0 || self.window.is_zero()
    }

    /// Admissions allowed per window.
    #[must_use]
    pub const fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// The window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Waits until admission is granted. Never fails.
    pub async fn acquire(&self) {
        if self.is_unlimited() {
            return;
        }

        // The lock is held across the wait: later callers queue behind it in FIFO order.
        let mut admitted = self.admitted.lock().await;
        loop {
            let now = Instant::now();
            while admitted
                .front()
                .is_some_and(|&oldest| now.duration_since(oldest) >= self.window)
            {
                admitted.pop_front();
            }

            if admitted.len() < self.max_requests {
                admitted.push_back(now);
                return;
            }

            if let Some(&oldest) = admitted.front() {
                let ready_at = oldest + self.window;
                trace_event!(
                    debug,
                    wait = ?ready_at.saturating_duration_since(now),
                    "rate limit window saturated"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
    }
}
