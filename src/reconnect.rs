//! Reconnect scheduling.
//!
//! After an unexpected close the connection manager asks its
//! [`ReconnectPolicy`] how long to wait before the next attempt. Attempts are
//! counted from 1 and the counter resets on every successful connect. A policy
//! returning `None` stops the manager from retrying; an explicit
//! [`connect`](crate::connection::ConnectionManager::connect) starts over.

use std::fmt::Debug;
use std::time::Duration;

/// Decides the wait before each reconnect attempt.
pub trait ReconnectPolicy: Send + Sync + Debug + 'static {
    /// Delay before attempt number `attempt` (1-based), or `None` to give up.
    fn delay(&self, attempt: u32) -> Option<Duration>;
}

/// Default wait between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// The same delay before every attempt.
///
/// The default (5 s, no cap) never gives up: it guarantees eventual recovery
/// once the server is back, at the cost of retrying forever during an outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Stop after `max_attempts` consecutive failures.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy for FixedDelay {
    fn delay(&self, attempt: u32) -> Option<Duration> {
        within_cap(attempt, self.max_attempts).then_some(self.delay)
    }
}

/// Delays growing geometrically from `initial` up to `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: Option<u32>,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max_delay: Duration) -> Self {
        Self {
            initial,
            multiplier: 2.0,
            max_delay,
            max_attempts: None,
        }
    }

    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Option<Duration> {
        if !within_cap(attempt, self.max_attempts) {
            return None;
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        // Large attempts overflow to infinity; `min` folds that into the cap.
        let capped = secs.min(self.max_delay.as_secs_f64());
        Some(Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay))
    }
}

fn within_cap(attempt: u32, max_attempts: Option<u32>) -> bool {
    max_attempts.is_none_or(|max| attempt <= max)
}
