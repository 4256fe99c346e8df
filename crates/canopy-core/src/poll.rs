//! Delay and retry plumbing shared by the status poll loops.
//!
//! Loops take a [`Sleeper`] so tests drive them without real delays, and a
//! [`RetryBudget`] so every loop is bounded rather than recursive.

use std::time::Duration;

use async_trait::async_trait;

/// Poll interval for deploy and install status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Poll interval while waiting for package-version replication.
pub const REPLICATION_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// The real clock.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Remaining retry allowance for one poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    remaining: u64,
}

impl RetryBudget {
    pub fn new(remaining: u64) -> Self {
        Self { remaining }
    }

    /// Budget for `wait` minutes of polling at `interval`; a negative wait
    /// means poll until terminal.
    pub fn from_wait_minutes(wait: i64, interval: Duration) -> Self {
        if wait < 0 {
            return Self::new(u64::MAX);
        }
        let interval_ms = interval.as_millis().max(1) as u64;
        Self::new((wait as u64 * 60_000) / interval_ms)
    }

    /// Budget covering at least `minutes` of polling (rounded up).
    pub fn covering_minutes(minutes: u64, interval: Duration) -> Self {
        let interval_ms = interval.as_millis().max(1) as u64;
        Self::new((minutes * 60_000).div_ceil(interval_ms))
    }

    /// Spend one retry. Returns false once the budget is exhausted.
    pub fn try_consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(1);
        true
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}
