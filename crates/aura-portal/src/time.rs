//! Physical clock effects.
//!
//! Staleness, retention and the connection watchdog all read time through
//! [`ClockEffects`] so that hosts supply the clock and tests can drive it.
//!
//! - [`SystemClock`]: wall-clock time with tokio sleeps
//! - [`ManualClock`]: a clock that only moves when `advance` is called

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;

/// Physical time source used by the portal.
#[async_trait]
pub trait ClockEffects: Send + Sync {
    /// Current time in milliseconds since the UNIX epoch.
    fn now_ms(&self) -> u64;

    /// Suspend until at least `ms` milliseconds have elapsed on this clock.
    async fn sleep_ms(&self, ms: u64);
}

#[async_trait]
impl<T: ClockEffects + ?Sized> ClockEffects for Arc<T> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    async fn sleep_ms(&self, ms: u64) {
        (**self).sleep_ms(ms).await;
    }
}

/// Wall-clock time backed by the system clock and tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl ClockEffects for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Manually driven clock.
///
/// Sleepers wake when `advance` or `set` moves the clock past their deadline.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<watch::Sender<u64>>,
}

impl ManualClock {
    /// Create a clock starting at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        let (tx, _rx) = watch::channel(start_ms);
        Self { now: Arc::new(tx) }
    }

    /// Move the clock forward by `ms` milliseconds.
    pub fn advance(&self, ms: u64) {
        self.now.send_modify(|now| *now = now.saturating_add(ms));
    }

    /// Jump to an absolute time. Moving backwards is ignored.
    pub fn set(&self, ms: u64) {
        self.now.send_modify(|now| *now = (*now).max(ms));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl ClockEffects for ManualClock {
    fn now_ms(&self) -> u64 {
        *self.now.borrow()
    }

    async fn sleep_ms(&self, ms: u64) {
        let mut rx = self.now.subscribe();
        let deadline = rx.borrow().saturating_add(ms);
        while *rx.borrow_and_update() < deadline {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
