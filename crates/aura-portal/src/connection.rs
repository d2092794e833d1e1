//! Backend connection lifecycle.
//!
//! Tracks construction of the backend actor and detects stuck
//! initialization. Each entry into `Connecting` starts a watchdog; if the
//! same attempt is still connecting when the watchdog elapses, `timed_out`
//! is raised. The timeout is advisory: the attempt keeps running, and if it
//! later completes the state returns to `Ready` and `timed_out` clears.
//!
//! ```text
//! Uninitialized ──begin──► Connecting ──ok──► Ready
//!                              │  ▲
//!                          err │  │ retry
//!                              ▼  │
//!                             Failed
//! ```

use crate::errors::{PortalError, Result};
use crate::reactive::{Dynamic, Subscription};
use crate::time::ClockEffects;
use std::future::Future;
use std::sync::Arc;

/// Backend actor construction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No attempt has been made yet
    #[default]
    Uninitialized,
    /// An attempt is in flight
    Connecting,
    /// The backend actor is usable
    Ready,
    /// The last attempt failed
    Failed,
}

/// Point-in-time connection state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    /// Current state
    pub state: ConnectionState,
    /// Set by the watchdog; only meaningful while `Connecting`
    pub timed_out: bool,
    /// Monotonic attempt counter
    pub attempt: u64,
    /// Failure message of the last failed attempt
    pub last_error: Option<String>,
    /// Watchdog limit in milliseconds
    pub timeout_ms: u64,
}

impl ConnectionSnapshot {
    /// Backend actor is usable.
    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// An attempt is in flight.
    pub fn is_fetching(&self) -> bool {
        self.state == ConnectionState::Connecting
    }

    /// The in-flight attempt has exceeded the watchdog limit.
    pub fn has_timed_out(&self) -> bool {
        self.is_fetching() && self.timed_out
    }
}

/// Connection lifecycle shared by every portal component.
#[derive(Clone)]
pub struct ConnectionLifecycle {
    state: Dynamic<ConnectionSnapshot>,
    clock: Arc<dyn ClockEffects>,
    timeout_ms: u64,
}

impl ConnectionLifecycle {
    /// Create a lifecycle with the given watchdog limit.
    pub fn new(clock: Arc<dyn ClockEffects>, timeout_ms: u64) -> Self {
        Self {
            state: Dynamic::new(ConnectionSnapshot {
                timeout_ms,
                ..ConnectionSnapshot::default()
            }),
            clock,
            timeout_ms,
        }
    }

    /// Current state.
    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.state.get()
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> Subscription<ConnectionSnapshot> {
        self.state.subscribe()
    }

    /// Backend actor is usable.
    pub fn is_ready(&self) -> bool {
        self.state.with(ConnectionSnapshot::is_ready)
    }

    /// An attempt is in flight.
    pub fn is_fetching(&self) -> bool {
        self.state.with(ConnectionSnapshot::is_fetching)
    }

    /// The in-flight attempt has exceeded the watchdog limit.
    pub fn has_timed_out(&self) -> bool {
        self.state.with(ConnectionSnapshot::has_timed_out)
    }

    /// Watchdog limit in milliseconds.
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Start the first attempt if none has been made. Returns the current attempt.
    pub fn ensure_started(&self) -> u64 {
        let snapshot = self.snapshot();
        if snapshot.state == ConnectionState::Uninitialized {
            self.begin_connect()
        } else {
            snapshot.attempt
        }
    }

    /// Enter `Connecting` and arm the watchdog.
    ///
    /// An attempt that is connecting and not yet timed out is reused; otherwise
    /// a new attempt is started. Returns the attempt id.
    pub fn begin_connect(&self) -> u64 {
        let started = self.state.modify(|s| {
            if s.state == ConnectionState::Connecting && !s.timed_out {
                return None;
            }
            s.state = ConnectionState::Connecting;
            s.timed_out = false;
            s.last_error = None;
            s.attempt += 1;
            Some(s.attempt)
        });

        match started {
            Some(attempt) => {
                tracing::debug!(attempt, timeout_ms = self.timeout_ms, "connecting to backend");
                self.arm_watchdog(attempt);
                attempt
            }
            None => self.snapshot().attempt,
        }
    }

    /// Mark the current attempt as successful.
    pub fn mark_ready(&self) {
        let attempt = self.snapshot().attempt;
        self.settle(attempt, None);
    }

    /// Mark the current attempt as failed.
    pub fn mark_failed(&self, message: impl Into<String>) {
        let attempt = self.snapshot().attempt;
        self.settle(attempt, Some(message.into()));
    }

    /// Run a connection attempt through the lifecycle.
    ///
    /// The outcome is recorded only if no newer attempt has started meanwhile.
    pub async fn establish<T, F>(&self, connect: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let attempt = self.begin_connect();
        match connect.await {
            Ok(value) => {
                self.settle(attempt, None);
                Ok(value)
            }
            Err(err) => {
                let message = err.raw_message();
                self.settle(attempt, Some(message.clone()));
                Err(PortalError::unreachable(message))
            }
        }
    }

    /// Start a fresh attempt after a failure or timeout.
    pub async fn retry<T, F>(&self, connect: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tracing::info!(previous = ?self.snapshot().state, "retrying backend connection");
        self.establish(connect).await
    }

    fn settle(&self, attempt: u64, failure: Option<String>) {
        let outcome = self.state.modify(|s| {
            if s.attempt != attempt || s.state != ConnectionState::Connecting {
                return None;
            }
            let was_timed_out = s.timed_out;
            s.timed_out = false;
            match &failure {
                None => s.state = ConnectionState::Ready,
                Some(message) => {
                    s.state = ConnectionState::Failed;
                    s.last_error = Some(message.clone());
                }
            }
            Some(was_timed_out)
        });

        match (outcome, failure) {
            (None, _) => tracing::debug!(attempt, "ignoring outcome of superseded connection attempt"),
            (Some(late), None) => tracing::info!(attempt, after_timeout = late, "backend connection ready"),
            (Some(_), Some(message)) => {
                tracing::warn!(attempt, error = %message, "backend connection failed");
            }
        }
    }

    fn arm_watchdog(&self, attempt: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime available, connection watchdog disabled");
            return;
        };

        let state = self.state.clone();
        let clock = self.clock.clone();
        let timeout_ms = self.timeout_ms;
        let deadline = clock.now_ms().saturating_add(timeout_ms);

        handle.spawn(async move {
            loop {
                let now = clock.now_ms();
                if now >= deadline {
                    break;
                }
                clock.sleep_ms(deadline - now).await;
            }

            let still_connecting = state.with(|s| {
                s.attempt == attempt && s.state == ConnectionState::Connecting && !s.timed_out
            });
            if still_connecting {
                state.modify(|s| s.timed_out = true);
                tracing::warn!(attempt, timeout_ms, "backend connection timed out");
            }
        });
    }
}

impl std::fmt::Debug for ConnectionLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLifecycle")
            .field("state", &self.snapshot())
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}
