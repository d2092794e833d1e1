//! # Query Cache
//!
//! Keyed async memoization used by every portal component.
//!
//! - **Single-flight**: concurrent callers for one key share one fetch.
//! - **Placeholder retention**: the last successful value stays visible while
//!   a revalidation is in flight and after it fails.
//! - **Staleness / retention**: fresh values are served without fetching; idle
//!   entries are collected once their retention window passes.
//! - **Replace-on-settle**: an entry is only ever replaced as a whole when a
//!   fetch settles, and subscribers observe it through a [`Dynamic`].
//!
//! ```rust,ignore
//! let state = cache
//!     .fetch(principal.clone(), policy.options(true), move || backend.get_caller_profile())
//!     .await;
//! if let Some(profile) = state.data { /* render */ }
//! ```
//!
//! [`Dynamic`]: crate::reactive::Dynamic

mod cache;

pub use cache::QueryCache;

use crate::errors::PortalError;

/// Per-call cache options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// How long a successful value is served without refetching.
    pub stale_ms: u64,
    /// How long an idle entry survives garbage collection.
    pub retention_ms: u64,
    /// Disabled queries never fetch.
    pub enabled: bool,
    /// Extra attempts after a failure.
    pub retries: u32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_ms: 0,
            retention_ms: crate::config::DEFAULT_RETENTION_MS,
            enabled: true,
            retries: crate::config::MAX_QUERY_RETRIES,
        }
    }
}

impl QueryOptions {
    /// Same options with `enabled` replaced.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryStatus {
    /// Never fetched
    #[default]
    Idle,
    /// A fetch is in flight
    Fetching,
    /// Last fetch succeeded
    Success,
    /// Last fetch failed
    Error,
}

/// Observable state of one cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<V> {
    /// Last successful value, retained across revalidations and failures
    pub data: Option<V>,
    /// Current status
    pub status: QueryStatus,
    /// Error of the last failed fetch
    pub error: Option<PortalError>,
    /// When `data` was fetched
    pub fetched_at_ms: Option<u64>,
    /// When any fetch last settled
    pub settled_at_ms: Option<u64>,
    /// Retries used by the last settled fetch
    pub retry_count: u32,
}

impl<V> Default for QueryState<V> {
    fn default() -> Self {
        Self {
            data: None,
            status: QueryStatus::Idle,
            error: None,
            fetched_at_ms: None,
            settled_at_ms: None,
            retry_count: 0,
        }
    }
}

impl<V> QueryState<V> {
    /// At least one fetch has settled.
    pub fn is_settled(&self) -> bool {
        self.settled_at_ms.is_some()
    }

    /// A fetch is in flight and nothing has settled yet.
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Fetching && !self.is_settled()
    }

    /// A fetch is in flight while an earlier result is shown.
    pub fn is_refetching(&self) -> bool {
        self.status == QueryStatus::Fetching && self.is_settled()
    }

    /// The last fetch failed.
    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}
