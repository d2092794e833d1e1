//! Query cache implementation.

use super::{QueryOptions, QueryState, QueryStatus};
use crate::errors::Result;
use crate::reactive::{Dynamic, Subscription};
use crate::time::ClockEffects;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

/// Output of one fetch: the result and the retries it used.
type FetchOutcome<V> = (Result<V>, u32);
type InFlight<V> = Shared<BoxFuture<'static, FetchOutcome<V>>>;

struct Slot<V> {
    state: Dynamic<QueryState<V>>,
    in_flight: Option<(u64, InFlight<V>)>,
    /// Generation of the fetch that produced `data`
    fetched_generation: Option<u64>,
    /// Fetches older than this generation produce stale data
    valid_from: u64,
    retention_ms: u64,
    last_used_ms: u64,
}

impl<V: Clone + Send + Sync + 'static> Slot<V> {
    fn new(retention_ms: u64, now: u64) -> Self {
        Self {
            state: Dynamic::new(QueryState::default()),
            in_flight: None,
            fetched_generation: None,
            valid_from: 0,
            retention_ms,
            last_used_ms: now,
        }
    }

    fn is_fresh(&self, now: u64, stale_ms: u64) -> bool {
        let current = self
            .fetched_generation
            .map_or(false, |generation| generation >= self.valid_from);
        current
            && self.state.with(|s| {
                s.status == QueryStatus::Success
                    && s.fetched_at_ms
                        .map_or(false, |at| now.saturating_sub(at) < stale_ms)
            })
    }

    fn is_collectable(&self, now: u64) -> bool {
        self.in_flight.is_none() && now.saturating_sub(self.last_used_ms) >= self.retention_ms
    }
}

struct Inner<K, V> {
    slots: HashMap<K, Slot<V>>,
    next_generation: u64,
}

/// Keyed single-flight cache.
///
/// Cloning shares the underlying entries.
pub struct QueryCache<K, V> {
    name: &'static str,
    inner: Arc<Mutex<Inner<K, V>>>,
    clock: Arc<dyn ClockEffects>,
}

impl<K, V> Clone for QueryCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: self.inner.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<K, V> QueryCache<K, V>
where
    K: Clone + Eq + Hash + std::fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty cache. `name` only appears in logs.
    pub fn new(name: &'static str, clock: Arc<dyn ClockEffects>) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(Inner {
                slots: HashMap::new(),
                next_generation: 1,
            })),
            clock,
        }
    }

    /// Fetch `key`, reusing a fresh value or an in-flight fetch.
    ///
    /// Disabled queries return the current state without fetching.
    pub async fn fetch<F, Fut>(&self, key: K, options: QueryOptions, fetcher: F) -> QueryState<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let now = self.clock.now_ms();
        self.collect_garbage();

        let (generation, in_flight) = {
            let mut inner = self.inner.lock();
            let next_generation = inner.next_generation;
            let slot = inner
                .slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(options.retention_ms, now));
            slot.last_used_ms = now;
            slot.retention_ms = options.retention_ms;

            if !options.enabled {
                return slot.state.get();
            }

            if let Some((generation, in_flight)) = &slot.in_flight {
                (*generation, in_flight.clone())
            } else if slot.is_fresh(now, options.stale_ms) {
                return slot.state.get();
            } else {
                let in_flight = run_fetch(self.name, fetcher, options.retries)
                    .boxed()
                    .shared();
                slot.in_flight = Some((next_generation, in_flight.clone()));
                slot.state.modify(|s| s.status = QueryStatus::Fetching);
                tracing::trace!(cache = self.name, key = ?key, generation = next_generation, "fetch started");
                inner.next_generation += 1;
                (next_generation, in_flight)
            }
        };

        let outcome = in_flight.await;
        self.settle(&key, generation, outcome);
        self.peek_state(&key)
    }

    /// Fetch `key` ignoring staleness. Joins a fetch that is already in flight.
    pub async fn refetch<F, Fut>(&self, key: K, options: QueryOptions, fetcher: F) -> QueryState<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.invalidate(&key);
        self.fetch(key, options, fetcher).await
    }

    /// Current state of `key` without fetching.
    pub fn peek_state(&self, key: &K) -> QueryState<V> {
        self.inner
            .lock()
            .slots
            .get(key)
            .map(|slot| slot.state.get())
            .unwrap_or_default()
    }

    /// Last successful value of `key`, if any.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.inner
            .lock()
            .slots
            .get(key)
            .and_then(|slot| slot.state.with(|s| s.data.clone()))
    }

    /// Observe `key`. Creates an idle entry if none exists.
    pub fn subscribe(&self, key: K) -> Subscription<QueryState<V>> {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        let slot = inner
            .slots
            .entry(key)
            .or_insert_with(|| Slot::new(crate::config::DEFAULT_RETENTION_MS, now));
        slot.last_used_ms = now;
        slot.state.subscribe()
    }

    /// Store a value as if a fetch had just succeeded.
    ///
    /// A fetch already in flight is superseded: its waiters still resolve,
    /// but its result is discarded.
    pub fn set_data(&self, key: K, value: V) {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        let generation = inner.next_generation;
        inner.next_generation += 1;
        let slot = inner
            .slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(crate::config::DEFAULT_RETENTION_MS, now));
        if let Some((superseded, _)) = slot.in_flight.take() {
            tracing::trace!(cache = self.name, key = ?key, superseded, "in-flight fetch superseded");
        }
        slot.fetched_generation = Some(generation);
        slot.last_used_ms = now;
        slot.state.modify(|s| {
            s.data = Some(value);
            s.error = None;
            s.status = QueryStatus::Success;
            s.fetched_at_ms = Some(now);
            s.settled_at_ms = Some(now);
        });
    }

    /// Mark `key` stale so the next `fetch` goes to the backend.
    ///
    /// A fetch already in flight still settles, but its value stays stale.
    /// Returns whether the key was cached.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut inner = self.inner.lock();
        let next_generation = inner.next_generation;
        match inner.slots.get_mut(key) {
            Some(slot) => {
                slot.valid_from = next_generation;
                tracing::trace!(cache = self.name, key = ?key, "invalidated");
                true
            }
            None => false,
        }
    }

    /// Mark every entry stale.
    pub fn invalidate_all(&self) {
        let mut inner = self.inner.lock();
        let next_generation = inner.next_generation;
        for slot in inner.slots.values_mut() {
            slot.valid_from = next_generation;
        }
    }

    /// Drop `key` entirely. A fetch in flight for it settles into nothing.
    pub fn remove(&self, key: &K) {
        self.inner.lock().slots.remove(key);
    }

    /// Drop idle entries whose retention window has passed. Returns how many.
    pub fn collect_garbage(&self) -> usize {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        let before = inner.slots.len();
        inner.slots.retain(|_, slot| !slot.is_collectable(now));
        let evicted = before - inner.slots.len();
        if evicted > 0 {
            tracing::trace!(cache = self.name, evicted, "collected idle entries");
        }
        evicted
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Whether the cache holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn settle(&self, key: &K, generation: u64, outcome: FetchOutcome<V>) {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        let Some(slot) = inner.slots.get_mut(key) else {
            return;
        };
        match &slot.in_flight {
            Some((current, _)) if *current == generation => {}
            // Another waiter already settled this fetch, or the entry was replaced.
            _ => return,
        }
        slot.in_flight = None;

        let (result, retries) = outcome;
        if result.is_ok() {
            slot.fetched_generation = Some(generation);
        }
        slot.state.modify(|s| {
            match result {
                Ok(value) => {
                    s.data = Some(value);
                    s.status = QueryStatus::Success;
                    s.error = None;
                    s.fetched_at_ms = Some(now);
                }
                Err(err) => {
                    tracing::debug!(cache = self.name, key = ?key, error = %err, "fetch failed");
                    s.status = QueryStatus::Error;
                    s.error = Some(err);
                }
            }
            s.retry_count = retries;
            s.settled_at_ms = Some(now);
        });
    }
}

async fn run_fetch<V, F, Fut>(name: &'static str, fetcher: F, retries: u32) -> FetchOutcome<V>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V>> + Send + 'static,
{
    let mut attempt = 0;
    loop {
        match fetcher().await {
            Ok(value) => return (Ok(value), attempt),
            Err(err) if attempt < retries => {
                tracing::debug!(cache = name, attempt, error = %err, "fetch failed, retrying");
                attempt += 1;
            }
            Err(err) => return (Err(err), attempt),
        }
    }
}
