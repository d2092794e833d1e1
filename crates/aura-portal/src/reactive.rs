//! Reactive cells for portal state.
//!
//! [`Dynamic<T>`] wraps a value with a version counter; a [`Subscription<T>`]
//! remembers the last version it saw and reports newer values. Connection
//! state, the session and every query cache entry are published through these
//! cells so any frontend (TUI, web, mobile) can observe them without a
//! framework-specific reactivity layer.
//!
//! Subscriptions are poll-based; `changed()` additionally lets async hosts
//! wait for the next update.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct DynamicInner<T> {
    value: RwLock<T>,
    version: AtomicU64,
    notify: Notify,
}

/// A reactive value that can be observed for changes.
#[derive(Clone)]
pub struct Dynamic<T> {
    inner: Arc<DynamicInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Dynamic<T> {
    /// Create a new Dynamic with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(DynamicInner {
                value: RwLock::new(value),
                version: AtomicU64::new(0),
                notify: Notify::new(),
            }),
        }
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Read the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Get the current version number.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value;
        self.bump();
    }

    /// Mutate the value in place under the write lock and notify subscribers.
    ///
    /// The closure sees a consistent value; no other writer interleaves.
    pub fn modify<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = {
            let mut guard = self.inner.value.write();
            f(&mut guard)
        };
        self.bump();
        result
    }

    /// Subscribe to value changes.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            source: self.inner.clone(),
            last_version: self.version(),
        }
    }

    fn bump(&self) {
        self.inner.version.fetch_add(1, Ordering::Release);
        self.inner.notify.notify_waiters();
    }
}

impl<T: Clone + Send + Sync + Default + 'static> Default for Dynamic<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for Dynamic<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dynamic")
            .field("value", &self.get())
            .field("version", &self.version())
            .finish()
    }
}

/// A subscription to a [`Dynamic`] value.
pub struct Subscription<T> {
    source: Arc<DynamicInner<T>>,
    last_version: u64,
}

impl<T: Clone + Send + Sync + 'static> Subscription<T> {
    /// Check if the source has changed since the last poll.
    pub fn has_changed(&self) -> bool {
        self.source.version.load(Ordering::Acquire) > self.last_version
    }

    /// Return the new value if the source changed since the last poll.
    pub fn poll(&mut self) -> Option<T> {
        let current = self.source.version.load(Ordering::Acquire);
        if current > self.last_version {
            self.last_version = current;
            Some(self.source.value.read().clone())
        } else {
            None
        }
    }

    /// Get the current value regardless of whether it changed.
    pub fn get(&self) -> T {
        self.source.value.read().clone()
    }

    /// Wait for the next change and return the new value.
    pub async fn changed(&mut self) -> T {
        loop {
            let source = self.source.clone();
            let notified = source.notify.notified();
            if let Some(value) = self.poll() {
                return value;
            }
            notified.await;
        }
    }
}
