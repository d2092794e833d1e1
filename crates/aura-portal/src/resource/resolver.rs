//! Per-image resolver owning at most one object URL.

use super::{validate_direct_url, BlobHandle, ImageMime, ImageState, ImageView, ObjectUrl, ObjectUrlFactory};
use crate::errors::{PortalError, Result};
use crate::reactive::{Dynamic, Subscription};
use parking_lot::Mutex;
use std::sync::Arc;

struct ResolverState {
    /// Bumped by every `resolve` and `release`; stale results compare against it
    generation: u64,
    owned: Option<ObjectUrl>,
}

/// Resolves one displayed image at a time.
///
/// Every `resolve` first revokes whatever the previous call produced. The
/// owned object URL is also revoked by [`ResourceResolver::release`] and on
/// drop. A result that arrives after a newer `resolve` or a `release` is
/// discarded without creating a URL.
pub struct ResourceResolver {
    factory: Arc<dyn ObjectUrlFactory>,
    max_direct_url_len: usize,
    inner: Mutex<ResolverState>,
    state: Dynamic<ImageState>,
}

impl ResourceResolver {
    /// Create a resolver backed by `factory`.
    pub fn new(factory: Arc<dyn ObjectUrlFactory>, max_direct_url_len: usize) -> Self {
        Self {
            factory,
            max_direct_url_len,
            inner: Mutex::new(ResolverState {
                generation: 0,
                owned: None,
            }),
            state: Dynamic::new(ImageState::Unresolved),
        }
    }

    /// Current resolution state.
    pub fn state(&self) -> ImageState {
        self.state.get()
    }

    /// Current view.
    pub fn view(&self) -> ImageView {
        self.state.with(|state| ImageView::from(state))
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> Subscription<ImageState> {
        self.state.subscribe()
    }

    /// Resolve `handle` into a displayable source.
    pub async fn resolve(&self, handle: Option<Arc<dyn BlobHandle>>) -> ImageView {
        let generation = self.restart(ImageState::Validating);

        let Some(handle) = handle else {
            self.finish(generation, || Ok(ImageState::Resolved(None)));
            return self.view();
        };

        if let Some(direct) = handle.direct_url() {
            match validate_direct_url(&direct, self.max_direct_url_len) {
                Ok(url) => {
                    self.finish(generation, || Ok(ImageState::Resolved(Some(url))));
                    return self.view();
                }
                Err(err) => {
                    tracing::debug!(error = %err, "direct URL rejected, fetching bytes");
                }
            }
        }

        let fetched = handle.bytes().await;
        let factory = self.factory.clone();
        self.finish(generation, move || {
            let bytes = fetched?;
            if bytes.is_empty() {
                return Err(PortalError::invalid_resource("empty image payload"));
            }
            let mime = ImageMime::sniff(&bytes);
            factory
                .create(&bytes, mime)
                .map(ImageState::Fallback)
                .map_err(|e| PortalError::decode_failed(e.raw_message()))
        });
        self.view()
    }

    /// Revoke the owned URL and discard any resolution in flight.
    pub fn release(&self) {
        self.restart(ImageState::Unresolved);
    }

    fn restart(&self, next: ImageState) -> u64 {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        if let Some(url) = inner.owned.take() {
            self.factory.revoke(&url);
            tracing::trace!(%url, "object URL revoked");
        }
        self.state.set(next);
        inner.generation
    }

    /// Apply an outcome if `generation` is still current.
    ///
    /// The outcome is produced under the lock so a superseded result never
    /// creates an object URL.
    fn finish(&self, generation: u64, outcome: impl FnOnce() -> Result<ImageState>) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            tracing::trace!(generation, current = inner.generation, "discarding superseded image result");
            return;
        }
        let next = match outcome() {
            Ok(state) => state,
            Err(err) => {
                tracing::debug!(error = %err, "image resolution failed");
                ImageState::Failed
            }
        };
        if let ImageState::Fallback(url) = &next {
            inner.owned = Some(url.clone());
        }
        self.state.set(next);
    }
}

impl Drop for ResourceResolver {
    fn drop(&mut self) {
        if let Some(url) = self.inner.get_mut().owned.take() {
            self.factory.revoke(&url);
        }
    }
}

impl std::fmt::Debug for ResourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceResolver")
            .field("state", &self.state())
            .field("max_direct_url_len", &self.max_direct_url_len)
            .finish_non_exhaustive()
    }
}
