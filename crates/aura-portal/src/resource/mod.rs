//! Image resource resolution.
//!
//! Turns opaque image handles into displayable URLs. A handle that exposes
//! a valid direct URL is used as-is; otherwise its bytes are fetched and
//! wrapped in a locally created object URL, which the resolver owns and
//! must revoke.

mod mime;
mod resolver;
mod url_check;

pub use mime::ImageMime;
pub use resolver::ResourceResolver;
pub use url_check::validate_direct_url;

use crate::errors::{PortalError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Opaque reference to stored image bytes.
#[async_trait]
pub trait BlobHandle: Send + Sync {
    /// URL the content can be loaded from directly, if the store offers one.
    fn direct_url(&self) -> Option<String>;

    /// Fetch the raw bytes.
    async fn bytes(&self) -> Result<Vec<u8>>;
}

/// A locally created URL that must be revoked when no longer displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    /// Wrap a URL produced by an [`ObjectUrlFactory`].
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// The URL text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host facility for creating and revoking object URLs.
pub trait ObjectUrlFactory: Send + Sync {
    /// Create a URL serving `bytes` as `mime`.
    fn create(&self, bytes: &[u8], mime: ImageMime) -> Result<ObjectUrl>;

    /// Release a URL created by [`ObjectUrlFactory::create`].
    fn revoke(&self, url: &ObjectUrl);
}

/// Object URLs held in process memory, for native hosts and tests.
#[derive(Debug, Default)]
pub struct InMemoryObjectUrls {
    live: Mutex<HashMap<ObjectUrl, (ImageMime, Vec<u8>)>>,
    created: AtomicUsize,
    revoked: AtomicUsize,
}

impl InMemoryObjectUrls {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of URLs not yet revoked.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    /// Total URLs created.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Total URLs revoked.
    pub fn revoked_count(&self) -> usize {
        self.revoked.load(Ordering::SeqCst)
    }

    /// Content served at `url`, if still live.
    pub fn get(&self, url: &ObjectUrl) -> Option<(ImageMime, Vec<u8>)> {
        self.live.lock().get(url).cloned()
    }
}

impl ObjectUrlFactory for InMemoryObjectUrls {
    fn create(&self, bytes: &[u8], mime: ImageMime) -> Result<ObjectUrl> {
        if bytes.is_empty() {
            return Err(PortalError::invalid_resource("empty image payload"));
        }
        let url = ObjectUrl::new(format!("blob:aura-portal/{}", uuid::Uuid::new_v4()));
        self.live.lock().insert(url.clone(), (mime, bytes.to_vec()));
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(url)
    }

    fn revoke(&self, url: &ObjectUrl) {
        if self.live.lock().remove(url).is_some() {
            self.revoked.fetch_add(1, Ordering::SeqCst);
        } else {
            tracing::warn!(%url, "revoking unknown object URL");
        }
    }
}

/// Resolution progress of one image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImageState {
    /// Nothing requested
    #[default]
    Unresolved,
    /// Handle is being inspected
    Validating,
    /// Direct URL, or `None` when there is no image
    Resolved(Option<String>),
    /// Locally created object URL owned by the resolver
    Fallback(ObjectUrl),
    /// Resolution failed; render a placeholder
    Failed,
}

/// What an image element renders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageView {
    /// Source URL, `None` renders a placeholder
    pub src: Option<String>,
    /// Resolution in progress
    pub is_loading: bool,
    /// Resolution failed
    pub error: bool,
}

impl From<&ImageState> for ImageView {
    fn from(state: &ImageState) -> Self {
        match state {
            ImageState::Unresolved => Self::default(),
            ImageState::Validating => Self {
                is_loading: true,
                ..Self::default()
            },
            ImageState::Resolved(src) => Self {
                src: src.clone(),
                ..Self::default()
            },
            ImageState::Fallback(url) => Self {
                src: Some(url.as_str().to_string()),
                ..Self::default()
            },
            ImageState::Failed => Self {
                error: true,
                ..Self::default()
            },
        }
    }
}
