//! # PortalBackend: Read Capabilities of the Backend Actor
//!
//! The portal never mutates backend state. It consumes exactly these typed
//! queries from the collaborator that owns post storage, the follow graph
//! and messaging.
//!
//! ```text
//! aura-portal (pure)          frontend host
//! ┌──────────────────┐        ┌──────────────────┐
//! │ RoleResolver     │        │ backend actor    │
//! │ ProfileQueries ──┼───────►│ implements       │
//! │                  │        │ PortalBackend    │
//! └──────────────────┘        └──────────────────┘
//! ```

use crate::errors::Result;
use crate::identity::Principal;
use crate::views::profile::CallerProfile;
use async_trait::async_trait;
use std::sync::Arc;

/// Read/query capabilities consumed from the backend.
///
/// Calls are made on behalf of the identity the actor was built with.
#[async_trait]
pub trait PortalBackend: Send + Sync {
    /// Profile of the calling identity, `None` if it has not been created yet.
    async fn get_caller_profile(&self) -> Result<Option<CallerProfile>>;

    /// Whether the calling identity holds backend admin rights.
    async fn is_caller_admin(&self) -> Result<bool>;

    /// Profile owned by `principal`.
    async fn get_profile_by_id(&self, principal: &Principal) -> Result<Option<CallerProfile>>;

    /// Profile registered under `username`.
    async fn get_profile_by_username(&self, username: &str) -> Result<Option<CallerProfile>>;
}

/// Shared backend handle.
pub type BoxedBackend = Arc<dyn PortalBackend>;
