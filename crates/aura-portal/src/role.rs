//! Effective role resolution.
//!
//! The effective role is derived, never stored. It is computed by an
//! ordered fallback chain in which every backend step is failure-tolerant:
//!
//! 1. no identity → [`EffectiveRole::Guest`]
//! 2. configured super-admin principal → `Admin`, without calling the backend
//! 3. backend admin check returns true → `Admin` (errors fall through)
//! 4. caller profile role: admin → `Admin`, officer → `Officer`, anything else → `User`
//! 5. authenticated without a profile → `User`
//!
//! Cached results are keyed by principal. The query is disabled while the
//! backend connection is being established so a role is never computed
//! against an actor that does not exist yet.

use crate::backend::BoxedBackend;
use crate::config::QueryPolicy;
use crate::connection::ConnectionLifecycle;
use crate::errors::PortalError;
use crate::identity::{Identity, Principal};
use crate::profiles::ProfileQueries;
use crate::query::{QueryCache, QueryState};
use crate::time::ClockEffects;
use crate::views::profile::ProfileRole;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Caller access level as computed by the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectiveRole {
    /// Anonymous caller
    Guest,
    /// Authenticated caller
    User,
    /// Moderation staff
    Officer,
    /// Administrator
    Admin,
}

impl EffectiveRole {
    /// Map a stored profile role.
    ///
    /// Unrecognised roles map to `User`; new backend roles grant nothing
    /// until this client learns about them.
    pub fn from_profile_role(role: &ProfileRole) -> Self {
        match role {
            ProfileRole::Admin => Self::Admin,
            ProfileRole::Officer => Self::Officer,
            ProfileRole::User => Self::User,
            ProfileRole::Other(raw) => {
                tracing::debug!(role = %raw, "unmapped profile role treated as user");
                Self::User
            }
        }
    }

    /// Admin or officer.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Admin | Self::Officer)
    }

    /// Lowercase label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::User => "user",
            Self::Officer => "officer",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for EffectiveRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Role as seen by a frontend.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleView {
    /// Resolved role; `None` only while the first resolution is pending
    pub role: Option<EffectiveRole>,
    /// Nothing resolved yet
    pub is_loading: bool,
    /// Error of the last resolution attempt
    pub error: Option<PortalError>,
}

impl RoleView {
    fn resolved(role: EffectiveRole) -> Self {
        Self {
            role: Some(role),
            is_loading: false,
            error: None,
        }
    }

    fn from_state(state: QueryState<EffectiveRole>) -> Self {
        Self {
            is_loading: state.data.is_none(),
            role: state.data,
            error: state.error,
        }
    }
}

/// Computes effective roles.
#[derive(Clone)]
pub struct RoleResolver {
    backend: BoxedBackend,
    profiles: ProfileQueries,
    connection: ConnectionLifecycle,
    super_admin: Option<Principal>,
    policy: QueryPolicy,
    cache: QueryCache<Principal, EffectiveRole>,
}

impl RoleResolver {
    /// Create a resolver.
    pub fn new(
        backend: BoxedBackend,
        profiles: ProfileQueries,
        connection: ConnectionLifecycle,
        clock: Arc<dyn ClockEffects>,
        super_admin: Option<Principal>,
        policy: QueryPolicy,
    ) -> Self {
        Self {
            backend,
            profiles,
            connection,
            super_admin,
            policy,
            cache: QueryCache::new("effective-role", clock),
        }
    }

    /// Whether `identity` is the configured super-admin.
    pub fn is_super_admin(&self, identity: Option<&Identity>) -> bool {
        is_super_admin(self.super_admin.as_ref(), identity)
    }

    /// Run the fallback chain without caching. Never fails.
    pub async fn resolve_role(&self, identity: Option<&Identity>) -> EffectiveRole {
        match identity {
            None => EffectiveRole::Guest,
            Some(identity) => {
                resolve_chain(
                    self.backend.clone(),
                    self.profiles.clone(),
                    self.super_admin.clone(),
                    identity.clone(),
                )
                .await
            }
        }
    }

    /// Cached role for `identity`.
    ///
    /// While the connection is being established nothing is fetched and the
    /// last resolved role (if any) is returned.
    pub async fn role(&self, identity: Option<&Identity>) -> RoleView {
        let Some(identity) = identity else {
            return RoleView::resolved(EffectiveRole::Guest);
        };

        let enabled = !self.connection.is_fetching();
        let backend = self.backend.clone();
        let profiles = self.profiles.clone();
        let super_admin = self.super_admin.clone();
        let caller = identity.clone();

        let state = self
            .cache
            .fetch(
                identity.principal().clone(),
                self.policy.options(enabled),
                move || {
                    let backend = backend.clone();
                    let profiles = profiles.clone();
                    let super_admin = super_admin.clone();
                    let caller = caller.clone();
                    async move { Ok(resolve_chain(backend, profiles, super_admin, caller).await) }
                },
            )
            .await;
        RoleView::from_state(state)
    }

    /// Last resolved role without triggering a resolution.
    pub fn peek_role(&self, identity: Option<&Identity>) -> RoleView {
        match identity {
            None => RoleView::resolved(EffectiveRole::Guest),
            Some(identity) => RoleView::from_state(self.cache.peek_state(identity.principal())),
        }
    }

    /// Mark the cached role of `identity` stale.
    pub fn invalidate(&self, identity: &Identity) {
        self.cache.invalidate(identity.principal());
    }

    /// Forget the cached role of `identity`.
    pub fn forget(&self, identity: &Identity) {
        self.cache.remove(identity.principal());
    }
}

fn is_super_admin(super_admin: Option<&Principal>, identity: Option<&Identity>) -> bool {
    match (super_admin, identity) {
        (Some(admin), Some(identity)) => identity.principal() == admin,
        _ => false,
    }
}

async fn resolve_chain(
    backend: BoxedBackend,
    profiles: ProfileQueries,
    super_admin: Option<Principal>,
    identity: Identity,
) -> EffectiveRole {
    let principal = identity.principal();

    if is_super_admin(super_admin.as_ref(), Some(&identity)) {
        tracing::debug!(%principal, "super-admin principal resolved as admin");
        return EffectiveRole::Admin;
    }

    match backend.is_caller_admin().await {
        Ok(true) => return EffectiveRole::Admin,
        Ok(false) => {}
        Err(err) => {
            tracing::warn!(%principal, error = %err, "admin check failed, falling back to profile role");
        }
    }

    let state = profiles.caller_profile(&identity).await;
    match state.data {
        Some(Some(profile)) => EffectiveRole::from_profile_role(&profile.role),
        Some(None) => EffectiveRole::User,
        None => {
            if let Some(err) = state.error {
                tracing::warn!(%principal, error = %err, "profile lookup failed while resolving role");
            }
            EffectiveRole::User
        }
    }
}
