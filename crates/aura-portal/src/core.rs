//! Portal facade.
//!
//! [`PortalCore`] owns one instance of every component and shares a single
//! connection lifecycle, clock and configuration between them.

use crate::backend::BoxedBackend;
use crate::config::PortalConfig;
use crate::connection::ConnectionLifecycle;
use crate::errors::Result;
use crate::gate::{AccessGate, GateState, RequiredRole};
use crate::identity::{Identity, Principal, Session};
use crate::profiles::ProfileQueries;
use crate::resource::{ObjectUrlFactory, ResourceResolver};
use crate::role::{EffectiveRole, RoleResolver, RoleView};
use crate::time::{ClockEffects, SystemClock};
use crate::views::profile::CallerProfile;
use crate::visibility::{VisibilityDecision, VisibilityPolicy};
use std::future::Future;
use std::sync::Arc;

/// Headless access layer for one frontend.
pub struct PortalCore {
    config: PortalConfig,
    session: Session,
    connection: ConnectionLifecycle,
    profiles: ProfileQueries,
    roles: RoleResolver,
    gate: AccessGate,
    visibility: VisibilityPolicy,
    object_urls: Arc<dyn ObjectUrlFactory>,
}

impl PortalCore {
    /// Create a portal using the system clock.
    pub fn new(
        config: PortalConfig,
        backend: BoxedBackend,
        object_urls: Arc<dyn ObjectUrlFactory>,
    ) -> Result<Self> {
        Self::with_clock(config, backend, object_urls, Arc::new(SystemClock))
    }

    /// Create a portal with an explicit clock.
    pub fn with_clock(
        config: PortalConfig,
        backend: BoxedBackend,
        object_urls: Arc<dyn ObjectUrlFactory>,
        clock: Arc<dyn ClockEffects>,
    ) -> Result<Self> {
        config.validate()?;

        let super_admin = config.super_admin_principal.as_deref().map(Principal::new);
        let connection = ConnectionLifecycle::new(clock.clone(), config.connection_timeout_ms);
        let profiles = ProfileQueries::new(
            backend.clone(),
            connection.clone(),
            clock.clone(),
            config.profile_query,
        );
        let roles = RoleResolver::new(
            backend,
            profiles.clone(),
            connection.clone(),
            clock,
            super_admin.clone(),
            config.role_query,
        );
        let gate = AccessGate::new(connection.clone(), profiles.clone(), roles.clone());

        tracing::info!(
            super_admin = super_admin.is_some(),
            timeout_ms = config.connection_timeout_ms,
            "portal core initialized"
        );

        Ok(Self {
            visibility: VisibilityPolicy::new(super_admin),
            session: Session::new(),
            config,
            connection,
            profiles,
            roles,
            gate,
            object_urls,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Login session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Backend connection lifecycle.
    pub fn connection(&self) -> &ConnectionLifecycle {
        &self.connection
    }

    /// Cached profile queries.
    pub fn profiles(&self) -> &ProfileQueries {
        &self.profiles
    }

    /// Effective role resolver.
    pub fn roles(&self) -> &RoleResolver {
        &self.roles
    }

    /// Access gate.
    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// Visibility rules.
    pub fn visibility(&self) -> &VisibilityPolicy {
        &self.visibility
    }

    /// A fresh resolver for one displayed image.
    pub fn image_resolver(&self) -> ResourceResolver {
        ResourceResolver::new(self.object_urls.clone(), self.config.max_direct_url_len)
    }

    /// Build the backend actor through the connection lifecycle.
    pub async fn connect<T, F>(&self, connect: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.connection.establish(connect).await
    }

    /// Gate the current session, starting the connection on first use.
    pub async fn evaluate_gate(&self, required: Option<RequiredRole>) -> GateState {
        self.connection.ensure_started();
        self.gate.evaluate(&self.session.snapshot(), required).await
    }

    /// Effective role of the current session.
    pub async fn current_role(&self) -> RoleView {
        let identity = self.session.identity();
        self.roles.role(identity.as_ref()).await
    }

    /// Whether the current session may see `profile`'s content.
    pub async fn can_view_profile(&self, profile: &CallerProfile, is_follower: bool) -> VisibilityDecision {
        let identity = self.session.identity();
        let role = self.roles.role(identity.as_ref()).await.role.unwrap_or(EffectiveRole::Guest);
        let viewer = self
            .visibility
            .viewer_context(identity.as_ref(), role, &profile.principal, is_follower);
        self.visibility.decide(&viewer, profile)
    }

    /// Record a login and drop any stale state cached for that principal.
    pub fn login(&self, identity: Identity) {
        self.forget(&identity);
        self.session.login(identity);
    }

    /// End the session and drop everything cached for it.
    pub fn logout(&self) {
        if let Some(identity) = self.session.logout() {
            self.forget(&identity);
        }
    }

    /// Store the caller profile after the host created or edited it.
    ///
    /// The cached role depends on the profile and is marked stale.
    pub fn update_caller_profile(&self, profile: Option<CallerProfile>) {
        if let Some(identity) = self.session.identity() {
            self.profiles.set_caller_profile(&identity, profile);
            self.roles.invalidate(&identity);
        }
    }

    /// Mark the caller profile and its dependent role stale.
    pub fn refresh_caller(&self) {
        if let Some(identity) = self.session.identity() {
            self.profiles.invalidate_caller(&identity);
            self.roles.invalidate(&identity);
        }
    }

    fn forget(&self, identity: &Identity) {
        self.profiles.forget(identity);
        self.roles.forget(identity);
    }
}

impl std::fmt::Debug for PortalCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalCore")
            .field("session", &self.session.snapshot())
            .field("connection", &self.connection.snapshot())
            .finish_non_exhaustive()
    }
}
