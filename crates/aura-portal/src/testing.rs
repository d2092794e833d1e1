//! Test doubles shared by unit tests.

use crate::backend::PortalBackend;
use crate::config::PortalConfig;
use crate::connection::ConnectionLifecycle;
use crate::errors::{PortalError, Result};
use crate::gate::AccessGate;
use crate::identity::Principal;
use crate::profiles::ProfileQueries;
use crate::role::RoleResolver;
use crate::time::ManualClock;
use crate::views::profile::CallerProfile;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct MockState {
    admin: Result<bool>,
    caller_profile: Result<Option<CallerProfile>>,
    profiles: Vec<CallerProfile>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            admin: Ok(false),
            caller_profile: Ok(None),
            profiles: Vec::new(),
        }
    }
}

/// Scriptable backend that counts calls.
#[derive(Default)]
pub(crate) struct MockBackend {
    state: Mutex<MockState>,
    admin_calls: AtomicU32,
    caller_profile_calls: AtomicU32,
}

impl MockBackend {
    pub fn set_admin(&self, admin: bool) {
        self.state.lock().admin = Ok(admin);
    }

    pub fn fail_admin_check(&self, message: &str) {
        self.state.lock().admin = Err(PortalError::backend("isCallerAdmin", message));
    }

    pub fn set_caller_profile(&self, profile: Option<CallerProfile>) {
        self.state.lock().caller_profile = Ok(profile);
    }

    pub fn fail_caller_profile(&self, message: &str) {
        self.state.lock().caller_profile = Err(PortalError::backend("getCallerProfile", message));
    }

    /// Publish `profile`, replacing any profile owned by the same principal.
    pub fn add_profile(&self, profile: CallerProfile) {
        let mut state = self.state.lock();
        state.profiles.retain(|p| p.principal != profile.principal);
        state.profiles.push(profile);
    }

    pub fn admin_calls(&self) -> u32 {
        self.admin_calls.load(Ordering::SeqCst)
    }

    pub fn caller_profile_calls(&self) -> u32 {
        self.caller_profile_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortalBackend for MockBackend {
    async fn get_caller_profile(&self) -> Result<Option<CallerProfile>> {
        self.caller_profile_calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().caller_profile.clone()
    }

    async fn is_caller_admin(&self) -> Result<bool> {
        self.admin_calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().admin.clone()
    }

    async fn get_profile_by_id(&self, principal: &Principal) -> Result<Option<CallerProfile>> {
        Ok(self
            .state
            .lock()
            .profiles
            .iter()
            .find(|p| &p.principal == principal)
            .cloned())
    }

    async fn get_profile_by_username(&self, username: &str) -> Result<Option<CallerProfile>> {
        Ok(self
            .state
            .lock()
            .profiles
            .iter()
            .find(|p| p.username == username)
            .cloned())
    }
}

/// Portal components wired over a [`MockBackend`] and a [`ManualClock`].
pub(crate) struct TestPortal {
    pub backend: Arc<MockBackend>,
    pub clock: ManualClock,
    pub connection: ConnectionLifecycle,
    pub profiles: ProfileQueries,
    pub roles: RoleResolver,
    pub gate: AccessGate,
}

impl TestPortal {
    fn build(backend: MockBackend, config: PortalConfig) -> Self {
        let backend = Arc::new(backend);
        let clock = ManualClock::new(1_000_000);
        let shared_clock: Arc<dyn crate::time::ClockEffects> = Arc::new(clock.clone());
        let connection = ConnectionLifecycle::new(shared_clock.clone(), config.connection_timeout_ms);
        let profiles = ProfileQueries::new(
            backend.clone(),
            connection.clone(),
            shared_clock.clone(),
            config.profile_query,
        );
        let roles = RoleResolver::new(
            backend.clone(),
            profiles.clone(),
            connection.clone(),
            shared_clock,
            config.super_admin_principal.clone().map(Principal::new),
            config.role_query,
        );
        let gate = AccessGate::new(connection.clone(), profiles.clone(), roles.clone());
        Self {
            backend,
            clock,
            connection,
            profiles,
            roles,
            gate,
        }
    }

    /// Connection still being established.
    pub fn connecting(backend: MockBackend) -> Self {
        let portal = Self::build(backend, PortalConfig::default());
        portal.connection.begin_connect();
        portal
    }

    /// Connection ready.
    pub async fn ready(backend: MockBackend) -> Self {
        Self::ready_with_config(backend, PortalConfig::default()).await
    }

    /// Connection ready, with a configured super-admin.
    pub async fn ready_with_super_admin(backend: MockBackend, principal: &str) -> Self {
        Self::ready_with_config(backend, PortalConfig::with_super_admin(principal)).await
    }

    async fn ready_with_config(backend: MockBackend, config: PortalConfig) -> Self {
        let portal = Self::build(backend, config);
        portal
            .connection
            .establish(async { Ok(()) })
            .await
            .expect("mock connection succeeds");
        portal
    }
}
