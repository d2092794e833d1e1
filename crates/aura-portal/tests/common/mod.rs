//! Shared fixtures for portal integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use aura_portal::{
    CallerProfile, InMemoryObjectUrls, ManualClock, PortalBackend, PortalConfig, PortalCore,
    PortalError, Principal, Result,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Backend with scripted answers.
pub struct ScriptedBackend {
    admin: Mutex<Result<bool>>,
    caller_profile: Mutex<Result<Option<CallerProfile>>>,
    directory: Mutex<Vec<CallerProfile>>,
    pub admin_calls: AtomicU32,
    pub profile_calls: AtomicU32,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            admin: Mutex::new(Ok(false)),
            caller_profile: Mutex::new(Ok(None)),
            directory: Mutex::new(Vec::new()),
            admin_calls: AtomicU32::new(0),
            profile_calls: AtomicU32::new(0),
        }
    }
}

impl ScriptedBackend {
    pub fn with_profile(profile: CallerProfile) -> Self {
        let backend = Self::default();
        *backend.caller_profile.lock() = Ok(Some(profile));
        backend
    }

    pub fn set_admin(&self, admin: bool) {
        *self.admin.lock() = Ok(admin);
    }

    pub fn fail_admin(&self, message: &str) {
        *self.admin.lock() = Err(PortalError::backend("isCallerAdmin", message));
    }

    pub fn set_profile(&self, profile: Option<CallerProfile>) {
        *self.caller_profile.lock() = Ok(profile);
    }

    pub fn fail_profile(&self, message: &str) {
        *self.caller_profile.lock() = Err(PortalError::backend("getCallerProfile", message));
    }

    pub fn publish(&self, profile: CallerProfile) {
        self.directory.lock().push(profile);
    }

    pub fn profile_calls(&self) -> u32 {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn admin_calls(&self) -> u32 {
        self.admin_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortalBackend for ScriptedBackend {
    async fn get_caller_profile(&self) -> Result<Option<CallerProfile>> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.caller_profile.lock().clone()
    }

    async fn is_caller_admin(&self) -> Result<bool> {
        self.admin_calls.fetch_add(1, Ordering::SeqCst);
        self.admin.lock().clone()
    }

    async fn get_profile_by_id(&self, principal: &Principal) -> Result<Option<CallerProfile>> {
        Ok(self
            .directory
            .lock()
            .iter()
            .find(|p| &p.principal == principal)
            .cloned())
    }

    async fn get_profile_by_username(&self, username: &str) -> Result<Option<CallerProfile>> {
        Ok(self
            .directory
            .lock()
            .iter()
            .find(|p| p.username == username)
            .cloned())
    }
}

/// A portal over a scripted backend and a manual clock.
pub struct Harness {
    pub core: PortalCore,
    pub backend: Arc<ScriptedBackend>,
    pub clock: ManualClock,
    pub urls: Arc<InMemoryObjectUrls>,
}

impl Harness {
    pub fn new(config: PortalConfig, backend: ScriptedBackend) -> Self {
        let backend = Arc::new(backend);
        let clock = ManualClock::new(1_700_000_000_000);
        let urls = Arc::new(InMemoryObjectUrls::new());
        let core = PortalCore::with_clock(config, backend.clone(), urls.clone(), Arc::new(clock.clone()))
            .expect("valid config");
        Self {
            core,
            backend,
            clock,
            urls,
        }
    }

    /// Portal with a settled anonymous session and a ready connection.
    pub async fn ready(config: PortalConfig, backend: ScriptedBackend) -> Self {
        let harness = Self::new(config, backend);
        harness.core.session().restored(None);
        harness
            .core
            .connect(async { Ok(()) })
            .await
            .expect("connection succeeds");
        harness
    }
}

/// Let spawned watchdog tasks observe clock changes.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
