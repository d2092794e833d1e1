//! Cached profile queries.
//!
//! Wraps the profile capabilities of [`PortalBackend`] in query caches so the
//! gate, the role resolver and profile screens share one fetch per key.
//! Queries are disabled while the backend connection is being established.

use crate::backend::BoxedBackend;
use crate::config::QueryPolicy;
use crate::connection::ConnectionLifecycle;
use crate::errors::{PortalError, ProfileError, Result};
use crate::identity::{Identity, Principal};
use crate::query::{QueryCache, QueryState};
use crate::time::ClockEffects;
use crate::views::profile::CallerProfile;
use std::sync::Arc;

/// Cached state of an optional profile.
pub type ProfileState = QueryState<Option<CallerProfile>>;

/// Profile lookups shared across the portal.
#[derive(Clone)]
pub struct ProfileQueries {
    backend: BoxedBackend,
    connection: ConnectionLifecycle,
    policy: QueryPolicy,
    caller: QueryCache<Principal, Option<CallerProfile>>,
    by_id: QueryCache<Principal, Option<CallerProfile>>,
    by_username: QueryCache<String, Option<CallerProfile>>,
}

impl ProfileQueries {
    /// Create profile queries over `backend`.
    pub fn new(
        backend: BoxedBackend,
        connection: ConnectionLifecycle,
        clock: Arc<dyn ClockEffects>,
        policy: QueryPolicy,
    ) -> Self {
        Self {
            backend,
            connection,
            policy,
            caller: QueryCache::new("caller-profile", clock.clone()),
            by_id: QueryCache::new("profile-by-id", clock.clone()),
            by_username: QueryCache::new("profile-by-username", clock),
        }
    }

    /// Profile of the calling identity. `data == Some(None)` means "no profile yet".
    pub async fn caller_profile(&self, identity: &Identity) -> ProfileState {
        let backend = self.backend.clone();
        self.caller
            .fetch(identity.principal().clone(), self.options(), move || {
                let backend = backend.clone();
                async move { backend.get_caller_profile().await.map_err(profile_fetch_error) }
            })
            .await
    }

    /// Cached caller profile state without fetching.
    pub fn peek_caller_profile(&self, identity: &Identity) -> ProfileState {
        self.caller.peek_state(identity.principal())
    }

    /// Profile owned by `principal`.
    pub async fn profile_by_id(&self, principal: &Principal) -> ProfileState {
        let backend = self.backend.clone();
        let target = principal.clone();
        self.by_id
            .fetch(principal.clone(), self.options(), move || {
                let backend = backend.clone();
                let target = target.clone();
                async move {
                    backend
                        .get_profile_by_id(&target)
                        .await
                        .map_err(profile_fetch_error)
                }
            })
            .await
    }

    /// Profile registered under `username`.
    pub async fn profile_by_username(&self, username: &str) -> ProfileState {
        let key = username.trim().to_string();
        let backend = self.backend.clone();
        let target = key.clone();
        self.by_username
            .fetch(key, self.options(), move || {
                let backend = backend.clone();
                let target = target.clone();
                async move {
                    backend
                        .get_profile_by_username(&target)
                        .await
                        .map_err(profile_fetch_error)
                }
            })
            .await
    }

    /// Profile registered under `username`, failing when it does not exist.
    pub async fn require_profile_by_username(&self, username: &str) -> Result<CallerProfile> {
        let state = self.profile_by_username(username).await;
        match (state.data, state.error) {
            (Some(Some(profile)), _) => Ok(profile),
            (_, Some(err)) => Err(err),
            _ => Err(ProfileError::NotFound {
                key: username.trim().to_string(),
            }
            .into()),
        }
    }

    /// Store the caller's profile after the host created or edited it.
    ///
    /// Username lookups for both the previous and the new username go stale.
    pub fn set_caller_profile(&self, identity: &Identity, profile: Option<CallerProfile>) {
        self.invalidate_cached_username(identity);
        if let Some(profile) = &profile {
            self.by_id.set_data(profile.principal.clone(), Some(profile.clone()));
            self.by_username
                .invalidate(&profile.username.trim().to_string());
        }
        self.caller.set_data(identity.principal().clone(), profile);
    }

    /// Mark the caller's profile stale.
    pub fn invalidate_caller(&self, identity: &Identity) {
        self.caller.invalidate(identity.principal());
        self.by_id.invalidate(identity.principal());
    }

    /// Forget everything cached for `identity`.
    pub fn forget(&self, identity: &Identity) {
        self.invalidate_cached_username(identity);
        self.caller.remove(identity.principal());
        self.by_id.remove(identity.principal());
    }

    fn invalidate_cached_username(&self, identity: &Identity) {
        let principal = identity.principal();
        let cached = [self.caller.peek(principal), self.by_id.peek(principal)];
        for previous in cached.into_iter().flatten().flatten() {
            self.by_username.invalidate(&previous.username.trim().to_string());
        }
    }

    fn options(&self) -> crate::query::QueryOptions {
        self.policy.options(!self.connection.is_fetching())
    }
}

fn profile_fetch_error(err: PortalError) -> PortalError {
    match err {
        PortalError::Profile(_) => err,
        other => PortalError::profile_fetch(other.raw_message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, TestPortal};

    #[tokio::test]
    async fn test_caller_profile_is_shared_and_cached() {
        let backend = MockBackend::default();
        backend.set_caller_profile(Some(CallerProfile::new("p", "alice")));
        let portal = TestPortal::ready(backend).await;
        let identity = Identity::new("p");

        let (a, b) = futures::join!(
            portal.profiles.caller_profile(&identity),
            portal.profiles.caller_profile(&identity)
        );
        assert_eq!(a.data, b.data);
        assert_eq!(portal.backend.caller_profile_calls(), 1);

        portal.profiles.caller_profile(&identity).await;
        assert_eq!(portal.backend.caller_profile_calls(), 1);

        portal.profiles.invalidate_caller(&identity);
        portal.profiles.caller_profile(&identity).await;
        assert_eq!(portal.backend.caller_profile_calls(), 2);
    }

    #[tokio::test]
    async fn test_absent_profile_is_settled_none() {
        let portal = TestPortal::ready(MockBackend::default()).await;
        let state = portal.profiles.caller_profile(&Identity::new("p")).await;
        assert_eq!(state.data, Some(None));
        assert!(state.is_settled());
    }

    #[tokio::test]
    async fn test_fetch_error_is_profile_error() {
        let backend = MockBackend::default();
        backend.fail_caller_profile("Failed to fetch");
        let portal = TestPortal::ready(backend).await;
        let state = portal.profiles.caller_profile(&Identity::new("p")).await;
        assert!(state.is_error());
        assert_eq!(state.error, Some(PortalError::profile_fetch("Failed to fetch")));
        // One retry after the first failure
        assert_eq!(portal.backend.caller_profile_calls(), 2);
    }

    #[tokio::test]
    async fn test_not_fetched_while_connecting() {
        let portal = TestPortal::connecting(MockBackend::default());
        let state = portal.profiles.caller_profile(&Identity::new("p")).await;
        assert_eq!(state.data, None);
        assert_eq!(portal.backend.caller_profile_calls(), 0);
    }

    #[tokio::test]
    async fn test_lookup_by_username_and_id() {
        let backend = MockBackend::default();
        backend.add_profile(CallerProfile::new("bob-principal", "bob"));
        let portal = TestPortal::ready(backend).await;

        let found = portal.profiles.require_profile_by_username(" bob ").await.unwrap();
        assert_eq!(found.principal, Principal::new("bob-principal"));

        let by_id = portal.profiles.profile_by_id(&Principal::new("bob-principal")).await;
        assert_eq!(by_id.data.flatten().map(|p| p.username), Some("bob".to_string()));

        let missing = portal.profiles.require_profile_by_username("carol").await;
        assert_eq!(
            missing,
            Err(PortalError::Profile(ProfileError::NotFound { key: "carol".into() }))
        );
    }

    #[tokio::test]
    async fn test_set_caller_profile_is_settled_write() {
        let portal = TestPortal::ready(MockBackend::default()).await;
        let identity = Identity::new("p");
        portal
            .profiles
            .set_caller_profile(&identity, Some(CallerProfile::new("p", "alice")));

        let state = portal.profiles.caller_profile(&identity).await;
        assert_eq!(state.data.flatten().map(|p| p.username), Some("alice".to_string()));
        assert_eq!(portal.backend.caller_profile_calls(), 0);

        portal.profiles.forget(&identity);
        assert_eq!(portal.profiles.peek_caller_profile(&identity).data, None);
    }

    #[tokio::test]
    async fn test_rename_invalidates_previous_username() {
        let backend = MockBackend::default();
        backend.add_profile(CallerProfile::new("p", "alice"));
        let portal = TestPortal::ready(backend).await;
        let identity = Identity::new("p");

        portal
            .profiles
            .set_caller_profile(&identity, Some(CallerProfile::new("p", "alice")));
        let before = portal.profiles.profile_by_username("alice").await;
        assert!(before.data.flatten().is_some());

        let renamed = CallerProfile::new("p", "alicia");
        portal.backend.add_profile(renamed.clone());
        portal.profiles.set_caller_profile(&identity, Some(renamed));

        let old = portal.profiles.profile_by_username("alice").await;
        assert_eq!(old.data, Some(None));
        let new = portal.profiles.require_profile_by_username("alicia").await.unwrap();
        assert_eq!(new.principal, Principal::new("p"));
    }

    #[tokio::test]
    async fn test_forget_clears_lookup_by_id() {
        let backend = MockBackend::default();
        backend.add_profile(CallerProfile::new("p", "alice"));
        let portal = TestPortal::ready(backend).await;
        let identity = Identity::new("p");

        let by_id = portal.profiles.profile_by_id(identity.principal()).await;
        assert!(by_id.data.flatten().is_some());
        portal.profiles.profile_by_username("alice").await;

        portal.profiles.forget(&identity);
        assert_eq!(portal.profiles.by_id.peek_state(identity.principal()).data, None);

        // The forgotten username is looked up again instead of served from cache.
        portal.backend.add_profile(CallerProfile::new("p", "alicia"));
        let old = portal.profiles.profile_by_username("alice").await;
        assert_eq!(old.data, Some(None));
    }
}
