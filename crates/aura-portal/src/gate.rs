//! Access gate.
//!
//! Every protected screen renders exactly one [`GateState`], chosen from the
//! session, the connection lifecycle, the caller profile and (for role-gated
//! screens) the effective role. Resolution is a pure function over
//! [`GateInputs`]; [`AccessGate::evaluate`] gathers the inputs and issues the
//! profile query only when an identity exists.
//!
//! Conditions are checked in a fixed order, first match wins:
//!
//! | # | Condition                                             | State                |
//! |---|-------------------------------------------------------|----------------------|
//! | 1 | connecting, watchdog fired, identity present          | `ConnectionTimedOut` |
//! | 2 | connecting and (session restoring or profile pending) | `Bootstrapping`      |
//! | 3 | no identity                                           | `Unauthenticated`    |
//! | 4 | profile fetch failed                                  | `ProfileError`       |
//! | 5 | profile not settled yet                               | `AwaitingProfile`    |
//! | 6 | profile settled as absent                             | `ProfileMissing`     |
//! | 7 | role requirement not met                              | `AccessDenied`       |
//! | 8 | otherwise                                             | `Ready`              |

use crate::connection::{ConnectionLifecycle, ConnectionSnapshot};
use crate::errors::PortalError;
use crate::identity::{Identity, SessionSnapshot};
use crate::profiles::{ProfileQueries, ProfileState};
use crate::query::QueryStatus;
use crate::role::{EffectiveRole, RoleResolver};
use crate::views::profile::CallerProfile;
use std::fmt;

/// Role a screen requires beyond having a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredRole {
    /// Officers and admins
    OfficerOrAdmin,
    /// Admins only
    Admin,
}

impl RequiredRole {
    /// Whether `role` satisfies this requirement.
    pub fn allows(&self, role: EffectiveRole) -> bool {
        match self {
            Self::OfficerOrAdmin => role.is_staff(),
            Self::Admin => role == EffectiveRole::Admin,
        }
    }

    /// Human-readable requirement.
    pub fn description(&self) -> &'static str {
        match self {
            Self::OfficerOrAdmin => "officer or admin",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for RequiredRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Progress of the caller profile fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileFetch {
    /// Not fetched, or in flight with nothing settled
    Pending,
    /// Last fetch failed
    Failed(PortalError),
    /// Settled; `None` means the caller has no profile yet
    Settled(Option<CallerProfile>),
}

impl ProfileFetch {
    /// Derive fetch progress from a cached profile state.
    pub fn from_state(state: &ProfileState) -> Self {
        if state.status == QueryStatus::Error {
            let error = state
                .error
                .clone()
                .unwrap_or_else(|| PortalError::profile_fetch("profile fetch failed"));
            return Self::Failed(error);
        }
        match &state.data {
            Some(profile) => Self::Settled(profile.clone()),
            None => Self::Pending,
        }
    }

    /// Whether the fetch has an outcome.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Everything the gate decision depends on.
#[derive(Debug, Clone)]
pub struct GateInputs {
    /// Session snapshot
    pub session: SessionSnapshot,
    /// Connection snapshot
    pub connection: ConnectionSnapshot,
    /// Caller profile progress
    pub profile: ProfileFetch,
    /// Effective role, when resolved
    pub role: Option<EffectiveRole>,
}

/// What a protected screen should render.
#[derive(Debug, Clone, PartialEq)]
pub enum GateState {
    /// Backend still starting up
    Bootstrapping,
    /// Nobody logged in
    Unauthenticated,
    /// Backend connection is stuck
    ConnectionTimedOut {
        /// Timeout that fired
        error: PortalError,
    },
    /// Caller profile could not be loaded
    ProfileError {
        /// Humanized message
        message: String,
        /// Underlying error
        error: PortalError,
    },
    /// Caller profile is loading
    AwaitingProfile,
    /// Caller has not created a profile yet
    ProfileMissing,
    /// Admitted
    Ready {
        /// Caller profile
        profile: CallerProfile,
        /// Effective role, when resolved
        role: Option<EffectiveRole>,
    },
    /// Authenticated but lacking the required role
    AccessDenied {
        /// Requirement that was not met
        required: RequiredRole,
        /// Caller's effective role
        role: Option<EffectiveRole>,
        /// Denial carried to the screen
        error: PortalError,
    },
}

/// Recovery affordance offered next to a gate screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateAction {
    /// Reload the whole application
    Reload,
    /// Start a new connection attempt
    RetryConnection,
    /// Start the login flow
    Login,
    /// Open profile creation
    CreateProfile,
    /// Refetch the caller profile
    RetryProfile,
}

impl GateState {
    /// Whether the protected content may render.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Error behind a failure screen, if any.
    pub fn error(&self) -> Option<&PortalError> {
        match self {
            Self::ConnectionTimedOut { error }
            | Self::ProfileError { error, .. }
            | Self::AccessDenied { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Short state name for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bootstrapping => "bootstrapping",
            Self::Unauthenticated => "unauthenticated",
            Self::ConnectionTimedOut { .. } => "connection_timed_out",
            Self::ProfileError { .. } => "profile_error",
            Self::AwaitingProfile => "awaiting_profile",
            Self::ProfileMissing => "profile_missing",
            Self::Ready { .. } => "ready",
            Self::AccessDenied { .. } => "access_denied",
        }
    }

    /// Actions the screen for this state offers.
    pub fn actions(&self) -> &'static [GateAction] {
        match self {
            Self::ConnectionTimedOut { .. } => &[GateAction::Reload, GateAction::RetryConnection],
            Self::Unauthenticated => &[GateAction::Login],
            Self::ProfileError { .. } => &[GateAction::RetryProfile, GateAction::Reload],
            Self::ProfileMissing => &[GateAction::CreateProfile],
            _ => &[],
        }
    }

    /// Render this state through `renderer`.
    pub fn dispatch<R: GateRenderer + ?Sized>(&self, renderer: &R) -> R::Output {
        match self {
            Self::Bootstrapping | Self::AwaitingProfile => renderer.loading(),
            Self::Unauthenticated => renderer.login_prompt(),
            Self::ConnectionTimedOut { .. } => renderer.connection_timed_out(self.actions()),
            Self::ProfileError { message, .. } => renderer.profile_error(message, self.actions()),
            Self::ProfileMissing => renderer.profile_setup(),
            Self::Ready { profile, role } => renderer.content(profile, *role),
            Self::AccessDenied { required, .. } => renderer.access_denied(*required),
        }
    }
}

/// Frontend surface for gate screens.
///
/// Implemented once per frontend; [`GateState::dispatch`] picks the method.
pub trait GateRenderer {
    /// Rendered output
    type Output;

    /// Spinner shown while bootstrapping or awaiting the profile.
    fn loading(&self) -> Self::Output;
    /// Login prompt.
    fn login_prompt(&self) -> Self::Output;
    /// Stuck-connection screen.
    fn connection_timed_out(&self, actions: &[GateAction]) -> Self::Output;
    /// Profile fetch failure.
    fn profile_error(&self, message: &str, actions: &[GateAction]) -> Self::Output;
    /// Profile creation flow.
    fn profile_setup(&self) -> Self::Output;
    /// The protected content.
    fn content(&self, profile: &CallerProfile, role: Option<EffectiveRole>) -> Self::Output;
    /// Insufficient role.
    fn access_denied(&self, required: RequiredRole) -> Self::Output;
}

/// Resolve the gate state from its inputs.
pub fn resolve_gate_state(inputs: &GateInputs, required: Option<RequiredRole>) -> GateState {
    let has_identity = inputs.session.identity.is_some();
    let connection = &inputs.connection;

    if connection.has_timed_out() && has_identity {
        return GateState::ConnectionTimedOut {
            error: PortalError::timeout(connection.timeout_ms),
        };
    }
    if connection.is_fetching() && (inputs.session.initializing || !inputs.profile.is_settled()) {
        return GateState::Bootstrapping;
    }
    if !has_identity {
        return GateState::Unauthenticated;
    }

    let profile = match &inputs.profile {
        ProfileFetch::Failed(error) => {
            return GateState::ProfileError {
                message: error.humanized(),
                error: error.clone(),
            };
        }
        ProfileFetch::Pending => return GateState::AwaitingProfile,
        ProfileFetch::Settled(None) => return GateState::ProfileMissing,
        ProfileFetch::Settled(Some(profile)) => profile,
    };

    match (required, inputs.role) {
        (None, role) => GateState::Ready {
            profile: profile.clone(),
            role,
        },
        // Role still resolving; denying now would flash the denied screen
        (Some(_), None) => GateState::AwaitingProfile,
        (Some(required), Some(role)) if required.allows(role) => GateState::Ready {
            profile: profile.clone(),
            role: Some(role),
        },
        (Some(required), Some(role)) => GateState::AccessDenied {
            required,
            role: Some(role),
            error: PortalError::denied(required.description()),
        },
    }
}

/// Gathers gate inputs from the live portal components.
#[derive(Clone)]
pub struct AccessGate {
    connection: ConnectionLifecycle,
    profiles: ProfileQueries,
    roles: RoleResolver,
}

impl AccessGate {
    /// Create a gate over shared portal components.
    pub fn new(connection: ConnectionLifecycle, profiles: ProfileQueries, roles: RoleResolver) -> Self {
        Self {
            connection,
            profiles,
            roles,
        }
    }

    /// Decide what a protected screen renders for `session`.
    ///
    /// Anonymous sessions never query the backend. While connecting, cached
    /// values are used and nothing is fetched.
    pub async fn evaluate(&self, session: &SessionSnapshot, required: Option<RequiredRole>) -> GateState {
        let (profile, role) = match &session.identity {
            None => (ProfileFetch::Pending, None),
            Some(identity) => {
                let state = self.profiles.caller_profile(identity).await;
                let profile = ProfileFetch::from_state(&state);
                let role = match &profile {
                    ProfileFetch::Settled(Some(_)) => self.roles.role(Some(identity)).await.role,
                    _ => self.roles.peek_role(Some(identity)).role,
                };
                (profile, role)
            }
        };

        let inputs = GateInputs {
            session: session.clone(),
            connection: self.connection.snapshot(),
            profile,
            role,
        };
        let state = resolve_gate_state(&inputs, required);
        tracing::debug!(
            state = state.label(),
            required = ?required,
            connection = ?inputs.connection.state,
            "access gate evaluated"
        );
        state
    }

    /// Refetch the caller profile and its dependent role after a profile error.
    pub async fn retry_profile(&self, identity: &Identity) {
        self.profiles.invalidate_caller(identity);
        self.roles.invalidate(identity);
        self.profiles.caller_profile(identity).await;
    }
}

impl fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGate")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use crate::testing::{MockBackend, TestPortal};

    fn profile() -> CallerProfile {
        CallerProfile::new("p", "alice")
    }

    fn inputs(
        identity: bool,
        connection: ConnectionState,
        timed_out: bool,
        profile: ProfileFetch,
        role: Option<EffectiveRole>,
    ) -> GateInputs {
        GateInputs {
            session: SessionSnapshot {
                identity: identity.then(|| Identity::new("p")),
                initializing: false,
            },
            connection: ConnectionSnapshot {
                state: connection,
                timed_out,
                attempt: 1,
                last_error: None,
                timeout_ms: 15_000,
            },
            profile,
            role,
        }
    }

    #[test]
    fn test_priority_order() {
        use ConnectionState::*;

        let timed_out = inputs(true, Connecting, true, ProfileFetch::Pending, None);
        assert!(matches!(
            resolve_gate_state(&timed_out, None),
            GateState::ConnectionTimedOut { .. }
        ));

        // Without an identity a stuck connection is just bootstrapping
        let anon_stuck = inputs(false, Connecting, true, ProfileFetch::Pending, None);
        assert_eq!(resolve_gate_state(&anon_stuck, None), GateState::Bootstrapping);

        let anon = inputs(false, Ready, false, ProfileFetch::Pending, None);
        assert_eq!(resolve_gate_state(&anon, None), GateState::Unauthenticated);

        let failed = inputs(
            true,
            Ready,
            false,
            ProfileFetch::Failed(PortalError::profile_fetch("Failed to fetch")),
            None,
        );
        assert!(matches!(
            resolve_gate_state(&failed, None),
            GateState::ProfileError { .. }
        ));

        let pending = inputs(true, Ready, false, ProfileFetch::Pending, None);
        assert_eq!(resolve_gate_state(&pending, None), GateState::AwaitingProfile);

        let missing = inputs(true, Ready, false, ProfileFetch::Settled(None), None);
        assert_eq!(resolve_gate_state(&missing, None), GateState::ProfileMissing);

        let ready = inputs(true, Ready, false, ProfileFetch::Settled(Some(profile())), None);
        assert!(resolve_gate_state(&ready, None).is_ready());
    }

    #[test]
    fn test_settled_profile_survives_reconnect() {
        let reconnecting = inputs(
            true,
            ConnectionState::Connecting,
            false,
            ProfileFetch::Settled(Some(profile())),
            Some(EffectiveRole::User),
        );
        assert!(resolve_gate_state(&reconnecting, None).is_ready());

        let mut restoring = reconnecting.clone();
        restoring.session.initializing = true;
        assert_eq!(resolve_gate_state(&restoring, None), GateState::Bootstrapping);
    }

    #[test]
    fn test_role_requirements() {
        let with_role = |role| {
            inputs(
                true,
                ConnectionState::Ready,
                false,
                ProfileFetch::Settled(Some(profile())),
                Some(role),
            )
        };

        let officer = with_role(EffectiveRole::Officer);
        assert!(resolve_gate_state(&officer, Some(RequiredRole::OfficerOrAdmin)).is_ready());
        assert_eq!(
            resolve_gate_state(&officer, Some(RequiredRole::Admin)),
            GateState::AccessDenied {
                required: RequiredRole::Admin,
                role: Some(EffectiveRole::Officer),
                error: PortalError::denied("admin"),
            }
        );

        let user = with_role(EffectiveRole::User);
        assert!(matches!(
            resolve_gate_state(&user, Some(RequiredRole::OfficerOrAdmin)),
            GateState::AccessDenied { .. }
        ));
        assert!(resolve_gate_state(&user, None).is_ready());
    }

    #[test]
    fn test_profile_error_is_humanized() {
        let failed = inputs(
            true,
            ConnectionState::Ready,
            false,
            ProfileFetch::Failed(PortalError::profile_fetch("TypeError: Failed to fetch")),
            None,
        );
        let GateState::ProfileError { message, .. } = resolve_gate_state(&failed, None) else {
            panic!("expected profile error");
        };
        assert!(!message.contains("TypeError"));
    }

    #[test]
    fn test_failure_states_carry_typed_errors() {
        use crate::errors::{AuthorizationError, ConnectionError, ErrorCategory};

        let timed_out = inputs(true, ConnectionState::Connecting, true, ProfileFetch::Pending, None);
        let state = resolve_gate_state(&timed_out, None);
        let error = state.error().expect("timeout error");
        assert_eq!(
            error,
            &PortalError::Connection(ConnectionError::Timeout { timeout_ms: 15_000 })
        );
        assert_eq!(error.category(), ErrorCategory::Network);
        assert!(error.is_recoverable());

        let user = inputs(
            true,
            ConnectionState::Ready,
            false,
            ProfileFetch::Settled(Some(profile())),
            Some(EffectiveRole::User),
        );
        let state = resolve_gate_state(&user, Some(RequiredRole::OfficerOrAdmin));
        let error = state.error().expect("denial error");
        assert_eq!(
            error,
            &PortalError::Authorization(AuthorizationError::Denied {
                required: "officer or admin".into(),
            })
        );
        assert_eq!(error.category(), ErrorCategory::Capability);
        assert!(!error.is_recoverable());

        assert!(resolve_gate_state(&user, None).error().is_none());
    }

    fn timed_out_state() -> GateState {
        GateState::ConnectionTimedOut {
            error: PortalError::timeout(15_000),
        }
    }

    #[test]
    fn test_actions() {
        assert_eq!(
            timed_out_state().actions(),
            &[GateAction::Reload, GateAction::RetryConnection]
        );
        assert_eq!(GateState::ProfileMissing.actions(), &[GateAction::CreateProfile]);
        assert!(GateState::Bootstrapping.actions().is_empty());
    }

    struct Labels;

    impl GateRenderer for Labels {
        type Output = String;

        fn loading(&self) -> String {
            "loading".into()
        }
        fn login_prompt(&self) -> String {
            "login".into()
        }
        fn connection_timed_out(&self, actions: &[GateAction]) -> String {
            format!("timeout:{}", actions.len())
        }
        fn profile_error(&self, message: &str, _: &[GateAction]) -> String {
            format!("error:{message}")
        }
        fn profile_setup(&self) -> String {
            "setup".into()
        }
        fn content(&self, profile: &CallerProfile, _: Option<EffectiveRole>) -> String {
            format!("content:{}", profile.username)
        }
        fn access_denied(&self, required: RequiredRole) -> String {
            format!("denied:{required}")
        }
    }

    #[test]
    fn test_dispatch() {
        assert_eq!(GateState::Bootstrapping.dispatch(&Labels), "loading");
        assert_eq!(GateState::AwaitingProfile.dispatch(&Labels), "loading");
        assert_eq!(timed_out_state().dispatch(&Labels), "timeout:2");
        let ready = GateState::Ready {
            profile: profile(),
            role: None,
        };
        assert_eq!(ready.dispatch(&Labels), "content:alice");
        let denied = GateState::AccessDenied {
            required: RequiredRole::Admin,
            role: Some(EffectiveRole::User),
            error: PortalError::denied("admin"),
        };
        assert_eq!(denied.dispatch(&Labels), "denied:admin");
    }

    #[tokio::test]
    async fn test_anonymous_visitor_issues_no_profile_query() {
        let portal = TestPortal::ready(MockBackend::default()).await;
        let state = portal.gate.evaluate(&SessionSnapshot::anonymous(), None).await;
        assert_eq!(state, GateState::Unauthenticated);
        assert_eq!(portal.backend.caller_profile_calls(), 0);
        assert_eq!(portal.backend.admin_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_profile_routes_to_setup() {
        let portal = TestPortal::ready(MockBackend::default()).await;
        let session = SessionSnapshot::authenticated(Identity::new("p"));
        assert_eq!(portal.gate.evaluate(&session, None).await, GateState::ProfileMissing);
    }

    #[tokio::test]
    async fn test_officer_passes_staff_gate() {
        let backend = MockBackend::default();
        backend.set_admin(false);
        backend.set_caller_profile(Some(profile().with_role("officer")));
        let portal = TestPortal::ready(backend).await;

        let session = SessionSnapshot::authenticated(Identity::new("p"));
        let state = portal
            .gate
            .evaluate(&session, Some(RequiredRole::OfficerOrAdmin))
            .await;
        assert_eq!(
            state,
            GateState::Ready {
                profile: profile().with_role("officer"),
                role: Some(EffectiveRole::Officer),
            }
        );
    }

    #[tokio::test]
    async fn test_connecting_issues_no_profile_query() {
        let portal = TestPortal::connecting(MockBackend::default());
        let session = SessionSnapshot::authenticated(Identity::new("p"));
        assert_eq!(portal.gate.evaluate(&session, None).await, GateState::Bootstrapping);
        assert_eq!(portal.backend.caller_profile_calls(), 0);
    }

    #[tokio::test]
    async fn test_profile_error_then_retry() {
        let backend = MockBackend::default();
        backend.fail_caller_profile("Failed to fetch");
        let portal = TestPortal::ready(backend).await;
        let identity = Identity::new("p");
        let session = SessionSnapshot::authenticated(identity.clone());

        let state = portal.gate.evaluate(&session, None).await;
        assert!(matches!(state, GateState::ProfileError { .. }));
        assert_eq!(state.actions(), &[GateAction::RetryProfile, GateAction::Reload]);

        portal.backend.set_caller_profile(Some(profile()));
        portal.gate.retry_profile(&identity).await;
        assert!(portal.gate.evaluate(&session, None).await.is_ready());
    }
}
