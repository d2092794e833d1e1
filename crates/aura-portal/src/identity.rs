//! Caller identity and the login session.
//!
//! The session owns the [`Identity`]: it is created on login and dropped on
//! logout. Nothing here is persisted.

use crate::reactive::{Dynamic, Subscription};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable opaque identifier for an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Principal(String);

impl Principal {
    /// Wrap a textual principal.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Credential of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    principal: Principal,
}

impl Identity {
    /// Identity for the given principal.
    pub fn new(principal: impl Into<Principal>) -> Self {
        Self {
            principal: principal.into(),
        }
    }

    /// The caller's principal.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Authenticated identity, `None` for anonymous callers.
    pub identity: Option<Identity>,
    /// True while the auth client restores a previous login.
    pub initializing: bool,
}

impl SessionSnapshot {
    /// Anonymous, settled session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Settled session for `identity`.
    pub fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            initializing: false,
        }
    }

    /// Whether a caller is logged in.
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

/// Login session shared by all portal components.
#[derive(Debug, Clone)]
pub struct Session {
    state: Dynamic<SessionSnapshot>,
}

impl Session {
    /// A session that is still restoring a previous login.
    pub fn new() -> Self {
        Self {
            state: Dynamic::new(SessionSnapshot {
                identity: None,
                initializing: true,
            }),
        }
    }

    /// Current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.get()
    }

    /// Current identity, if any.
    pub fn identity(&self) -> Option<Identity> {
        self.state.with(|s| s.identity.clone())
    }

    /// Observe session changes.
    pub fn subscribe(&self) -> Subscription<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Finish restoring: `restored` is the identity recovered from the auth client.
    pub fn restored(&self, restored: Option<Identity>) {
        tracing::debug!(authenticated = restored.is_some(), "session restored");
        self.state.set(SessionSnapshot {
            identity: restored,
            initializing: false,
        });
    }

    /// Record a completed login.
    pub fn login(&self, identity: Identity) {
        tracing::info!(principal = %identity.principal(), "caller logged in");
        self.state.set(SessionSnapshot::authenticated(identity));
    }

    /// Drop the identity. Returns the identity that was logged out.
    pub fn logout(&self) -> Option<Identity> {
        let previous = self.state.modify(|s| {
            s.initializing = false;
            s.identity.take()
        });
        if let Some(identity) = &previous {
            tracing::info!(principal = %identity.principal(), "caller logged out");
        }
        previous
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
