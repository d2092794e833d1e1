//! Content visibility.
//!
//! Decides whether a viewer may see a profile's content. Pure and
//! synchronous; the follower relationship is supplied by the caller.

use crate::identity::{Identity, Principal};
use crate::role::EffectiveRole;
use crate::views::profile::{CallerProfile, ProfileVisibility};
use serde::{Deserialize, Serialize};

/// Why content is or is not visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityReason {
    /// Viewer owns the content
    OwnContent,
    /// Viewer is the super-admin
    SuperAdmin,
    /// Content is public
    Public,
    /// Private content, viewer follows the owner
    Follower,
    /// Private content, viewer does not follow the owner
    PrivateAccount,
    /// Owner is blocked
    Blocked,
}

/// Outcome of a visibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityDecision {
    /// Whether the content may be shown
    pub visible: bool,
    /// Why
    pub reason: VisibilityReason,
}

impl VisibilityDecision {
    fn allow(reason: VisibilityReason) -> Self {
        Self {
            visible: true,
            reason,
        }
    }

    fn deny(reason: VisibilityReason) -> Self {
        Self {
            visible: false,
            reason,
        }
    }
}

/// The viewer's relationship to the content owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerContext {
    /// Viewer's effective role
    pub role: EffectiveRole,
    /// Viewer owns the content
    pub is_self: bool,
    /// Viewer is the super-admin
    pub is_super_admin: bool,
    /// Viewer follows the owner
    pub is_follower: bool,
}

impl ViewerContext {
    /// Anonymous viewer.
    pub fn guest() -> Self {
        Self {
            role: EffectiveRole::Guest,
            is_self: false,
            is_super_admin: false,
            is_follower: false,
        }
    }
}

/// Whether a viewer may see content with `visibility`.
///
/// The viewer's role does not widen access; only ownership, the
/// super-admin principal, public visibility or following do.
pub fn can_view(
    viewer_role: EffectiveRole,
    viewer_is_self: bool,
    viewer_is_super_admin: bool,
    visibility: ProfileVisibility,
    viewer_is_follower: bool,
) -> bool {
    let viewer = ViewerContext {
        role: viewer_role,
        is_self: viewer_is_self,
        is_super_admin: viewer_is_super_admin,
        is_follower: viewer_is_follower,
    };
    visibility_reason(&viewer, visibility).visible
}

fn visibility_reason(viewer: &ViewerContext, visibility: ProfileVisibility) -> VisibilityDecision {
    if viewer.is_self {
        VisibilityDecision::allow(VisibilityReason::OwnContent)
    } else if viewer.is_super_admin {
        VisibilityDecision::allow(VisibilityReason::SuperAdmin)
    } else if visibility == ProfileVisibility::Public {
        VisibilityDecision::allow(VisibilityReason::Public)
    } else if viewer.is_follower {
        VisibilityDecision::allow(VisibilityReason::Follower)
    } else {
        VisibilityDecision::deny(VisibilityReason::PrivateAccount)
    }
}

/// Visibility rules bound to the configured super-admin.
#[derive(Debug, Clone, Default)]
pub struct VisibilityPolicy {
    super_admin: Option<Principal>,
}

impl VisibilityPolicy {
    /// Create a policy.
    pub fn new(super_admin: Option<Principal>) -> Self {
        Self { super_admin }
    }

    /// Describe `viewer` relative to `owner`.
    pub fn viewer_context(
        &self,
        viewer: Option<&Identity>,
        role: EffectiveRole,
        owner: &Principal,
        is_follower: bool,
    ) -> ViewerContext {
        let Some(viewer) = viewer else {
            return ViewerContext::guest();
        };
        ViewerContext {
            role,
            is_self: viewer.principal() == owner,
            is_super_admin: self.super_admin.as_ref() == Some(viewer.principal()),
            is_follower,
        }
    }

    /// Decide whether `viewer` may see `profile`'s content.
    pub fn decide(&self, viewer: &ViewerContext, profile: &CallerProfile) -> VisibilityDecision {
        if profile.blocked && !viewer.is_self && !viewer.is_super_admin {
            return VisibilityDecision::deny(VisibilityReason::Blocked);
        }
        let decision = visibility_reason(viewer, profile.visibility);
        if !decision.visible {
            tracing::trace!(owner = %profile.principal, reason = ?decision.reason, "content hidden");
        }
        decision
    }
}
