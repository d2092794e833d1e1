//! Aura Portal - Client-Side Access Layer
//!
//! This crate decides, for every screen a frontend renders, whether the
//! current caller may see it and what content is visible once admitted.
//! Feeds, messaging and admin panels are external collaborators that render
//! whatever this layer resolves.
//!
//! # Components
//!
//! ```text
//! ConnectionLifecycle ──┐
//!                       ├──► QueryCache ──► RoleResolver ──┐
//! PortalBackend ────────┘        │                         ├──► AccessGate
//!                                └──► ProfileQueries ──────┘
//!
//! VisibilityPolicy  (pure, synchronous)
//! ResourceResolver  (async, per image)
//! ```
//!
//! - [`connection`]: backend readiness and stuck-initialization detection
//! - [`query`]: keyed single-flight memoization with placeholder retention
//! - [`role`]: effective role through a failure-tolerant fallback chain
//! - [`gate`]: the access gate state machine and render-by-state dispatcher
//! - [`visibility`]: private accounts, blocking and following
//! - [`resource`]: opaque image handles to leak-free displayable URLs
//!
//! # Example
//!
//! ```ignore
//! use aura_portal::{PortalConfig, PortalCore, RequiredRole};
//!
//! let core = PortalCore::new(PortalConfig::default(), backend, object_urls)?;
//! core.login(identity);
//! core.connect(build_actor()).await?;
//!
//! match core.evaluate_gate(Some(RequiredRole::OfficerOrAdmin)).await {
//!     GateState::Ready { .. } => render_admin_panel(),
//!     other => render_gate_screen(&other),
//! }
//! ```

pub mod backend;
pub mod config;
pub mod connection;
pub mod core;
pub mod errors;
pub mod gate;
pub mod identity;
pub mod profiles;
pub mod query;
pub mod reactive;
pub mod resource;
pub mod role;
#[cfg(test)]
mod testing;
#[cfg(feature = "telemetry")]
pub mod telemetry;
pub mod time;
pub mod views;
pub mod visibility;

pub use backend::PortalBackend;
pub use config::{PortalConfig, QueryPolicy};
pub use connection::{ConnectionLifecycle, ConnectionSnapshot, ConnectionState};
pub use crate::core::PortalCore;
pub use errors::{
    humanize_error_message, AuthorizationError, ConnectionError, ContentError, ErrorCategory,
    PortalError, ProfileError, Result,
};
pub use gate::{
    resolve_gate_state, AccessGate, GateAction, GateInputs, GateRenderer, GateState,
    ProfileFetch, RequiredRole,
};
pub use identity::{Identity, Principal, Session, SessionSnapshot};
pub use profiles::ProfileQueries;
pub use query::{QueryCache, QueryOptions, QueryState, QueryStatus};
pub use reactive::{Dynamic, Subscription};
pub use resource::{
    BlobHandle, ImageMime, ImageState, ImageView, InMemoryObjectUrls, ObjectUrl,
    ObjectUrlFactory, ResourceResolver,
};
pub use role::{EffectiveRole, RoleResolver, RoleView};
pub use time::{ClockEffects, ManualClock, SystemClock};
pub use views::profile::{CallerProfile, ProfileRole, ProfileVisibility, VerificationState};
pub use visibility::{can_view, ViewerContext, VisibilityDecision, VisibilityPolicy, VisibilityReason};
