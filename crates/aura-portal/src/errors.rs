//! Categorized portal errors
//!
//! Provides structured error types that enable:
//! - Categorized handling (connection vs authorization vs profile vs content)
//! - Recoverable full-screen states with retry actions
//! - Plain-English messages for known backend failure strings

use std::fmt;
use thiserror::Error;

/// Result alias for portal operations.
pub type Result<T, E = PortalError> = std::result::Result<T, E>;

// ============================================================================
// Error Categories
// ============================================================================

/// High-level error categories for frontend error handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Backend connectivity (often transient)
    Network,
    /// Authorization failures (not transient)
    Capability,
    /// Resource not found
    NotFound,
    /// Undisplayable content
    Content,
    /// Configuration errors (correctable by modifying settings)
    Config,
    /// General operation failures (catch-all)
    Operation,
}

impl ErrorCategory {
    /// Whether a retry may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network | Self::Operation)
    }

    /// Short label for display.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Network => "Network",
            Self::Capability => "Permission",
            Self::NotFound => "Not Found",
            Self::Content => "Content",
            Self::Config => "Config",
            Self::Operation => "Operation",
        }
    }

    /// Hint for the user on how to resolve this category of error.
    #[must_use]
    pub fn resolution_hint(&self) -> &'static str {
        match self {
            Self::Network => "Check your network connection and retry",
            Self::Capability => "This page requires additional permissions",
            Self::NotFound => "The requested resource could not be found",
            Self::Content => "The content could not be displayed",
            Self::Config => "Review your configuration settings",
            Self::Operation => "An unexpected error occurred, please try again",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ============================================================================
// Error Taxonomy
// ============================================================================

/// Backend connection failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Connection stayed in `Connecting` past the watchdog limit.
    #[error("connection timed out after {timeout_ms}ms")]
    Timeout {
        /// Watchdog limit that elapsed
        timeout_ms: u64,
    },
    /// The backend actor could not be constructed or reached.
    #[error("backend unreachable: {message}")]
    Unreachable {
        /// Raw failure message
        message: String,
    },
}

/// Authorization failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    /// Required role check failed.
    #[error("access denied: {required} required")]
    Denied {
        /// Description of the required role
        required: String,
    },
}

/// Profile lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    /// The profile query failed.
    #[error("profile fetch failed: {message}")]
    FetchFailed {
        /// Raw failure message
        message: String,
    },
    /// No profile exists for the requested key.
    #[error("profile not found: {key}")]
    NotFound {
        /// Principal or username that was looked up
        key: String,
    },
}

/// Content resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    /// The resource cannot be used (bad URL, empty payload).
    #[error("invalid resource: {reason}")]
    InvalidResource {
        /// Why the resource was rejected
        reason: String,
    },
    /// The payload could not be turned into displayable content.
    #[error("decode failed: {reason}")]
    DecodeFailed {
        /// Underlying failure
        reason: String,
    },
}

/// Top-level portal error.
///
/// `Clone` so a single in-flight fetch can hand the same failure to every
/// waiting subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortalError {
    /// Connection failure
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// Authorization failure
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    /// Profile failure
    #[error(transparent)]
    Profile(#[from] ProfileError),
    /// Content failure
    #[error(transparent)]
    Content(#[from] ContentError),
    /// A backend call raised an error
    #[error("backend call {operation} failed: {message}")]
    Backend {
        /// Backend operation name
        operation: String,
        /// Raw failure message
        message: String,
    },
    /// Invalid configuration
    #[error("invalid configuration: {message}")]
    Config {
        /// What is wrong
        message: String,
    },
}

impl PortalError {
    /// Create a backend call error.
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a connection timeout error.
    pub fn timeout(timeout_ms: u64) -> Self {
        ConnectionError::Timeout { timeout_ms }.into()
    }

    /// Create an unreachable-backend error.
    pub fn unreachable(message: impl Into<String>) -> Self {
        ConnectionError::Unreachable {
            message: message.into(),
        }
        .into()
    }

    /// Create an access denied error.
    pub fn denied(required: impl Into<String>) -> Self {
        AuthorizationError::Denied {
            required: required.into(),
        }
        .into()
    }

    /// Create a profile fetch error.
    pub fn profile_fetch(message: impl Into<String>) -> Self {
        ProfileError::FetchFailed {
            message: message.into(),
        }
        .into()
    }

    /// Create an invalid resource error.
    pub fn invalid_resource(reason: impl Into<String>) -> Self {
        ContentError::InvalidResource {
            reason: reason.into(),
        }
        .into()
    }

    /// Create a decode error.
    pub fn decode_failed(reason: impl Into<String>) -> Self {
        ContentError::DecodeFailed {
            reason: reason.into(),
        }
        .into()
    }

    /// Category used to pick the UI treatment.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection(_) => ErrorCategory::Network,
            Self::Authorization(_) => ErrorCategory::Capability,
            Self::Profile(ProfileError::NotFound { .. }) => ErrorCategory::NotFound,
            Self::Profile(ProfileError::FetchFailed { .. }) => ErrorCategory::Operation,
            Self::Content(_) => ErrorCategory::Content,
            Self::Backend { .. } => ErrorCategory::Operation,
            Self::Config { .. } => ErrorCategory::Config,
        }
    }

    /// Whether the UI should offer a retry action.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Authorization(_) | Self::Config { .. })
    }

    /// The underlying message without the taxonomy prefix.
    pub fn raw_message(&self) -> String {
        match self {
            Self::Connection(ConnectionError::Unreachable { message })
            | Self::Profile(ProfileError::FetchFailed { message })
            | Self::Backend { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Plain-English message for full-screen error states.
    pub fn humanized(&self) -> String {
        humanize_error_message(&self.raw_message())
    }
}

// ============================================================================
// Humanized Messages
// ============================================================================

/// Known backend failure substrings and the text shown instead.
///
/// Matched case-insensitively in order; the first hit wins.
const HUMANIZED_MESSAGES: &[(&[&str], &str)] = &[
    (
        &["failed to fetch", "networkerror", "network error", "unreachable", "connection refused"],
        "Unable to reach the network. Please check your internet connection and try again.",
    ),
    (
        &["timed out", "timeout"],
        "The request took too long to complete. Please try again.",
    ),
    (
        &["call was rejected", "rejected", "reject code"],
        "The request was rejected by the server. Please try again in a moment.",
    ),
    (
        &["unauthorized", "not authorized", "permission denied"],
        "You are not authorized to perform this action. Please log in again.",
    ),
    (
        &["not found", "does not exist"],
        "The requested information could not be found.",
    ),
    (
        &["out of cycles", "canister is stopped", "service unavailable"],
        "The service is temporarily unavailable. Please try again later.",
    ),
];

/// Map a raw backend failure message to plain English.
///
/// Falls back to the raw message when no known pattern matches.
pub fn humanize_error_message(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    HUMANIZED_MESSAGES
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|p| lowered.contains(p)))
        .map(|(_, text)| (*text).to_string())
        .unwrap_or_else(|| raw.to_string())
}
