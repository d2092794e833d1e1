//! # Profile View State

use crate::identity::Principal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role stored on a profile.
///
/// Unknown values are kept verbatim so newer backends round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum ProfileRole {
    /// Administrator
    Admin,
    /// Officer (moderation)
    Officer,
    /// Regular user
    #[default]
    User,
    /// Any role this client does not know about
    Other(String),
}

impl ProfileRole {
    /// Wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::Officer => "officer",
            Self::User => "user",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for ProfileRole {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Self::Admin,
            "officer" => Self::Officer,
            "user" => Self::User,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for ProfileRole {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ProfileRole> for String {
    fn from(value: ProfileRole) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ProfileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who may see a profile's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfileVisibility {
    /// Everyone
    #[default]
    Public,
    /// Followers only
    Private,
}

/// Account verification progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VerificationState {
    /// Not verified
    #[default]
    Unverified,
    /// Verification requested
    Pending,
    /// Verified
    Verified,
}

/// A caller's profile as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerProfile {
    /// Owner principal
    pub principal: Principal,
    /// Unique handle
    pub username: String,
    /// Display name
    pub display_name: String,
    /// Free-form biography
    #[serde(default)]
    pub bio: String,
    /// Avatar blob reference, if any
    #[serde(default)]
    pub avatar: Option<String>,
    /// Contact email
    #[serde(default)]
    pub email: Option<String>,
    /// Stored role
    #[serde(default)]
    pub role: ProfileRole,
    /// Verification state
    #[serde(default)]
    pub verification: VerificationState,
    /// Number of followers
    #[serde(default)]
    pub followers_count: u64,
    /// Number of accounts followed
    #[serde(default)]
    pub following_count: u64,
    /// Content visibility
    #[serde(default)]
    pub visibility: ProfileVisibility,
    /// Account blocked by moderation
    #[serde(default)]
    pub blocked: bool,
}

impl CallerProfile {
    /// Minimal public profile with a `user` role.
    pub fn new(principal: impl Into<Principal>, username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            principal: principal.into(),
            display_name: username.clone(),
            username,
            bio: String::new(),
            avatar: None,
            email: None,
            role: ProfileRole::User,
            verification: VerificationState::Unverified,
            followers_count: 0,
            following_count: 0,
            visibility: ProfileVisibility::Public,
            blocked: false,
        }
    }

    /// Set the stored role.
    pub fn with_role(mut self, role: impl Into<ProfileRole>) -> Self {
        self.role = role.into();
        self
    }

    /// Set the visibility.
    pub fn with_visibility(mut self, visibility: ProfileVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Whether only followers can see this profile's content.
    pub fn is_private(&self) -> bool {
        self.visibility == ProfileVisibility::Private
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(ProfileRole::from("admin"), ProfileRole::Admin);
        assert_eq!(ProfileRole::from("Officer"), ProfileRole::Officer);
        assert_eq!(ProfileRole::from("user"), ProfileRole::User);
        assert_eq!(
            ProfileRole::from("moderator"),
            ProfileRole::Other("moderator".to_string())
        );
    }

    #[test]
    fn test_profile_json_shape() {
        let json = r#"{
            "principal": "abc",
            "username": "ada",
            "displayName": "Ada",
            "role": "officer",
            "visibility": "private",
            "followersCount": 3
        }"#;
        let profile: CallerProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.role, ProfileRole::Officer);
        assert!(profile.is_private());
        assert_eq!(profile.followers_count, 3);
        assert!(!profile.blocked);

        let back = serde_json::to_value(&profile).unwrap();
        assert_eq!(back["role"], "officer");
        assert_eq!(back["displayName"], "Ada");
    }
}
