//! Portal configuration.
//!
//! A single [`PortalConfig`] is injected into every component, so constants
//! such as the super-admin principal live in exactly one place.
//!
//! Sources, applied in order: defaults, a TOML file, `AURA_PORTAL_*`
//! environment variables. Call [`PortalConfig::validate`] after merging.

use crate::errors::{PortalError, Result};
use crate::query::QueryOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default connection watchdog limit.
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 15_000;
/// Default role staleness window.
pub const DEFAULT_ROLE_STALE_MS: u64 = 30_000;
/// Default profile staleness window.
pub const DEFAULT_PROFILE_STALE_MS: u64 = 30_000;
/// Default retention for idle cache entries.
pub const DEFAULT_RETENTION_MS: u64 = 300_000;
/// Queries retry at most once.
pub const MAX_QUERY_RETRIES: u32 = 1;
/// Direct URLs must be shorter than this.
pub const DEFAULT_MAX_DIRECT_URL_LEN: usize = 2_000;
/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "AURA_PORTAL_";

/// Cache policy for one family of queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryPolicy {
    /// How long a successful value counts as fresh.
    pub stale_ms: u64,
    /// How long an idle entry is kept before collection.
    pub retention_ms: u64,
    /// Extra attempts after a failed fetch.
    pub retries: u32,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            stale_ms: 0,
            retention_ms: DEFAULT_RETENTION_MS,
            retries: MAX_QUERY_RETRIES,
        }
    }
}

impl QueryPolicy {
    /// Build per-call options from this policy.
    pub fn options(&self, enabled: bool) -> QueryOptions {
        QueryOptions {
            stale_ms: self.stale_ms,
            retention_ms: self.retention_ms,
            enabled,
            retries: self.retries,
        }
    }
}

/// Portal configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Principal that is always admin and can view every profile.
    pub super_admin_principal: Option<String>,
    /// Watchdog limit for the `Connecting` state.
    pub connection_timeout_ms: u64,
    /// Cache policy for effective roles.
    pub role_query: QueryPolicy,
    /// Cache policy for profile lookups.
    pub profile_query: QueryPolicy,
    /// Direct image URLs must be shorter than this.
    pub max_direct_url_len: usize,
    /// Default `tracing` filter directive.
    pub log_level: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            super_admin_principal: None,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
            role_query: QueryPolicy {
                stale_ms: DEFAULT_ROLE_STALE_MS,
                retention_ms: DEFAULT_RETENTION_MS,
                retries: MAX_QUERY_RETRIES,
            },
            profile_query: QueryPolicy {
                stale_ms: DEFAULT_PROFILE_STALE_MS,
                retention_ms: DEFAULT_RETENTION_MS,
                retries: MAX_QUERY_RETRIES,
            },
            max_direct_url_len: DEFAULT_MAX_DIRECT_URL_LEN,
            log_level: "info".to_string(),
        }
    }
}

impl PortalConfig {
    /// Defaults with the given super-admin principal.
    pub fn with_super_admin(principal: impl Into<String>) -> Self {
        Self {
            super_admin_principal: Some(principal.into()),
            ..Self::default()
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PortalError::config(format!("invalid TOML: {e}")))
    }

    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PortalError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `AURA_PORTAL_*` overrides from the process environment.
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `AURA_PORTAL_*` overrides from an explicit variable list.
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            self.set_from_string(&name.to_lowercase(), value.as_ref())?;
        }
        Ok(())
    }

    /// Set a single value by key name.
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "super_admin_principal" | "super_admin" => {
                self.super_admin_principal = Some(value.trim().to_string());
            }
            "connection_timeout_ms" => self.connection_timeout_ms = parse_number(key, value)?,
            "role_stale_ms" => self.role_query.stale_ms = parse_number(key, value)?,
            "role_retention_ms" => self.role_query.retention_ms = parse_number(key, value)?,
            "profile_stale_ms" => self.profile_query.stale_ms = parse_number(key, value)?,
            "profile_retention_ms" => self.profile_query.retention_ms = parse_number(key, value)?,
            "max_direct_url_len" => self.max_direct_url_len = parse_number(key, value)?,
            "log_level" => self.log_level = value.to_string(),
            other => {
                tracing::debug!(key = other, "ignoring unknown portal config key");
            }
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.connection_timeout_ms == 0 {
            return Err(PortalError::config("connection_timeout_ms must be positive"));
        }
        if self.max_direct_url_len == 0 {
            return Err(PortalError::config("max_direct_url_len must be positive"));
        }
        if let Some(principal) = &self.super_admin_principal {
            if principal.trim().is_empty() {
                return Err(PortalError::config("super_admin_principal must not be empty"));
            }
        }
        for (name, policy) in [("role_query", &self.role_query), ("profile_query", &self.profile_query)] {
            if policy.retries > MAX_QUERY_RETRIES {
                return Err(PortalError::config(format!(
                    "{name}.retries must be at most {MAX_QUERY_RETRIES}"
                )));
            }
            if policy.retention_ms < policy.stale_ms {
                return Err(PortalError::config(format!(
                    "{name}.retention_ms must not be shorter than stale_ms"
                )));
            }
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PortalError::config(format!("{key} expects a number, got {value:?}")))
}
