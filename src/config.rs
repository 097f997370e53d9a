//! Configuration loading and management.
//!
//! Loads configuration from embedded config.toml, an optional user config file,
//! and environment variable overrides, in that order of precedence.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::secure::SecureString;

/// Embedded configuration file content.
const CONFIG_TOML: &str = include_str!("../config.toml");

/// User config file name inside the platform config directory.
const USER_CONFIG_FILE: &str = "config.toml";

const PLACEHOLDER_TENANT: &str = "YOUR_TENANT.onmicrosoft.com";
const PLACEHOLDER_CLIENT_ID: &str = "YOUR_CLIENT_ID";
const PLACEHOLDER_CLIENT_SECRET: &str = "YOUR_CLIENT_SECRET";

/// Upper bound for `token.refresh_before_expiry_seconds` (one day).
const MAX_REFRESH_BEFORE_EXPIRY_SECONDS: u64 = 86_400;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub tenant: TenantConfig,
    pub authority: AuthorityConfig,
    pub graph: GraphConfig,
    pub token: TokenConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecureString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorityConfig {
    pub endpoint: String,
    pub resource_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    pub base_url: String,
    pub api_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub cache: bool,
    pub refresh_before_expiry_seconds: u64,
}

/// Everything needed to authenticate against and address one directory tenant.
///
/// Built once from [`Config`] and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecureString,
    /// Authority base, e.g. `https://login.microsoftonline.com/`.
    pub authority_endpoint: String,
    /// Resource the token is requested for, e.g. `https://graph.windows.net/`.
    pub resource_id: String,
    /// Directory API base, e.g. `https://graph.windows.net/`.
    pub api_base_url: String,
    pub api_version: String,
}

impl TenantContext {
    /// OAuth2 v1 token endpoint for this tenant.
    pub fn token_url(&self) -> String {
        format!("{}{}/oauth2/token", self.authority_endpoint, self.tenant_id)
    }
}

impl Config {
    /// Load configuration.
    ///
    /// `user_path` is an explicit config file and must exist; without it the
    /// platform config directory is consulted and silently skipped when absent.
    pub fn load(user_path: Option<&Path>) -> Result<Self> {
        let mut merged: toml::Value =
            toml::from_str(CONFIG_TOML).context("Failed to parse embedded config.toml")?;

        let user_file = match user_path {
            Some(path) => Some(path.to_path_buf()),
            None => default_user_config_path().filter(|p| p.exists()),
        };

        if let Some(path) = user_file {
            debug!("Loading user configuration from {:?}", path);
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let overlay: toml::Value = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            merge_toml(&mut merged, overlay);
        }

        let mut config: Config = merged
            .try_into()
            .context("Invalid configuration structure")?;

        // Apply environment variable overrides
        config.apply_overrides(|key| env::var(key).ok());

        // Validate required fields
        config.validate()?;

        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(tenant) = var("B2C_TENANT") {
            self.tenant.tenant_id = tenant;
        }

        if let Some(client_id) = var("B2C_CLIENT_ID") {
            self.tenant.client_id = client_id;
        }

        if let Some(client_secret) = var("B2C_CLIENT_SECRET") {
            self.tenant.client_secret = SecureString::new(client_secret);
        }

        if let Some(authority) = var("B2C_AUTHORITY") {
            self.authority.endpoint = authority;
        }

        if let Some(endpoint) = var("B2C_GRAPH_ENDPOINT") {
            self.graph.base_url = endpoint;
        }

        if let Some(version) = var("B2C_GRAPH_API_VERSION") {
            self.graph.api_version = version;
        }

        if let Some(cache) = var("B2C_TOKEN_CACHE") {
            self.token.cache = matches!(cache.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// Validate that required configuration is present.
    pub fn validate(&self) -> Result<()> {
        if self.tenant.tenant_id.is_empty() || self.tenant.tenant_id == PLACEHOLDER_TENANT {
            anyhow::bail!(
                "B2C tenant not configured. Set B2C_TENANT environment variable \
                 or tenant.tenant_id in your config file"
            );
        }

        if self.tenant.client_id.is_empty() || self.tenant.client_id == PLACEHOLDER_CLIENT_ID {
            anyhow::bail!(
                "B2C client_id not configured. Set B2C_CLIENT_ID environment variable \
                 or tenant.client_id in your config file"
            );
        }

        if self.tenant.client_secret.is_empty()
            || self.tenant.client_secret.as_str() == PLACEHOLDER_CLIENT_SECRET
        {
            anyhow::bail!(
                "B2C client_secret not configured. Set B2C_CLIENT_SECRET environment variable \
                 or tenant.client_secret in your config file"
            );
        }

        if self.graph.api_version.is_empty() {
            anyhow::bail!("graph.api_version must not be empty");
        }

        if self.token.refresh_before_expiry_seconds > MAX_REFRESH_BEFORE_EXPIRY_SECONDS {
            anyhow::bail!(
                "token.refresh_before_expiry_seconds must be at most {}, got {}",
                MAX_REFRESH_BEFORE_EXPIRY_SECONDS,
                self.token.refresh_before_expiry_seconds
            );
        }

        validate_base_url("authority.endpoint", &self.authority.endpoint)?;
        validate_base_url("graph.base_url", &self.graph.base_url)?;

        Ok(())
    }

    /// Build the immutable tenant context used by the directory client.
    pub fn tenant_context(&self) -> TenantContext {
        TenantContext {
            tenant_id: self.tenant.tenant_id.clone(),
            client_id: self.tenant.client_id.clone(),
            client_secret: self.tenant.client_secret.clone(),
            authority_endpoint: self.authority.endpoint.clone(),
            resource_id: self.authority.resource_id.clone(),
            api_base_url: self.graph.base_url.clone(),
            api_version: self.graph.api_version.clone(),
        }
    }
}

/// Get the path to the user config file.
///
/// Returns `~/.config/b2c-graph/config.toml` on Linux.
pub fn default_user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "b2c-graph").map(|dirs| dirs.config_dir().join(USER_CONFIG_FILE))
}

/// URLs are concatenated with the tenant, so they must end in `/`.
fn validate_base_url(key: &str, value: &str) -> Result<()> {
    Url::parse(value).with_context(|| format!("{key} is not a valid URL: {value}"))?;
    if !value.ends_with('/') {
        anyhow::bail!("{key} must end with '/': {value}");
    }
    Ok(())
}

/// Recursively merge `overlay` into `base`; overlay values win.
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
