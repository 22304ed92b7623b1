// Authentication types

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Connection settings for the OCP identity provider
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Base URL of the OCP host, e.g. https://us1-a.ocp.ai
    pub host: String,
    pub username: String,
    pub password: String,

    /// OAuth client id registered in the master realm
    pub client_id: String,

    /// Relative path used by `check_token` to probe the cached token
    pub probe_path: String,
}

impl AuthSettings {
    /// Build settings from OCP_* environment variables (loads .env if present)
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        use anyhow::Context;

        Ok(Self {
            host: lookup("OCP_HOST").context("OCP_HOST is required")?,
            username: lookup("OCP_USERNAME").context("OCP_USERNAME is required")?,
            password: lookup("OCP_PASSWORD").context("OCP_PASSWORD is required")?,
            client_id: lookup("OCP_CLIENT_ID").unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            probe_path: lookup("TOKEN_PROBE_PATH")
                .unwrap_or_else(|| DEFAULT_PROBE_PATH.to_string()),
        })
    }

    pub(crate) fn token_url(&self) -> String {
        format!(
            "{}/auth/realms/master/protocol/openid-connect/token",
            self.host.trim_end_matches('/')
        )
    }

    pub(crate) fn logout_url(&self) -> String {
        format!(
            "{}/auth/realms/master/protocol/openid-connect/logout",
            self.host.trim_end_matches('/')
        )
    }

    pub(crate) fn probe_url(&self) -> String {
        format!(
            "{}/{}",
            self.host.trim_end_matches('/'),
            self.probe_path.trim_start_matches('/')
        )
    }
}

pub const DEFAULT_CLIENT_ID: &str = "ocp";
pub const DEFAULT_PROBE_PATH: &str = "miniapps/api/apps?pageSize=1";

/// An issued access token together with its absolute expiry
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Where the cached credential stands at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    NoToken,
    Valid,
    Expired,
}

/// Cached credential owned by a single `AuthManager`
///
/// The access token and its expiry live in one `Option` so they are always
/// set and cleared together.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub access: Option<AccessToken>,
    pub refresh_token: Option<String>,
}

impl Credentials {
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        match &self.access {
            None => TokenState::NoToken,
            Some(access) if now < access.expires_at => TokenState::Valid,
            Some(_) => TokenState::Expired,
        }
    }

    /// Token usable at `now`, if any
    pub fn valid_token(&self, now: DateTime<Utc>) -> Option<String> {
        self.access
            .as_ref()
            .filter(|access| now < access.expires_at)
            .map(|access| access.token.clone())
    }

    /// Store a fresh token response received at `now`
    ///
    /// Fails without touching the cached credential when the expiry cannot
    /// be represented.
    pub fn apply(&mut self, data: TokenResponse, now: DateTime<Utc>) -> anyhow::Result<()> {
        let expires_at = Duration::try_seconds(data.expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| anyhow::anyhow!("expires_in out of range: {}", data.expires_in))?;

        self.access = Some(AccessToken {
            token: data.access_token,
            expires_at,
        });

        // Keep the previous refresh token unless the server issued a new one
        if let Some(refresh_token) = data.refresh_token {
            self.refresh_token = Some(refresh_token);
        }

        Ok(())
    }

    pub fn clear(&mut self) {
        self.access = None;
        self.refresh_token = None;
    }
}

/// Token endpoint response (password and refresh grants)
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

/// Result of a revocation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// Logout accepted; cached credential cleared
    Revoked,

    /// No refresh token cached, nothing was sent
    NothingToRevoke,

    /// Logout call failed; cached credential left as it was
    Failed { reason: String },
}
