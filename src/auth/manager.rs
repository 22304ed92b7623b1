use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::clock::{Clock, SystemClock};
use super::grant;
use super::types::{AuthSettings, Credentials, RevokeOutcome, TokenState};

/// Authentication manager
/// Owns the OCP credential and serializes every exchange that mutates it
pub struct AuthManager {
    /// Identity provider settings, fixed at construction
    settings: AuthSettings,

    /// Cached token/refresh token/expiry
    credentials: RwLock<Credentials>,

    /// HTTP client for token endpoint and probe requests
    client: Client,

    clock: Arc<dyn Clock>,
}

impl AuthManager {
    /// Create a new AuthManager. No token is requested until first use.
    pub fn new(settings: AuthSettings, request_timeout: Duration) -> Result<Self> {
        Self::with_clock(settings, request_timeout, Arc::new(SystemClock))
    }

    /// Create an AuthManager reading time from `clock`
    pub fn with_clock(
        settings: AuthSettings,
        request_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        tracing::debug!(host = %settings.host, "Auth manager created");

        Ok(Self {
            settings,
            credentials: RwLock::new(Credentials::default()),
            client,
            clock,
        })
    }

    /// OCP host this manager authenticates against
    pub fn host(&self) -> &str {
        &self.settings.host
    }

    /// Snapshot of the cached credential
    pub async fn credentials(&self) -> Credentials {
        self.credentials.read().await.clone()
    }

    pub async fn state(&self) -> TokenState {
        self.credentials.read().await.state(self.clock.now())
    }

    /// Get a valid access token, refreshing or re-authenticating if necessary
    ///
    /// Returns `None` when neither the refresh grant nor the password grant
    /// produced a token. Only one exchange runs at a time; callers that
    /// queued behind it pick up its result.
    pub async fn get_token(&self) -> Option<String> {
        if let Some(token) = self.credentials.read().await.valid_token(self.clock.now()) {
            return Some(token);
        }

        let mut creds = self.credentials.write().await;

        // Someone else may have refreshed while we waited for the lock
        if let Some(token) = creds.valid_token(self.clock.now()) {
            tracing::debug!("Token was refreshed by a concurrent caller");
            return Some(token);
        }

        if let Some(refresh_token) = creds.refresh_token.clone() {
            let refreshed = grant::refresh_grant(&self.client, &self.settings, &refresh_token)
                .await
                .and_then(|data| creds.apply(data, self.clock.now()));
            match refreshed {
                Ok(()) => return creds.access.as_ref().map(|a| a.token.clone()),
                Err(e) => {
                    tracing::warn!(
                        "Token refresh failed, falling back to password grant: {:#}",
                        e
                    );
                }
            }
        }

        let acquired = grant::password_grant(&self.client, &self.settings)
            .await
            .and_then(|data| creds.apply(data, self.clock.now()));
        match acquired {
            Ok(()) => {
                if let Some(ref access) = creds.access {
                    tracing::info!(
                        "Authentication successful, expires: {}",
                        access.expires_at.to_rfc3339()
                    );
                }
                creds.access.as_ref().map(|a| a.token.clone())
            }
            Err(e) => {
                tracing::error!("Failed to obtain OCP token: {:#}", e);
                None
            }
        }
    }

    /// Revoke the cached refresh token at the identity provider
    ///
    /// Never fails: a rejected logout is logged and reported through the
    /// returned outcome, and the cached credential is then left untouched.
    pub async fn revoke(&self) -> RevokeOutcome {
        let mut creds = self.credentials.write().await;

        let Some(refresh_token) = creds.refresh_token.clone() else {
            tracing::debug!("No refresh token cached, nothing to revoke");
            return RevokeOutcome::NothingToRevoke;
        };

        match grant::logout(&self.client, &self.settings, &refresh_token).await {
            Ok(()) => {
                creds.clear();
                tracing::info!("Token successfully revoked");
                RevokeOutcome::Revoked
            }
            Err(e) => {
                tracing::warn!("Failed to revoke token: {:#}", e);
                RevokeOutcome::Failed {
                    reason: format!("{:#}", e),
                }
            }
        }
    }

    /// Probe an authorized endpoint with the cached token
    ///
    /// Does not acquire a token. Meant for health checks only.
    pub async fn check_token(&self) -> bool {
        let token = {
            let creds = self.credentials.read().await;
            creds.access.as_ref().map(|a| a.token.clone())
        };

        let Some(token) = token else {
            tracing::debug!("Token check skipped: no token cached");
            return false;
        };

        let url = self.settings.probe_url();
        let response = match self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Token check request failed");
                return false;
            }
        };

        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = %status, "Token is valid");
            true
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                body = %body,
                "Token validation failed"
            );
            false
        }
    }
}
