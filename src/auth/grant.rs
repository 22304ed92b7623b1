// Token endpoint exchanges against the OCP identity provider

use anyhow::{Context, Result};
use reqwest::{Client, Response};

use super::types::{AuthSettings, TokenResponse};

/// Exchange username/password for a token pair
pub async fn password_grant(client: &Client, settings: &AuthSettings) -> Result<TokenResponse> {
    tracing::info!("Requesting OCP token via password grant...");

    let form = [
        ("client_id", settings.client_id.as_str()),
        ("grant_type", "password"),
        ("username", settings.username.as_str()),
        ("password", settings.password.as_str()),
    ];

    let response = client
        .post(settings.token_url())
        .header("Content-Type", "application/x-www-form-urlencoded")
        .form(&form)
        .send()
        .await
        .context("Failed to send password grant request")?;

    parse_token_response(response, "Password grant").await
}

/// Exchange a refresh token for a new access token
pub async fn refresh_grant(
    client: &Client,
    settings: &AuthSettings,
    refresh_token: &str,
) -> Result<TokenResponse> {
    tracing::info!("Refreshing OCP token via refresh grant...");

    let form = [
        ("client_id", settings.client_id.as_str()),
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];

    let response = client
        .post(settings.token_url())
        .header("Content-Type", "application/x-www-form-urlencoded")
        .form(&form)
        .send()
        .await
        .context("Failed to send refresh grant request")?;

    parse_token_response(response, "Refresh grant").await
}

/// End the server-side session bound to `refresh_token`
pub async fn logout(client: &Client, settings: &AuthSettings, refresh_token: &str) -> Result<()> {
    let form = [
        ("client_id", settings.client_id.as_str()),
        ("refresh_token", refresh_token),
    ];

    let response = client
        .post(settings.logout_url())
        .header("Content-Type", "application/x-www-form-urlencoded")
        .form(&form)
        .send()
        .await
        .context("Failed to send logout request")?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        anyhow::bail!("Logout failed: {} - {}", status, error_text);
    }

    Ok(())
}

async fn parse_token_response(response: Response, grant: &str) -> Result<TokenResponse> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(
            status = status.as_u16(),
            body = %error_text,
            "{} rejected by identity provider",
            grant
        );

        // Keycloak puts the reason in error/error_description
        if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(&error_text) {
            if let (Some(error_code), Some(error_desc)) = (
                error_json.get("error").and_then(|v| v.as_str()),
                error_json.get("error_description").and_then(|v| v.as_str()),
            ) {
                tracing::error!(
                    "{} error details: error={}, description={}",
                    grant,
                    error_code,
                    error_desc
                );
            }
        }

        anyhow::bail!("{} failed: {} - {}", grant, status, error_text);
    }

    let data: TokenResponse = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", grant.to_lowercase()))?;

    if data.access_token.is_empty() {
        anyhow::bail!("{} response does not contain access_token", grant);
    }

    if data.expires_in <= 0 || chrono::Duration::try_seconds(data.expires_in).is_none() {
        anyhow::bail!(
            "{} response has invalid expires_in: {}",
            grant,
            data.expires_in
        );
    }

    tracing::info!(expires_in = data.expires_in, "{} succeeded", grant);

    Ok(data)
}
