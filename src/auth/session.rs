// Scoped credential: acquire on open, revoke on every exit path

use std::future::Future;
use std::sync::Arc;

use super::manager::AuthManager;
use super::types::RevokeOutcome;

/// Guard holding an acquired credential until it is closed or dropped
///
/// Prefer `close()`, which awaits the logout call. Dropping an open session
/// (early return, `?`, panic) spawns the revocation on the current tokio
/// runtime instead.
pub struct AuthSession {
    manager: Arc<AuthManager>,
    token: Option<String>,
    open: bool,
}

impl AuthManager {
    /// Acquire a token and tie its revocation to the returned guard
    pub async fn open_session(self: &Arc<Self>) -> AuthSession {
        let token = self.get_token().await;
        if token.is_none() {
            tracing::warn!("Session opened without a token");
        }

        AuthSession {
            manager: self.clone(),
            token,
            open: true,
        }
    }
}

impl AuthSession {
    /// Token obtained when the session was opened
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn manager(&self) -> &Arc<AuthManager> {
        &self.manager
    }

    /// Revoke the credential and end the session
    pub async fn close(mut self) -> RevokeOutcome {
        self.open = false;
        self.manager.revoke().await
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        if !self.open {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!("Session dropped while open, revoking in background");
                let manager = self.manager.clone();
                handle.spawn(async move {
                    manager.revoke().await;
                });
            }
            Err(_) => {
                tracing::warn!("Session dropped outside a tokio runtime, token not revoked");
            }
        }
    }
}

/// Run `work` between token acquisition and revocation
///
/// Revocation runs whether `work` returns `Ok` or `Err`; a panic inside
/// `work` is covered by the session's drop.
pub async fn with_session<F, Fut, T>(manager: Arc<AuthManager>, work: F) -> T
where
    F: FnOnce(Arc<AuthManager>) -> Fut,
    Fut: Future<Output = T>,
{
    let session = manager.open_session().await;
    let output = work(session.manager().clone()).await;
    session.close().await;
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::auth::types::AuthSettings;
    use mockito::{Matcher, ServerGuard};
    use serde_json::json;
    use std::time::Duration;

    const TOKEN_PATH: &str = "/auth/realms/master/protocol/openid-connect/token";
    const LOGOUT_PATH: &str = "/auth/realms/master/protocol/openid-connect/logout";

    fn manager(server: &ServerGuard) -> Arc<AuthManager> {
        let settings = AuthSettings {
            host: server.url(),
            username: "ctx_user".to_string(),
            password: "ctx_password".to_string(),
            client_id: "ocp".to_string(),
            probe_path: "miniapps/api/apps?pageSize=1".to_string(),
        };
        Arc::new(
            AuthManager::with_clock(
                settings,
                Duration::from_secs(5),
                Arc::new(ManualClock::new(1000)),
            )
            .unwrap(),
        )
    }

    async fn token_mock(server: &mut ServerGuard) -> mockito::Mock {
        server
            .mock("POST", TOKEN_PATH)
            .match_body(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .with_status(200)
            .with_body(
                json!({
                    "access_token": "ctx_access_token",
                    "refresh_token": "ctx_refresh_token",
                    "expires_in": 3600
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await
    }

    async fn logout_mock(server: &mut ServerGuard) -> mockito::Mock {
        server
            .mock("POST", LOGOUT_PATH)
            .match_body(Matcher::UrlEncoded(
                "refresh_token".into(),
                "ctx_refresh_token".into(),
            ))
            .with_status(204)
            .expect(1)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_session_acquires_and_revokes() {
        let mut server = mockito::Server::new_async().await;
        let token = token_mock(&mut server).await;
        let logout = logout_mock(&mut server).await;
        let manager = manager(&server);

        let session = manager.open_session().await;
        assert_eq!(session.token(), Some("ctx_access_token"));
        assert_eq!(session.close().await, RevokeOutcome::Revoked);

        token.assert_async().await;
        logout.assert_async().await;
    }

    #[tokio::test]
    async fn test_with_session_revokes_on_error() {
        let mut server = mockito::Server::new_async().await;
        let token = token_mock(&mut server).await;
        let logout = logout_mock(&mut server).await;
        let manager = manager(&server);

        let result: Result<(), String> = with_session(manager.clone(), |auth| async move {
            assert_eq!(auth.get_token().await.as_deref(), Some("ctx_access_token"));
            Err("unit of work failed".to_string())
        })
        .await;

        assert!(result.is_err());
        token.assert_async().await;
        logout.assert_async().await;
    }

    #[tokio::test]
    async fn test_dropped_session_revokes_in_background() {
        let mut server = mockito::Server::new_async().await;
        let token = token_mock(&mut server).await;
        let logout = logout_mock(&mut server).await;
        let manager = manager(&server);

        {
            let session = manager.open_session().await;
            assert!(session.token().is_some());
        }

        for _ in 0..50 {
            if logout.matched_async().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        token.assert_async().await;
        logout.assert_async().await;
    }
}
