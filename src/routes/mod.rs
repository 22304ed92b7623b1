use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{Method, StatusCode, Uri},
    middleware::{self as axum_middleware},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthManager;
use crate::error::ApiError;
use crate::http_client::{OcpHttpClient, RequestOptions};
use crate::middleware;

/// Application version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub proxy_api_key: String,
    pub auth_manager: Arc<AuthManager>,
    pub http_client: Arc<OcpHttpClient>,
}

/// Health check routes (no authentication required)
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Authenticated passthrough to OCP resource APIs
pub fn proxy_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/*path",
            get(proxy_handler)
                .post(proxy_handler)
                .put(proxy_handler)
                .delete(proxy_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .with_state(state)
}

/// GET / - Simple liveness check
async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "OCP Gateway is running",
        "version": VERSION
    }))
}

/// GET /health - Credential health check
///
/// Makes sure a token is held, then probes OCP with it. Reports 503 when
/// the token cannot be obtained or is rejected.
async fn health_handler(State(state): State<AppState>) -> Response {
    let token_acquired = state.auth_manager.get_token().await.is_some();
    let token_valid = token_acquired && state.auth_manager.check_token().await;

    let (status, label) = if token_valid {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = Json(json!({
        "status": label,
        "token_valid": token_valid,
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION
    }));

    (status, body).into_response()
}

/// ANY /api/*path - Forward to `{OCP_HOST}/{path}` with the gateway's credential
async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4().to_string()[..8].to_string();

    // Forwarded still percent-encoded so %2F and %3F stay inside their segment
    let path = uri.path().strip_prefix("/api/").unwrap_or_default();
    tracing::info!("[{}] {} /api/{}", request_id, method, path);

    let mut options = RequestOptions::new();
    for (key, value) in query {
        options = options.query(key, value);
    }

    if !body.iter().all(u8::is_ascii_whitespace) {
        let payload: Value = serde_json::from_slice(&body)
            .map_err(|e| ApiError::ValidationError(format!("Invalid JSON body: {}", e)))?;
        options = options.json(payload);
    }

    let result = state.http_client.dispatch(method, path, options).await;

    match result {
        Ok(Some(value)) => Ok((StatusCode::OK, Json(value)).into_response()),
        Ok(None) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(e) => {
            tracing::warn!("[{}] Proxy request failed: {}", request_id, e);
            Err(e)
        }
    }
}
