use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthManager;
use crate::error::{ApiError, Result};

/// Body attached to a dispatched request
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    File(FilePart),
}

/// Single file sent as multipart/form-data
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content: Vec<u8>,
    pub mime: String,
}

impl FilePart {
    fn into_form(self) -> Result<reqwest::multipart::Form> {
        let part = reqwest::multipart::Part::bytes(self.content)
            .file_name(self.file_name)
            .mime_str(&self.mime)
            .map_err(|e| ApiError::ValidationError(format!("Invalid MIME type: {}", e)))?;
        Ok(reqwest::multipart::Form::new().part(self.field, part))
    }
}

/// Per-call options: query parameters, extra headers and body
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: RequestBody,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Add a query parameter only when a value is present
    pub fn query_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.body = RequestBody::File(part);
        self
    }
}

/// Authenticated request dispatcher for OCP resource APIs
///
/// Every call resolves a token through the shared `AuthManager`, sends the
/// request once, and decodes the response into JSON, `None` for an empty
/// success, or an `ApiError`.
pub struct OcpHttpClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Authentication manager
    auth_manager: Arc<AuthManager>,

    /// Base URL every endpoint is resolved against
    base_url: String,
}

impl OcpHttpClient {
    /// Create a dispatcher targeting the auth manager's host
    pub fn new(
        auth_manager: Arc<AuthManager>,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> anyhow::Result<Self> {
        let base_url = auth_manager.host().to_string();
        Self::with_base_url(auth_manager, base_url, connect_timeout, request_timeout)
    }

    /// Create a dispatcher targeting a different host than the identity provider
    pub fn with_base_url(
        auth_manager: Arc<AuthManager>,
        base_url: impl Into<String>,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            auth_manager,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth_manager(&self) -> &Arc<AuthManager> {
        &self.auth_manager
    }

    pub async fn get(&self, endpoint: &str, options: RequestOptions) -> Result<Option<Value>> {
        self.dispatch(Method::GET, endpoint, options).await
    }

    pub async fn post(&self, endpoint: &str, options: RequestOptions) -> Result<Option<Value>> {
        self.dispatch(Method::POST, endpoint, options).await
    }

    pub async fn put(&self, endpoint: &str, options: RequestOptions) -> Result<Option<Value>> {
        self.dispatch(Method::PUT, endpoint, options).await
    }

    pub async fn delete(&self, endpoint: &str, options: RequestOptions) -> Result<Option<Value>> {
        self.dispatch(Method::DELETE, endpoint, options).await
    }

    /// Send one authorized request and decode the result
    pub async fn dispatch(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Option<Value>> {
        let token = self
            .auth_manager
            .get_token()
            .await
            .ok_or(ApiError::AuthUnavailable)?;

        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        let headers = build_headers(&options.headers, &token)?;

        let mut request = self.client.request(method.clone(), &url).headers(headers);
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        request = match options.body {
            RequestBody::Empty => request,
            RequestBody::Json(body) => request.json(&body),
            RequestBody::File(part) => request.multipart(part.into_form()?),
        };

        tracing::debug!(
            method = %method,
            url = %url,
            "Sending OCP request"
        );

        let response = request.send().await.map_err(|e| {
            let err = ApiError::from(e);
            tracing::warn!(
                method = %method,
                url = %url,
                error = %err,
                "OCP request error"
            );
            err
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                url = %url,
                response_body = %body,
                "OCP request failed with error response"
            );
            return Err(ApiError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(status = %status, "Request successful");

        let bytes = response.bytes().await?;
        if status == StatusCode::NO_CONTENT || bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Caller headers first, then Authorization, so the bearer token always wins
fn build_headers(extra: &[(String, String)], token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::ValidationError(format!("Invalid header name {}: {}", name, e)))?;
        if name == AUTHORIZATION {
            tracing::debug!("Ignoring caller-supplied Authorization header");
            continue;
        }
        let value = HeaderValue::from_str(value).map_err(|e| {
            ApiError::ValidationError(format!("Invalid value for header {}: {}", name, e))
        })?;
        headers.insert(name, value);
    }

    let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
        .context("Access token is not a valid header value")?;
    headers.insert(AUTHORIZATION, bearer);

    Ok(headers)
}
