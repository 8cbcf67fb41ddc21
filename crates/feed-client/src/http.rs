//! HTTP client for the feed service
//!
//! Request/response types, client configuration, and the reqwest-backed
//! client that maps every failure onto [`crate::Error`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::Credential;
use crate::{Error, Result};

// =============================================================================
// Request Types
// =============================================================================

/// GET request against a service path
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Path relative to the service URL (e.g., "/api/feed/")
    pub path: String,
    /// Query parameters
    pub params: Vec<(String, String)>,
}

impl ApiRequest {
    /// Create a new GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
        }
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Error body returned with non-success responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable reason
    pub detail: String,
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the feed service client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base service URL (e.g., "https://feed.example.com")
    pub service_url: String,
    /// Request timeout; expiry surfaces as a transport error
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Scheme prefixed to the credential in the `Authorization` header
    pub auth_scheme: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("Channel-Feed/{}", env!("CARGO_PKG_VERSION")),
            auth_scheme: Some("tma".to_string()),
        }
    }
}

impl ClientConfig {
    /// Create a new config with a service URL
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
            ..Default::default()
        }
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the authorization scheme; `None` sends the bare credential
    pub fn with_auth_scheme(mut self, scheme: Option<String>) -> Self {
        self.auth_scheme = scheme;
        self
    }

    /// `Authorization` header value for a credential
    pub fn authorization(&self, credential: &Credential) -> String {
        credential.authorization(self.auth_scheme.as_deref())
    }
}

// =============================================================================
// Client Implementation
// =============================================================================

use reqwest::{Client as ReqwestClient, Response as ReqwestResponse};

/// Client for the feed service's JSON endpoints
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// HTTP client
    client: ReqwestClient,
    /// Configuration
    config: ClientConfig,
}

impl ApiClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Make an authorized GET request and decode the JSON body
    pub async fn get<T>(&self, request: ApiRequest, credential: &Credential) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        if credential.is_empty() {
            return Err(Error::Unauthenticated);
        }

        let url = format!("{}{}", self.config.service_url.trim_end_matches('/'), request.path);

        let req = self
            .client
            .get(&url)
            .query(&request.params)
            .header(reqwest::header::AUTHORIZATION, self.config.authorization(credential));

        tracing::debug!(%url, "GET");

        let response = req.send().await.map_err(|e| Error::Transport(describe(&e)))?;

        self.parse_response(response).await
    }

    /// Decode a reqwest response, mapping failures onto [`Error`]
    async fn parse_response<T>(&self, response: ReqwestResponse) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status().as_u16();

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();

            let message = serde_json::from_str::<ErrorBody>(&error_body)
                .map(|body| body.detail)
                .unwrap_or_else(|_| format!("HTTP error: {}", status));

            return Err(Error::Service { status, message });
        }

        let body = response.text().await.map_err(|e| Error::Transport(describe(&e)))?;

        serde_json::from_str(&body)
            .map_err(|e| Error::Decode(format!("failed to parse response: {}", e)))
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the service URL
    pub fn service_url(&self) -> &str {
        &self.config.service_url
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {}", err)
    } else {
        format!("request failed: {}", err)
    }
}
