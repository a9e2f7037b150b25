// API client - authenticated, timeout-bounded JSON calls to the backend
//
// One reqwest::Client built at startup carries the timeout and connection
// pooling; every call goes through `request`, which merges headers, attaches
// the bearer token when one is stored, and translates failures into the
// ClientError taxonomy. Resource methods at the bottom are fixed path/method
// bindings with no business logic.
//
// A 401 response clears the stored token and emits AuthEvent::SessionExpired
// on the side channel; the UI collaborator decides whether to redirect. The
// client never retries - a failed call is reported once and the caller
// decides what to do (login, register and the generate-* endpoints are not
// idempotent).

use anyhow::{Context, Result};
use reqwest::{multipart, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::{ClientError, ErrorBody};
use crate::models::{
    AuthResponse, Credentials, GeneratedMessage, Insight, InsightRequest, MessageRequest,
    ProfileUpdate, Registration, RfmAnalysis, RfmAnalysisRequest, SegmentDescription, User,
};
use crate::storage::{KeyValueStorage, AUTH_TOKEN_KEY};

/// Authentication events the client emits instead of performing navigation
///
/// The core never touches the display surface; whoever owns the UI loop
/// listens on this channel and redirects to the login view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// A request came back 401; the stored token has been cleared
    SessionExpired,
}

/// HTTP client for the RFM Insights backend
pub struct ApiClient {
    http: reqwest::Client,
    /// Base URL including the version segment, e.g. "https://api.example.com/v1"
    base_url: String,
    storage: Arc<dyn KeyValueStorage>,
    auth_tx: mpsc::UnboundedSender<AuthEvent>,
}

impl ApiClient {
    /// Build the client; the timeout is baked into the underlying pool
    pub fn new(
        config: &Config,
        storage: Arc<dyn KeyValueStorage>,
        auth_tx: mpsc::UnboundedSender<AuthEvent>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("rfm-client/{}", crate::config::VERSION))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = format!(
            "{}/{}",
            config.api_url.trim_end_matches('/'),
            config.api_version
        );

        Ok(Self {
            http,
            base_url,
            storage,
            auth_tx,
        })
    }

    // ------------------------------------------------------------------
    // Token management - storage side effects only, no network I/O
    // ------------------------------------------------------------------

    pub fn set_token(&self, token: &str) {
        self.storage.set(AUTH_TOKEN_KEY, token);
    }

    pub fn get_token(&self) -> Option<String> {
        self.storage.get(AUTH_TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn clear_token(&self) {
        self.storage.remove(AUTH_TOKEN_KEY);
    }

    // ------------------------------------------------------------------
    // Request primitives
    // ------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Perform a JSON request and return the parsed body on 2xx
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let url = self.url(path);
        tracing::debug!(%method, %url, "issuing API request");

        let mut req = self.http.request(method, &url);
        if let Some(token) = self.get_token() {
            req = req.bearer_auth(token);
        }
        req = match body {
            // .json() sets Content-Type: application/json
            Some(body) => req.json(body),
            None => req.header(reqwest::header::CONTENT_TYPE, "application/json"),
        };

        let response = req.send().await.map_err(ClientError::from_transport)?;
        self.handle_response(response).await
    }

    /// Translate a response into a parsed body or a taxonomy error
    async fn handle_response(&self, response: reqwest::Response) -> Result<Value, ClientError> {
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await.map_err(ClientError::from_transport)?;
            // Some endpoints (password reset, deletes) return an empty body
            if bytes.is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_slice(&bytes).map_err(ClientError::InvalidBody);
        }

        // Re-authentication required: drop the stale token and tell the UI.
        // Redirecting is the UI collaborator's job, not ours.
        if status == StatusCode::UNAUTHORIZED {
            self.clear_token();
            let _ = self.auth_tx.send(AuthEvent::SessionExpired);
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        let message = body.normalize(status.as_u16());
        tracing::warn!(status = status.as_u16(), %message, "API request failed");

        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ClientError> {
        self.request(Method::DELETE, path, None).await
    }

    /// Upload a multipart form
    ///
    /// Same auth and timeout contract as `request`, but no JSON content type:
    /// reqwest sets the multipart boundary itself.
    pub async fn upload_file(
        &self,
        path: &str,
        form: multipart::Form,
    ) -> Result<Value, ClientError> {
        let url = self.url(path);
        tracing::debug!(%url, "uploading file");

        let mut req = self.http.post(&url).multipart(form);
        if let Some(token) = self.get_token() {
            req = req.bearer_auth(token);
        }

        let response = req.send().await.map_err(ClientError::from_transport)?;
        self.handle_response(response).await
    }

    /// Decode a response body into a typed model
    fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
        serde_json::from_value(value).map_err(ClientError::InvalidBody)
    }

    // ------------------------------------------------------------------
    // Authentication endpoints
    // ------------------------------------------------------------------

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ClientError> {
        let body = serde_json::to_value(credentials).map_err(ClientError::InvalidBody)?;
        self.post("/auth/login", &body).await.and_then(Self::decode)
    }

    pub async fn register(&self, registration: &Registration) -> Result<AuthResponse, ClientError> {
        let body = serde_json::to_value(registration).map_err(ClientError::InvalidBody)?;
        self.post("/auth/register", &body).await.and_then(Self::decode)
    }

    pub async fn get_user_profile(&self) -> Result<User, ClientError> {
        self.get("/auth/me").await.and_then(Self::decode)
    }

    pub async fn update_user_profile(&self, update: &ProfileUpdate) -> Result<User, ClientError> {
        let body = serde_json::to_value(update).map_err(ClientError::InvalidBody)?;
        self.put("/auth/me", &body).await.and_then(Self::decode)
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), ClientError> {
        let body = serde_json::json!({ "email": email });
        self.post("/auth/password-reset", &body).await.map(|_| ())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ClientError> {
        let body = serde_json::json!({ "token": token, "new_password": new_password });
        self.post("/auth/password-reset/confirm", &body)
            .await
            .map(|_| ())
    }

    // ------------------------------------------------------------------
    // RFM analysis endpoints
    // ------------------------------------------------------------------

    pub async fn analyze_rfm(&self, request: &RfmAnalysisRequest) -> Result<RfmAnalysis, ClientError> {
        let body = serde_json::to_value(request).map_err(ClientError::InvalidBody)?;
        self.post("/rfm/analyze", &body).await.and_then(Self::decode)
    }

    pub async fn get_analysis_history(&self, limit: usize) -> Result<Vec<RfmAnalysis>, ClientError> {
        self.get(&format!("/rfm/analysis-history?limit={limit}"))
            .await
            .and_then(Self::decode)
    }

    pub async fn get_segment_descriptions(&self) -> Result<Vec<SegmentDescription>, ClientError> {
        self.get("/rfm/segment-descriptions").await.and_then(Self::decode)
    }

    // ------------------------------------------------------------------
    // Marketplace endpoints
    // ------------------------------------------------------------------

    pub async fn generate_message(
        &self,
        request: &MessageRequest,
    ) -> Result<GeneratedMessage, ClientError> {
        let body = serde_json::to_value(request).map_err(ClientError::InvalidBody)?;
        self.post("/marketplace/generate-message", &body)
            .await
            .and_then(Self::decode)
    }

    pub async fn regenerate_message(&self, message_id: &str) -> Result<GeneratedMessage, ClientError> {
        let body = serde_json::json!({ "message_id": message_id });
        self.post("/marketplace/regenerate-message", &body)
            .await
            .and_then(Self::decode)
    }

    pub async fn get_user_messages(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<GeneratedMessage>, ClientError> {
        self.get(&format!("/marketplace/messages?limit={limit}&offset={offset}"))
            .await
            .and_then(Self::decode)
    }

    pub async fn generate_insight(&self, request: &InsightRequest) -> Result<Insight, ClientError> {
        let body = serde_json::to_value(request).map_err(ClientError::InvalidBody)?;
        self.post("/marketplace/generate-insight", &body)
            .await
            .and_then(Self::decode)
    }
}
