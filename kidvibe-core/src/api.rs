//! Thin JSON-over-HTTP client for the KidVibe backend.
//!
//! Every call returns the raw `reqwest::Response`; controllers branch on the
//! status themselves. Nothing here retries.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;

pub const LOGIN_PATH: &str = "/api/v1/auth/login";
pub const CHAT_PATH: &str = "/api/v1/chat/chat";
pub const ANALYZE_PATH: &str = "/api/v1/projects/analyze";
pub const PROJECTS_PATH: &str = "/api/v1/projects/";
pub const HEALTH_PATH: &str = "/health";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Extract the `detail` field of a FastAPI-style error body.
///
/// String details are returned as-is; structured ones (validation errors)
/// are returned as compact JSON.
pub fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Consume a non-success response and pull out its `detail`, if any.
pub async fn read_detail(response: Response) -> Option<String> {
    let body = response.text().await.ok()?;
    error_detail(&body)
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, reqwest::Error> {
        Self::build(&config.base_url, config.timeout_seconds)
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(base_url: impl AsRef<str>) -> Result<Self, reqwest::Error> {
        Self::build(base_url.as_ref(), DEFAULT_TIMEOUT_SECS)
    }

    fn build(base_url: &str, timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Underlying client, for requests the helpers below don't cover.
    pub fn http(&self) -> &Client {
        &self.client
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn post_json<B>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<Response, reqwest::Error>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        tracing::debug!(%url, auth = bearer.is_some(), "POST");

        let mut request = self.client.post(&url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        request.send().await
    }

    pub async fn get(&self, path: &str, bearer: Option<&str>) -> Result<Response, reqwest::Error> {
        let url = self.url(path);
        tracing::debug!(%url, auth = bearer.is_some(), "GET");

        let mut request = self.client.get(&url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        request.send().await
    }
}

/// Base URL of a loopback port nothing listens on.
#[cfg(test)]
pub(crate) fn refused_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}
