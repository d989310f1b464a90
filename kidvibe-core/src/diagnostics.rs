//! Diagnostic probes behind the debug pages. Each probe fires one request and
//! records a display string; the last result wins.

use parking_lot::Mutex;
use reqwest::Method;
use thiserror::Error;

use crate::api::{ApiClient, CHAT_PATH, HEALTH_PATH, LOGIN_PATH};
use crate::auth::LoginRequest;
use crate::chat::ChatRequest;

pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DiagnosticsError {
    #[error("Message is empty")]
    EmptyMessage,
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub struct DiagnosticsController {
    api: ApiClient,
    last_result: Mutex<Option<String>>,
}

impl DiagnosticsController {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            last_result: Mutex::new(None),
        }
    }

    pub fn last_result(&self) -> Option<String> {
        self.last_result.lock().clone()
    }

    fn record(&self, result: String) -> String {
        *self.last_result.lock() = Some(result.clone());
        result
    }

    /// `GET /health`, rendered as pretty JSON.
    pub async fn health(&self) -> String {
        let result = match self.api.get(HEALTH_PATH, None).await {
            Ok(r) => match r.json::<serde_json::Value>().await {
                Ok(v) => pretty(&v),
                Err(e) => format!("错误: {}", e),
            },
            Err(e) => format!("错误: {}", e),
        };
        self.record(result)
    }

    /// Raw chat exchange; the body is shown whatever the status.
    pub async fn test_chat(&self, message: &str) -> Result<String, DiagnosticsError> {
        if message.trim().is_empty() {
            return Err(DiagnosticsError::EmptyMessage);
        }
        let result = match self
            .api
            .post_json(CHAT_PATH, &ChatRequest::new(message), None)
            .await
        {
            Ok(r) => match r.json::<serde_json::Value>().await {
                Ok(v) => pretty(&v),
                Err(e) => format!("错误: {}", e),
            },
            Err(e) => format!("错误: {}", e),
        };
        Ok(self.record(result))
    }

    /// Login probe. Does not touch the stored session.
    pub async fn test_login(&self, email: &str, password: &str) -> String {
        let result = match self
            .api
            .post_json(LOGIN_PATH, &LoginRequest { email, password }, None)
            .await
        {
            Ok(r) => {
                let status = r.status();
                tracing::debug!(status = status.as_u16(), headers = ?r.headers(), "login probe");
                let body = r.text().await.unwrap_or_default();
                if status.is_success() {
                    let shown = serde_json::from_str::<serde_json::Value>(&body)
                        .map(|v| pretty(&v))
                        .unwrap_or(body);
                    format!("✅ 登录成功: {}", shown)
                } else {
                    format!("❌ 登录失败 ({}): {}", status.as_u16(), body)
                }
            }
            Err(e) => format!("❌ 网络错误: {}", e),
        };
        self.record(result)
    }

    /// CORS preflight against the login endpoint; shows the response headers.
    pub async fn test_cors(&self, origin: &str) -> String {
        let url = self.api.url(LOGIN_PATH);
        let request = self
            .api
            .http()
            .request(Method::OPTIONS, &url)
            .header("Origin", origin)
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "Content-Type");

        let result = match request.send().await {
            Ok(r) => {
                let headers: serde_json::Map<String, serde_json::Value> = r
                    .headers()
                    .iter()
                    .map(|(k, v)| {
                        (
                            k.as_str().to_string(),
                            serde_json::Value::String(v.to_str().unwrap_or_default().to_string()),
                        )
                    })
                    .collect();
                format!(
                    "CORS 测试结果 ({}): {}",
                    r.status().as_u16(),
                    pretty(&serde_json::Value::Object(headers))
                )
            }
            Err(e) => format!("❌ CORS 错误: {}", e),
        };
        self.record(result)
    }
}
