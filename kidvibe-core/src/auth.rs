//! Login controller: exchanges credentials for a bearer token and records
//! the resulting session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{read_detail, ApiClient, LOGIN_PATH};
use crate::session::{Session, SessionError, SessionHolder, SessionStorage};

/// Used when a rejected login carries no `detail`.
pub const LOGIN_FAILED: &str = "登录失败";
/// Shown when the login request never completed.
pub const LOGIN_NETWORK_ERROR: &str = "网络错误，请稍后重试";

pub const DEFAULT_EMAIL: &str = "admin@kidvibe.com";
pub const DEFAULT_PASSWORD: &str = "admin123";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("{detail} ({status})")]
    Rejected { status: u16, detail: String },

    #[error("{}: {}", LOGIN_NETWORK_ERROR, .0)]
    Network(#[source] reqwest::Error),

    #[error("Invalid login response: {0}")]
    Decode(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
}

pub struct LoginController<S: SessionStorage> {
    api: ApiClient,
    sessions: Arc<SessionHolder<S>>,
}

impl<S: SessionStorage> LoginController<S> {
    pub fn new(api: ApiClient, sessions: Arc<SessionHolder<S>>) -> Self {
        Self { api, sessions }
    }

    pub fn sessions(&self) -> &SessionHolder<S> {
        &self.sessions
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        if email.trim().is_empty() {
            return Err(AuthError::MissingField("email"));
        }
        if password.is_empty() {
            return Err(AuthError::MissingField("password"));
        }

        let response = self
            .api
            .post_json(LOGIN_PATH, &LoginRequest { email, password }, None)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "login request failed");
                AuthError::Network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = read_detail(response)
                .await
                .unwrap_or_else(|| LOGIN_FAILED.to_string());
            tracing::warn!(status = status.as_u16(), %detail, "login rejected");
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response.text().await.map_err(AuthError::Network)?;
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::Decode(e.to_string()))?;
        if token.access_token.is_empty() {
            return Err(AuthError::Decode("empty access_token".to_string()));
        }
        if let Some(kind) = token.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                tracing::warn!(token_type = kind, "unexpected token type");
            }
        }

        let session = self.sessions.login(&token.access_token, email)?;
        tracing::info!(email, "logged in");
        Ok(session)
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        self.sessions.logout()?;
        Ok(())
    }
}
