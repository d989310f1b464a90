use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Why an assistant turn carries a canned string instead of a real reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnFailure {
    /// 2xx without `message.content`.
    MissingContent,
    /// Non-2xx status; the body is ignored.
    Http { status: u16 },
    /// The request never completed.
    Network,
    /// 2xx whose body is not JSON; reported like a network error.
    InvalidBody,
}

/// One turn of a chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<TurnFailure>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), None)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), None)
    }

    /// An assistant-role turn standing in for a failed exchange.
    pub fn failed(content: impl Into<String>, failure: TurnFailure) -> Self {
        Self::new(Role::Assistant, content.into(), Some(failure))
    }

    fn new(role: Role, content: String, failure: Option<TurnFailure>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            timestamp: Utc::now(),
            failure,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}
