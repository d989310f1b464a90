//! Chat controller: an append-only transcript backed by the chat endpoint.
//!
//! Every accepted send appends exactly two turns: the user's message, then
//! one assistant turn (a real reply, or a canned string tagged with the
//! [`TurnFailure`] that produced it). A send whose future is dropped before
//! the reply arrives takes its user turn back out, so the transcript only ever
//! grows in pairs.

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::api::{ApiClient, CHAT_PATH};
use crate::inflight::OpSlot;
use crate::models::{ChatMessage, TurnFailure};

/// Shown when a 2xx reply has no `message.content`.
pub const FALLBACK_REPLY: &str = "抱歉，我无法处理您的请求。";
/// Shown when the chat endpoint answers with a non-2xx status.
pub const HTTP_ERROR_REPLY: &str = "抱歉，发生了错误，请稍后重试。";
/// Shown when the request never completed or the 2xx body is not JSON.
pub const NETWORK_ERROR_REPLY: &str = "网络错误，请检查连接后重试。";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("A chat request is already in flight")]
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    Sending,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub message: &'a str,
    pub session_id: Option<i64>,
    pub context: serde_json::Value,
}

impl<'a> ChatRequest<'a> {
    pub(crate) fn new(message: &'a str) -> Self {
        Self {
            message,
            session_id: None,
            context: serde_json::json!({}),
        }
    }
}

/// Removes the user turn again unless the exchange settled.
struct PendingTurn<'a> {
    transcript: &'a Mutex<Vec<ChatMessage>>,
    id: Uuid,
    settled: bool,
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut transcript = self.transcript.lock();
        if let Some(pos) = transcript.iter().rposition(|m| m.id == self.id) {
            transcript.remove(pos);
            tracing::debug!("chat send cancelled, user turn withdrawn");
        }
    }
}

pub struct ChatController {
    api: ApiClient,
    transcript: Mutex<Vec<ChatMessage>>,
    state: OpSlot<ChatState>,
}

impl ChatController {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            transcript: Mutex::new(Vec::new()),
            state: OpSlot::new(ChatState::Idle),
        }
    }

    /// Snapshot of the transcript in insertion order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.transcript.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.transcript.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.lock().is_empty()
    }

    pub fn state(&self) -> ChatState {
        self.state.current()
    }

    pub fn is_sending(&self) -> bool {
        self.state() == ChatState::Sending
    }

    pub fn clear(&self) {
        self.transcript.lock().clear();
    }

    /// Send one user turn and append the assistant's answer.
    ///
    /// Returns the appended assistant turn. Empty input and overlapping
    /// sends are rejected without touching the transcript.
    pub async fn send_message(&self, text: &str) -> Result<ChatMessage, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let _guard = self.state.try_begin(ChatState::Sending).map_err(|_| ChatError::Busy)?;

        let user = ChatMessage::user(text);
        let mut pending = PendingTurn {
            transcript: &self.transcript,
            id: user.id,
            settled: false,
        };
        self.push(user);

        let reply = self.exchange(text).await;
        pending.settled = true;
        self.push(reply.clone());
        Ok(reply)
    }

    async fn exchange(&self, text: &str) -> ChatMessage {
        let response = match self.api.post_json(CHAT_PATH, &ChatRequest::new(text), None).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "chat request failed");
                return ChatMessage::failed(NETWORK_ERROR_REPLY, TurnFailure::Network);
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "chat endpoint returned an error");
            return ChatMessage::failed(
                HTTP_ERROR_REPLY,
                TurnFailure::Http {
                    status: status.as_u16(),
                },
            );
        }

        let body = match response.json::<serde_json::Value>().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "undecodable chat reply");
                return ChatMessage::failed(NETWORK_ERROR_REPLY, TurnFailure::InvalidBody);
            }
        };

        match body.pointer("/message/content").and_then(|c| c.as_str()) {
            Some(c) if !c.is_empty() => ChatMessage::assistant(c),
            _ => ChatMessage::failed(FALLBACK_REPLY, TurnFailure::MissingContent),
        }
    }

    fn push(&self, message: ChatMessage) {
        self.transcript.lock().push(message);
    }
}
