//! Chat-completion transports.

pub mod chat;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A chat-completion request in the OpenAI wire format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
}

/// One message of a chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Trait for chat-completion backends.
///
/// One call is one outbound request: retries and pacing are the caller's
/// concern. A rate-limit answer must be reported as
/// [`RemoteError::RateLimited`](crate::RemoteError::RateLimited).
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send the request and return the assistant message content.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}
