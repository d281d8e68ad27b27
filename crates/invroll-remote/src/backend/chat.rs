//! OpenAI-compatible chat completions over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, trace};

use super::{ChatMessage, ChatRequest, ChatTransport};
use crate::error::RemoteError;
use crate::Result;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Chat transport posting to `<base_url>/chat/completions`.
#[derive(Clone)]
pub struct HttpChatTransport {
    client: Client,
    url: String,
    api_key: String,
}

impl HttpChatTransport {
    /// Create a transport with a per-request timeout.
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: completions_url(base_url),
            api_key: api_key.into(),
        })
    }

    /// Endpoint requests are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        debug!("POST {} (model {})", self.url, request.model);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RemoteError::RateLimited {
                retry_after: retry_after(response.headers()),
            });
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        trace!("Chat response: {}", body);
        message_content(&body)
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// `Retry-After` in whole seconds. HTTP-date values are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Content of the first choice of a chat-completion body.
fn message_content(body: &str) -> Result<String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| RemoteError::Decode(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| RemoteError::Decode("no choices in response".to_string()))
}
