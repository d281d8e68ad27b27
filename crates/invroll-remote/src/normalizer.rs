//! Chat-completion backed invoice normalization.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use invroll_core::invoice::parse_normalization;
use invroll_core::models::config::DelegateConfig;
use invroll_core::{NormalizedInvoice, Normalizer};
use tracing::{debug, info, warn};

use crate::backend::chat::HttpChatTransport;
use crate::backend::{ChatMessage, ChatRequest, ChatTransport};
use crate::error::RemoteError;
use crate::pacing::PacingGate;
use crate::retry::RetryPolicy;
use crate::Result;

const SYSTEM_PROMPT: &str = "You extract line items from supplier invoices. \
Answer with a single JSON object and nothing else, using this shape: \
{\"invoice_number\": string|null, \"invoice_date\": \"YYYY-MM-DD\"|null, \
\"supplier\": string|null, \"lines\": [{\"item_code\": string, \
\"item_name\": string, \"quantity\": integer, \"unit_price\": number, \
\"line_total\": number}]}. \
Only include rows that are purchased items with a code, a quantity, a unit \
price and a line total. Skip subtotals, taxes, freight and notes. Use an \
empty list when there are no items.";

/// Normalizer that asks an OpenAI-compatible chat model for the line items.
///
/// Every outbound attempt, retries included, goes through one pacing gate
/// shared by all clones.
#[derive(Clone)]
pub struct ChatNormalizer {
    transport: Arc<dyn ChatTransport>,
    gate: PacingGate,
    retry: RetryPolicy,
    model: String,
    temperature: f64,
}

impl ChatNormalizer {
    /// Build an HTTP-backed normalizer, reading the API key from the
    /// environment variable named in `config.api_key_env`.
    pub fn from_config(config: &DelegateConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                RemoteError::MissingConfig(format!("{} is not set", config.api_key_env))
            })?;

        let transport = HttpChatTransport::new(
            &config.base_url,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )?;
        info!("Normalization delegate: {} at {}", config.model, transport.url());

        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Build a normalizer over any transport.
    pub fn with_transport(transport: Arc<dyn ChatTransport>, config: &DelegateConfig) -> Self {
        Self {
            transport,
            gate: PacingGate::new(Duration::from_millis(config.min_interval_ms)),
            retry: RetryPolicy::from_config(config),
            model: config.model.clone(),
            temperature: f64::from(config.temperature),
        }
    }

    fn request(&self, excerpt: &str, file_name: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!("File: {file_name}\n\n{excerpt}")),
            ],
            temperature: self.temperature,
        }
    }

    /// Send the request, retrying rate-limit answers per the retry policy.
    /// Every attempt waits for the pacing gate first.
    async fn complete(&self, request: &ChatRequest, file_name: &str) -> Result<String> {
        let attempt = || async {
            self.gate.wait().await;
            self.transport.complete(request).await
        };

        attempt
            .retry(self.retry.backoff())
            .when(RemoteError::is_rate_limited)
            .adjust(|e, scheduled| self.retry.adjust(scheduled, e.retry_after()))
            .notify(|e, delay| warn!("{}: {}, retrying in {:?}", file_name, e, delay))
            .await
    }
}

#[async_trait]
impl Normalizer for ChatNormalizer {
    async fn normalize(&self, excerpt: &str, file_name: &str) -> NormalizedInvoice {
        let request = self.request(excerpt, file_name);
        debug!("{}: sending {} chars to {}", file_name, excerpt.len(), self.model);

        match self.complete(&request, file_name).await {
            Ok(content) => parse_normalization(&content),
            Err(e) => NormalizedInvoice::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays scripted answers and records when each call arrived.
    struct FakeTransport {
        answers: Mutex<VecDeque<Result<String>>>,
        calls: Mutex<Vec<(Instant, ChatRequest)>>,
    }

    impl FakeTransport {
        fn new(answers: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_times(&self, start: Instant) -> Vec<Duration> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(at, _)| *at - start)
                .collect()
        }
    }

    #[async_trait]
    impl ChatTransport for FakeTransport {
        async fn complete(&self, request: &ChatRequest) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((Instant::now(), request.clone()));
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RemoteError::Decode("no scripted answer".to_string())))
        }
    }

    fn limited(retry_after: Option<u64>) -> Result<String> {
        Err(RemoteError::RateLimited {
            retry_after: retry_after.map(Duration::from_secs),
        })
    }

    fn config() -> DelegateConfig {
        DelegateConfig {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            min_interval_ms: 0,
            ..Default::default()
        }
    }

    const ANSWER: &str = r#"Sure: {"invoice_number": "INV-9", "lines": [{"item_code": "A100", "item_name": "Widget", "quantity": 2, "unit_price": "5.00", "line_total": 10}]}"#;

    #[tokio::test(start_paused = true)]
    async fn test_success_parses_answer() {
        let transport = FakeTransport::new(vec![Ok(ANSWER.to_string())]);
        let normalizer = ChatNormalizer::with_transport(transport.clone(), &config());

        let result = normalizer.normalize("A100 Widget 2 5.00 10.00", "inv.pdf").await;

        assert_eq!(result.error, None);
        assert_eq!(result.invoice_number.as_deref(), Some("INV-9"));
        assert_eq!(result.lines.len(), 1);

        let calls = transport.calls.lock().unwrap();
        let request = &calls[0].1;
        assert_eq!(request.messages[0].role, "system");
        assert!(request.messages[1].content.starts_with("File: inv.pdf"));
        assert!(request.messages[1].content.contains("A100 Widget"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_backs_off_exponentially() {
        let transport = FakeTransport::new(vec![
            limited(None),
            limited(None),
            Ok(ANSWER.to_string()),
        ]);
        let normalizer = ChatNormalizer::with_transport(transport.clone(), &config());
        let start = Instant::now();

        let result = normalizer.normalize("text", "inv.pdf").await;

        assert_eq!(result.error, None);
        assert_eq!(
            transport.call_times(start),
            vec![Duration::ZERO, Duration::from_secs(1), Duration::from_secs(3)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_is_honored() {
        let transport = FakeTransport::new(vec![limited(Some(7)), Ok(ANSWER.to_string())]);
        let normalizer = ChatNormalizer::with_transport(transport.clone(), &config());
        let start = Instant::now();

        normalizer.normalize("text", "inv.pdf").await;

        assert_eq!(
            transport.call_times(start),
            vec![Duration::ZERO, Duration::from_secs(7)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_last_error() {
        let transport = FakeTransport::new(vec![
            limited(None),
            limited(None),
            limited(None),
            limited(Some(1)),
        ]);
        let normalizer = ChatNormalizer::with_transport(transport.clone(), &config());

        let result = normalizer.normalize("text", "inv.pdf").await;

        assert!(result.lines.is_empty());
        assert_eq!(result.error.as_deref(), Some("rate limited (HTTP 429)"));
        assert_eq!(transport.calls.lock().unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let transport = FakeTransport::new(vec![
            Err(RemoteError::Status {
                status: 500,
                body: "boom".to_string(),
            }),
            Ok(ANSWER.to_string()),
        ]);
        let normalizer = ChatNormalizer::with_transport(transport.clone(), &config());

        let result = normalizer.normalize("text", "inv.pdf").await;

        assert_eq!(result.error.as_deref(), Some("HTTP 500: boom"));
        assert_eq!(transport.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_json_answer_is_failed_result() {
        let transport = FakeTransport::new(vec![Ok("I cannot read this invoice.".to_string())]);
        let normalizer = ChatNormalizer::with_transport(transport, &config());

        let result = normalizer.normalize("text", "inv.pdf").await;

        assert!(result.lines.is_empty());
        assert!(result.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_pacing() {
        let transport = FakeTransport::new(vec![Ok(ANSWER.to_string()), Ok(ANSWER.to_string())]);
        let config = DelegateConfig {
            min_interval_ms: 1_500,
            ..config()
        };
        let first = ChatNormalizer::with_transport(transport.clone(), &config);
        let second = first.clone();
        let start = Instant::now();

        first.normalize("one", "a.pdf").await;
        second.normalize("two", "b.pdf").await;

        assert_eq!(
            transport.call_times(start),
            vec![Duration::ZERO, Duration::from_millis(1_500)]
        );
    }

    #[test]
    fn test_missing_api_key() {
        let config = DelegateConfig {
            api_key_env: "INVROLL_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        let err = ChatNormalizer::from_config(&config).err().unwrap();
        assert!(matches!(err, RemoteError::MissingConfig(_)));
    }
}
