// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider adapter for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` with scripted replies,
//! enabling fast, CI-runnable tests without external API calls. Replies can
//! carry log-probabilities and inject transient or permanent failures to
//! exercise the engine's retry and escalation paths.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::Mutex;

use cascade_core::traits::{ChunkStream, PluginAdapter, ProviderAdapter};
use cascade_core::types::{
    AdapterType, HealthStatus, ProviderRequest, ProviderResponse, ProviderStreamChunk,
    StreamEventType, TokenUsage,
};
use cascade_core::CascadeError;

/// One scripted provider behavior, consumed in FIFO order.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this content, optionally with per-token logprobs.
    Reply {
        content: String,
        logprobs: Option<Vec<f32>>,
    },
    /// Fail with a retryable provider error.
    TransientFailure(String),
    /// Fail with a non-retryable provider error.
    PermanentFailure(String),
}

impl MockReply {
    /// A plain text reply with no logprobs.
    pub fn text(content: impl Into<String>) -> Self {
        MockReply::Reply {
            content: content.into(),
            logprobs: None,
        }
    }

    /// A text reply with per-token natural-log probabilities.
    pub fn with_logprobs(content: impl Into<String>, logprobs: Vec<f32>) -> Self {
        MockReply::Reply {
            content: content.into(),
            logprobs: Some(logprobs),
        }
    }
}

/// A mock LLM provider that plays back scripted replies.
///
/// Replies are popped from a FIFO queue; when the queue is empty, a default
/// "mock response" text is returned. Invocations are counted per model so
/// tests can assert which cascade positions were actually exercised.
pub struct MockProvider {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<Mutex<HashMap<String, usize>>>,
}

impl MockProvider {
    /// Create a mock provider with an empty reply queue.
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a mock provider pre-loaded with the given replies.
    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Add a reply to the end of the queue.
    pub async fn push_reply(&self, reply: MockReply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Number of invocations (complete + stream) made against `model`.
    pub async fn calls_for(&self, model: &str) -> usize {
        self.calls.lock().await.get(model).copied().unwrap_or(0)
    }

    /// Total invocations across all models.
    pub async fn total_calls(&self) -> usize {
        self.calls.lock().await.values().sum()
    }

    async fn record_call(&self, model: &str) {
        *self.calls.lock().await.entry(model.to_string()).or_insert(0) += 1;
    }

    /// Pop the next reply, or fall back to a default text reply.
    async fn next_reply(&self) -> MockReply {
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| MockReply::text("mock response"))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Rough token estimate used for deterministic mock usage accounting.
fn estimate_tokens(text: &str) -> u32 {
    (text.len() / 4).max(1) as u32
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, CascadeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CascadeError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, CascadeError> {
        self.record_call(&request.model).await;

        match self.next_reply().await {
            MockReply::Reply { content, logprobs } => Ok(ProviderResponse {
                usage: TokenUsage {
                    input_tokens: estimate_tokens(&request.query),
                    output_tokens: estimate_tokens(&content),
                },
                logprobs: if request.logprobs { logprobs } else { None },
                content,
                model: request.model,
                latency: Duration::from_millis(1),
            }),
            MockReply::TransientFailure(message) => Err(CascadeError::transient(message)),
            MockReply::PermanentFailure(message) => Err(CascadeError::permanent(message)),
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkStream, CascadeError> {
        self.record_call(&request.model).await;

        let (content, _) = match self.next_reply().await {
            MockReply::Reply { content, logprobs } => (content, logprobs),
            MockReply::TransientFailure(message) => {
                return Err(CascadeError::transient(message));
            }
            MockReply::PermanentFailure(message) => {
                return Err(CascadeError::permanent(message));
            }
        };

        let usage = TokenUsage {
            input_tokens: estimate_tokens(&request.query),
            output_tokens: estimate_tokens(&content),
        };
        let chunks = vec![
            Ok(ProviderStreamChunk {
                event_type: StreamEventType::Start,
                text: None,
                usage: None,
            }),
            Ok(ProviderStreamChunk {
                event_type: StreamEventType::Delta,
                text: Some(content),
                usage: None,
            }),
            Ok(ProviderStreamChunk {
                event_type: StreamEventType::Stop,
                text: None,
                usage: Some(usage),
            }),
        ];

        Ok(Box::pin(stream::iter(chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn req(model: &str) -> ProviderRequest {
        ProviderRequest {
            model: model.to_string(),
            query: "test query".to_string(),
            max_tokens: 100,
            logprobs: true,
        }
    }

    #[tokio::test]
    async fn default_reply_when_queue_empty() {
        let provider = MockProvider::new();
        let resp = provider.complete(req("draft-s")).await.unwrap();
        assert_eq!(resp.content, "mock response");
        assert_eq!(resp.model, "draft-s");
    }

    #[tokio::test]
    async fn scripted_replies_returned_in_order() {
        let provider = MockProvider::with_replies(vec![
            MockReply::text("first"),
            MockReply::text("second"),
        ]);
        assert_eq!(provider.complete(req("m")).await.unwrap().content, "first");
        assert_eq!(provider.complete(req("m")).await.unwrap().content, "second");
        assert_eq!(
            provider.complete(req("m")).await.unwrap().content,
            "mock response"
        );
    }

    #[tokio::test]
    async fn logprobs_only_returned_when_requested() {
        let provider = MockProvider::with_replies(vec![
            MockReply::with_logprobs("a", vec![-0.1, -0.2]),
            MockReply::with_logprobs("b", vec![-0.1, -0.2]),
        ]);
        let with = provider.complete(req("m")).await.unwrap();
        assert_eq!(with.logprobs.as_deref(), Some(&[-0.1f32, -0.2][..]));

        let mut no_logprobs = req("m");
        no_logprobs.logprobs = false;
        let without = provider.complete(no_logprobs).await.unwrap();
        assert!(without.logprobs.is_none());
    }

    #[tokio::test]
    async fn injected_failures_surface_with_correct_kind() {
        let provider = MockProvider::with_replies(vec![
            MockReply::TransientFailure("overloaded".to_string()),
            MockReply::PermanentFailure("invalid api key".to_string()),
        ]);
        let transient = provider.complete(req("m")).await.unwrap_err();
        assert!(transient.is_transient());
        let permanent = provider.complete(req("m")).await.unwrap_err();
        assert!(!permanent.is_transient());
    }

    #[tokio::test]
    async fn invocations_counted_per_model() {
        let provider = MockProvider::new();
        provider.complete(req("draft-s")).await.unwrap();
        provider.complete(req("draft-s")).await.unwrap();
        provider.complete(req("verifier-xl")).await.unwrap();
        assert_eq!(provider.calls_for("draft-s").await, 2);
        assert_eq!(provider.calls_for("verifier-xl").await, 1);
        assert_eq!(provider.calls_for("unused").await, 0);
        assert_eq!(provider.total_calls().await, 3);
    }

    #[tokio::test]
    async fn stream_produces_start_delta_stop() {
        let provider = MockProvider::with_replies(vec![MockReply::text("streamed text")]);
        let mut stream = provider.stream(req("m")).await.unwrap();
        let mut events = Vec::new();
        while let Some(chunk) = stream.next().await {
            events.push(chunk.unwrap());
        }

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event_type, StreamEventType::Start);
        assert_eq!(events[1].event_type, StreamEventType::Delta);
        assert_eq!(events[1].text.as_deref(), Some("streamed text"));
        assert_eq!(events[2].event_type, StreamEventType::Stop);
        assert!(events[2].usage.is_some());
    }
}
