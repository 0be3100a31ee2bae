//! Deterministic mock LLM client for relay tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};

use crate::error::{AiError, Result};

use super::{
    Choice, CompletionRequest, CompletionResponse, FinishReason, LlmClient, Message, Role,
    TokenUsage,
};

/// Deterministic step for scripted mock completions.
#[derive(Debug, Clone)]
pub enum MockStepKind {
    /// Return a plain assistant message.
    Text { content: String, usage: TokenUsage },
    /// Return a response without choices.
    Empty,
    /// Return an HTTP status error.
    Status(u16),
    /// Return a timeout error.
    Timeout,
}

/// Scripted completion step with optional delay.
#[derive(Debug, Clone)]
pub struct MockStep {
    pub delay_ms: u64,
    pub kind: MockStepKind,
}

impl MockStep {
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        let usage = MockLlmClient::usage_for(content.len());
        Self {
            delay_ms: 0,
            kind: MockStepKind::Text { content, usage },
        }
    }

    pub fn text_with_usage(content: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Text {
                content: content.into(),
                usage,
            },
        }
    }

    pub fn empty() -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Empty,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Status(status),
        }
    }

    pub fn timeout() -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Timeout,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// A deterministic mock LLM client driven by scripted steps.
///
/// Every request is recorded so tests can inspect the assembled turns.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    model: String,
    script: Arc<Mutex<VecDeque<MockStep>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockLlmClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self::from_steps(model, Vec::new())
    }

    pub fn from_steps(model: impl Into<String>, steps: Vec<MockStep>) -> Self {
        Self {
            model: model.into(),
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn push_step(&self, step: MockStep) {
        self.script.lock().await.push_back(step);
    }

    /// Requests received so far, oldest first.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_step(&self) -> Option<MockStep> {
        self.script.lock().await.pop_front()
    }

    fn usage_for(content_len: usize) -> TokenUsage {
        let completion_tokens = content_len as u32;
        TokenUsage::new(1, completion_tokens, 1 + completion_tokens)
    }

    fn response(&self, content: String, usage: TokenUsage) -> CompletionResponse {
        CompletionResponse {
            id: "mock-completion".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: self.model.clone(),
            usage,
            choices: vec![Choice {
                message: Message::assistant(content),
                finish_reason: FinishReason::Stop,
                index: 0,
            }],
        }
    }

    fn fallback_response(&self, request: &CompletionRequest) -> CompletionResponse {
        let text = request
            .messages
            .iter()
            .rev()
            .find(|msg| msg.role == Role::User)
            .map(|msg| format!("mock-echo: {}", msg.content))
            .unwrap_or_else(|| "mock-ok".to_string());

        let usage = Self::usage_for(text.len());
        self.response(text, usage)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().await.push(request.clone());

        let Some(step) = self.next_step().await else {
            return Ok(self.fallback_response(&request));
        };

        if step.delay_ms > 0 {
            sleep(Duration::from_millis(step.delay_ms)).await;
        }

        match step.kind {
            MockStepKind::Text { content, usage } => Ok(self.response(content, usage)),
            MockStepKind::Empty => Err(AiError::EmptyChoices("mock".to_string())),
            MockStepKind::Status(status) => Err(AiError::LlmHttp {
                provider: "mock".to_string(),
                status,
                message: "scripted failure".to_string(),
            }),
            MockStepKind::Timeout => Err(AiError::Timeout(0)),
        }
    }
}
