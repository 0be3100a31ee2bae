//! OpenAI-compatible chat completion provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{AiError, Result, response_to_error};
use crate::http_client::build_http_client;
use crate::llm::client::{
    Choice, CompletionRequest, CompletionResponse, FinishReason, LlmClient, Message, Role,
    TokenUsage,
};

const PROVIDER: &str = "OpenAI";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
/// Default timeout for one completion call (seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// OpenAI client
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAIClient {
    /// Create a new OpenAI client
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: build_http_client(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set custom base URL (for API-compatible services)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound the duration of each completion call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn transport_error(&self, err: reqwest::Error) -> AiError {
        if err.is_timeout() {
            AiError::Timeout(self.timeout.as_secs())
        } else {
            AiError::Http(err)
        }
    }
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    object: String,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    index: u32,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

fn parse_role(role: Option<&str>) -> Role {
    match role {
        Some("system") => Role::System,
        Some("user") => Role::User,
        _ => Role::Assistant,
    }
}

/// Decode a `/chat/completions` body, rejecting responses without choices.
fn parse_completion_body(body: &str) -> Result<CompletionResponse> {
    let data: OpenAIResponse =
        serde_json::from_str(body).map_err(|e| AiError::InvalidFormat(e.to_string()))?;

    if data.choices.is_empty() {
        return Err(AiError::EmptyChoices(PROVIDER.to_string()));
    }

    let choices = data
        .choices
        .into_iter()
        .map(|choice| Choice {
            message: Message {
                role: parse_role(choice.message.role.as_deref()),
                content: choice.message.content.unwrap_or_default(),
            },
            finish_reason: FinishReason::from(choice.finish_reason.as_deref().unwrap_or("stop")),
            index: choice.index,
        })
        .collect();

    let usage = data
        .usage
        .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens, u.total_tokens))
        .unwrap_or_default();

    Ok(CompletionResponse {
        id: data.id,
        object: data.object,
        created: data.created,
        model: data.model,
        usage,
        choices,
    })
}

#[async_trait]
impl LlmClient for OpenAIClient {
    fn provider(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = OpenAIRequest {
            model: request.model.as_deref().unwrap_or(&self.model),
            messages: &request.messages,
        };
        debug!(payload = %serde_json::to_string(&body)?, "Sending completion request");

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(response_to_error(response, PROVIDER).await);
        }

        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;
        let parsed = parse_completion_body(&text)?;
        debug!(
            id = %parsed.id,
            total_tokens = parsed.usage.total_tokens,
            "Completion received"
        );
        Ok(parsed)
    }
}
