//! Telegram Channel Implementation
//!
//! Talks to the Telegram Bot API: `sendMessage` and `sendChatAction` for
//! outbound traffic, `getUpdates` long-polling for inbound text messages.

use async_trait::async_trait;
use chatrelay_ai::build_http_client;
use reqwest::{Client, Response};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::chunk::chunk_text;
use super::error::ChannelError;
use super::traits::{Channel, InboundStream};
use super::types::{ChannelType, InboundMessage, OutboundMessage};

const CHANNEL_NAME: &str = "Telegram";
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
/// Default timeout for Telegram API calls (seconds)
const API_TIMEOUT_SECS: u64 = 30;

#[cfg(test)]
const POLL_ERROR_BACKOFF: Duration = Duration::from_millis(20);
#[cfg(not(test))]
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Telegram channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    pub bot_token: String,
    /// Long-polling timeout in seconds (default: 60)
    #[serde(default = "default_polling_timeout")]
    pub polling_timeout: u32,
    /// Bot API base URL, overridable for tests and self-hosted API servers
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_polling_timeout() -> u32 {
    60
}

fn default_api_base() -> String {
    TELEGRAM_API_BASE.to_string()
}

impl TelegramConfig {
    /// Create a new config with just the bot token
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            polling_timeout: default_polling_timeout(),
            api_base: default_api_base(),
        }
    }

    /// Set polling timeout
    pub fn with_polling_timeout(mut self, timeout: u32) -> Self {
        self.polling_timeout = timeout;
        self
    }

    /// Set API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

/// Telegram channel implementation
pub struct TelegramChannel {
    config: TelegramConfig,
    client: Client,
    /// Whether polling is active
    polling_active: Arc<AtomicBool>,
    /// Bumped on every start and stop; a poller exits once it no longer owns the current value
    poll_generation: Arc<AtomicU64>,
    /// Last update ID for long-polling
    last_update_id: Arc<AtomicI64>,
}

impl TelegramChannel {
    /// Parse conversation_id into (chat_id, thread_id)
    /// Format: "chat_id" or "chat_id:thread_id"
    fn parse_conversation_id(conversation_id: &str) -> (String, Option<i64>) {
        match conversation_id.split_once(':') {
            Some((chat_id, thread_part)) => (chat_id.to_string(), thread_part.parse::<i64>().ok()),
            None => (conversation_id.to_string(), None),
        }
    }

    fn build_conversation_id(chat_id: i64, message_thread_id: Option<i64>) -> String {
        match message_thread_id {
            Some(thread_id) => format!("{}:{}", chat_id, thread_id),
            None => chat_id.to_string(),
        }
    }

    /// Create a new Telegram channel
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: build_http_client(),
            polling_active: Arc::new(AtomicBool::new(false)),
            poll_generation: Arc::new(AtomicU64::new(0)),
            last_update_id: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Create with just bot token
    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self::new(TelegramConfig::new(bot_token))
    }

    /// Return current last processed update ID.
    pub fn last_update_id(&self) -> i64 {
        self.last_update_id.load(Ordering::SeqCst)
    }

    /// Whether the background poller is running
    pub fn is_polling(&self) -> bool {
        self.polling_active.load(Ordering::SeqCst)
    }

    /// Whether the poller started as `generation` is still the current one
    fn owns_polling(&self, generation: u64) -> bool {
        self.polling_active.load(Ordering::SeqCst)
            && self.poll_generation.load(Ordering::SeqCst) == generation
    }

    /// Lower the flag unless a newer poller has taken over
    fn release_polling(&self, generation: u64) {
        if self
            .poll_generation
            .compare_exchange(
                generation,
                generation + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
        {
            self.polling_active.store(false, Ordering::SeqCst);
        }
    }

    /// Get the API URL for a method
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base, self.config.bot_token, method
        )
    }

    /// Call a Bot API method with a JSON body and unwrap its `result`
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T, ChannelError> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(params)
            .timeout(timeout)
            .send()
            .await?;

        read_response(response).await
    }

    /// Send plain text via Telegram API
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        message_thread_id: Option<i64>,
    ) -> Result<(), ChannelError> {
        let mut params = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        if let Some(thread_id) = message_thread_id {
            params["message_thread_id"] = serde_json::Value::Number(thread_id.into());
        }

        let _: IgnoredAny = self
            .call(
                "sendMessage",
                &params,
                Duration::from_secs(API_TIMEOUT_SECS),
            )
            .await?;
        Ok(())
    }

    /// Poll for updates using long-polling; the caller advances the offset
    async fn poll_updates(&self) -> Result<Vec<TelegramUpdate>, ChannelError> {
        let offset = self.last_update_id.load(Ordering::SeqCst);
        let params = serde_json::json!({
            "offset": if offset > 0 { offset + 1 } else { 0 },
            "timeout": self.config.polling_timeout,
            "allowed_updates": ["message"],
        });

        let updates: Vec<TelegramUpdate> = self
            .call(
                "getUpdates",
                &params,
                Duration::from_secs(self.config.polling_timeout as u64 + 10),
            )
            .await?;

        Ok(updates)
    }

    /// Convert Telegram update to InboundMessage; updates without text yield None
    fn convert_update(update: TelegramUpdate) -> Option<InboundMessage> {
        let message = update.message?;
        let text = message.text?;
        let conversation_id =
            Self::build_conversation_id(message.chat.id, message.message_thread_id);

        let sender_id = message
            .from
            .as_ref()
            .map(|from| from.id.to_string())
            .unwrap_or_else(|| message.chat.id.to_string());

        let sender_name = message.from.as_ref().and_then(|from| {
            from.username
                .clone()
                .or_else(|| {
                    Some(format!(
                        "{}{}",
                        from.first_name.as_deref().unwrap_or(""),
                        from.last_name
                            .as_ref()
                            .map(|l| format!(" {}", l))
                            .unwrap_or_default()
                    ))
                })
                .filter(|s| !s.is_empty())
        });

        let mut metadata = serde_json::json!({
            "chat_type": message.chat.r#type,
            "chat_title": message.chat.title,
            "update_id": update.update_id,
        });
        if let Some(thread_id) = message.message_thread_id {
            metadata["message_thread_id"] = serde_json::Value::Number(thread_id.into());
        }

        let mut inbound = InboundMessage::new(
            format!("tg_{}", message.message_id),
            ChannelType::Telegram,
            sender_id,
            conversation_id,
            text,
        )
        .with_metadata(metadata);
        if let Some(name) = sender_name {
            inbound = inbound.with_sender_name(name);
        }

        Some(inbound)
    }

    /// Test the connection by calling getMe
    pub async fn test_connection(&self) -> Result<TelegramUser, ChannelError> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .send()
            .await?;

        read_response(response).await
    }

    /// Send typing indicator (chat action) to show the bot is processing
    async fn send_typing_action(&self, chat_id: &str) -> Result<(), ChannelError> {
        let params = serde_json::json!({
            "chat_id": chat_id,
            "action": "typing",
        });

        let _: bool = self
            .call(
                "sendChatAction",
                &params,
                Duration::from_secs(API_TIMEOUT_SECS),
            )
            .await?;
        debug!("Sent typing indicator to {}", chat_id);
        Ok(())
    }
}

/// Decode a Bot API envelope, mapping `ok:false` and HTTP errors
async fn read_response<T: DeserializeOwned>(response: Response) -> Result<T, ChannelError> {
    let status = response.status();
    let body = response.text().await?;

    let envelope = serde_json::from_str::<TelegramResponse<T>>(&body);

    if !status.is_success() {
        // Telegram reports failures as `{"ok":false,"description":...}` with 4xx.
        if let Ok(TelegramResponse {
            description: Some(description),
            ..
        }) = envelope
        {
            return Err(ChannelError::Api {
                channel: CHANNEL_NAME,
                description,
            });
        }
        return Err(ChannelError::Http {
            channel: CHANNEL_NAME,
            status: status.as_u16(),
            body,
        });
    }

    let envelope = envelope.map_err(|e| ChannelError::Api {
        channel: CHANNEL_NAME,
        description: format!("unreadable response: {}", e),
    })?;

    if !envelope.ok {
        return Err(ChannelError::Api {
            channel: CHANNEL_NAME,
            description: envelope.description.unwrap_or_default(),
        });
    }

    envelope
        .result
        .ok_or(ChannelError::MissingResult(CHANNEL_NAME))
}

#[async_trait]
impl Channel for TelegramChannel {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Telegram
    }

    fn is_configured(&self) -> bool {
        !self.config.bot_token.is_empty()
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), ChannelError> {
        let formatted = message.formatted_content();
        let (chat_id, thread_id) = Self::parse_conversation_id(&message.conversation_id);

        for chunk in chunk_text(&formatted, None) {
            self.send_message(&chat_id, &chunk, thread_id).await?;
        }

        Ok(())
    }

    async fn send_typing(&self, conversation_id: &str) -> Result<(), ChannelError> {
        let (chat_id, _) = Self::parse_conversation_id(conversation_id);
        self.send_typing_action(&chat_id).await
    }

    fn start_receiving(&self) -> Option<InboundStream> {
        if !self.is_configured() {
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let channel = TelegramChannel {
            config: self.config.clone(),
            client: self.client.clone(),
            polling_active: self.polling_active.clone(),
            poll_generation: self.poll_generation.clone(),
            last_update_id: self.last_update_id.clone(),
        };

        // Claim the generation and raise the flag before the task exists, so a
        // stop issued right after this call is never overwritten.
        let generation = self.poll_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.polling_active.store(true, Ordering::SeqCst);

        // Spawn polling task
        tokio::spawn(async move {
            info!("Starting Telegram polling");

            while channel.owns_polling(generation) {
                match channel.poll_updates().await {
                    Ok(updates) => {
                        // A stop or restart during the request: leave these
                        // updates unacknowledged for the next poller.
                        if !channel.owns_polling(generation) {
                            break;
                        }
                        if let Some(last) = updates.last() {
                            channel
                                .last_update_id
                                .store(last.update_id, Ordering::SeqCst);
                        }
                        for update in updates {
                            let update_id = update.update_id;
                            let Some(message) = Self::convert_update(update) else {
                                debug!("Skipping Telegram update {} without text", update_id);
                                continue;
                            };
                            debug!(
                                "Received Telegram message: {} from {}",
                                message.id, message.sender_id
                            );
                            if tx.send(message).is_err() {
                                warn!("Message receiver dropped, stopping polling");
                                channel.release_polling(generation);
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        error!("Telegram polling error: {}", e);
                        // Back off on error
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    }
                }
            }

            info!("Telegram polling stopped");
        });

        Some(Box::pin(
            tokio_stream::wrappers::UnboundedReceiverStream::new(rx),
        ))
    }

    fn stop_receiving(&self) {
        self.poll_generation.fetch_add(1, Ordering::SeqCst);
        self.polling_active.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// Telegram API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
    from: Option<TelegramUser>,
    chat: TelegramChat,
    message_thread_id: Option<i64>,
    text: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
    r#type: String,
    title: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
