//! Relay Message Handler
//!
//! Consumes inbound chat messages, asks the completion API for an answer
//! over the conversation window and sends the reply back to the chat.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chatrelay_ai::{
    AiError, CompletionRequest, ConversationWindow, LlmClient, OpenAIClient, TokenUsage,
};
use thiserror::Error;
use tokio::time::sleep;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use super::store::ConversationStore;
use crate::channel::{
    Channel, ChannelError, InboundMessage, InboundStream, OutboundMessage, TelegramChannel,
    TelegramConfig,
};
use crate::config::RelayConfig;

#[cfg(test)]
const STREAM_RECONNECT_DELAY: Duration = Duration::from_millis(20);
#[cfg(not(test))]
const STREAM_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Errors for a single exchange; the loop logs them and moves on
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Completion failed: {0}")]
    Completion(#[from] AiError),

    #[error("Failed to deliver reply: {0}")]
    Transport(#[from] ChannelError),
}

impl RelayError {
    /// Short text shown to the chat user
    pub fn user_message(&self) -> String {
        match self {
            Self::Completion(AiError::Timeout(secs)) => {
                format!("The assistant did not answer within {} seconds. Please try again.", secs)
            }
            Self::Completion(AiError::LlmHttp { status: 401, .. })
            | Self::Completion(AiError::LlmHttp { status: 403, .. }) => {
                "The assistant is not authorised to use the completion API.".to_string()
            }
            Self::Completion(AiError::LlmHttp { status: 429, .. }) => {
                "The assistant is rate limited right now. Please try again later.".to_string()
            }
            Self::Completion(_) => {
                "The assistant could not produce an answer. Please try again.".to_string()
            }
            Self::Transport(_) => "The reply could not be delivered.".to_string(),
        }
    }
}

/// Relay handler configuration
#[derive(Debug, Clone)]
pub struct RelayHandlerConfig {
    /// Model id sent with every completion request
    pub model: String,
    /// Send a warning to the chat when an exchange fails
    pub notify_on_error: bool,
    /// Show a typing indicator while waiting for the completion
    pub send_typing: bool,
}

impl Default for RelayHandlerConfig {
    fn default() -> Self {
        Self {
            model: crate::config::DEFAULT_MODEL.to_string(),
            notify_on_error: true,
            send_typing: true,
        }
    }
}

/// Counters reported when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub handled: usize,
    pub failed: usize,
}

/// Reply text: the answer, a blank line, then the usage summary
pub fn compose_reply(answer: &str, usage: &TokenUsage) -> String {
    format!("{}\n\n{}", answer, usage.summary())
}

pub struct RelayHandler {
    channel: Arc<dyn Channel>,
    llm: Arc<dyn LlmClient>,
    store: ConversationStore,
    config: RelayHandlerConfig,
}

impl RelayHandler {
    pub fn new(
        channel: Arc<dyn Channel>,
        llm: Arc<dyn LlmClient>,
        store: ConversationStore,
        config: RelayHandlerConfig,
    ) -> Self {
        Self {
            channel,
            llm,
            store,
            config,
        }
    }

    /// Wire a Telegram channel and an OpenAI client from resolved settings
    pub fn from_config(config: &RelayConfig) -> Self {
        let channel = TelegramChannel::new(
            TelegramConfig::new(&config.bot_token)
                .with_polling_timeout(config.polling_timeout_secs)
                .with_api_base(&config.telegram_api_base),
        );

        let llm = OpenAIClient::new(&config.api_key)
            .with_model(&config.model)
            .with_base_url(&config.base_url)
            .with_timeout(config.request_timeout);

        let template = ConversationWindow::with_system_prompt(
            &config.system_prompt,
            config.history_limit,
        )
        .with_order(config.assembly_order);

        Self::new(
            Arc::new(channel),
            Arc::new(llm),
            ConversationStore::new(template, config.window_scope),
            RelayHandlerConfig {
                model: config.model.clone(),
                notify_on_error: config.notify_on_error,
                send_typing: config.typing_indicator,
            },
        )
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Run one exchange for `message`.
    ///
    /// The window stays locked until the reply is sent, and the answer is only
    /// recorded into history once delivery succeeded.
    pub async fn handle_message(&self, message: &InboundMessage) -> Result<(), RelayError> {
        debug!(
            "Received: {} from {} in {}",
            message.channel_type, message.sender_id, message.conversation_id
        );

        let mut window = self.store.window(&message.conversation_id).await;
        window.record_user_turn(message.content.as_str());
        window.trim_history();
        let messages = window.assemble();

        if self.config.send_typing {
            debug!("Sending typing indicator to {}", message.conversation_id);
            if let Err(e) = self.channel.send_typing(&message.conversation_id).await {
                warn!("Failed to send typing indicator: {}", e);
            }
        }

        let request = CompletionRequest::new(messages).with_model(&self.config.model);
        let response = self.llm.complete(request).await?;
        let answer = response.content().to_string();

        let reply = compose_reply(&answer, &response.usage);
        self.channel
            .send(OutboundMessage::new(&message.conversation_id, reply))
            .await?;

        window.record_assistant_turn(answer);

        info!(
            "Reply sent to {} ({})",
            message.conversation_id,
            response.usage.summary()
        );
        Ok(())
    }

    /// Tell the user an exchange failed; transport failures are only logged
    async fn notify_failure(&self, message: &InboundMessage, err: &RelayError) {
        if !self.config.notify_on_error || matches!(err, RelayError::Transport(_)) {
            return;
        }

        let notice = OutboundMessage::warning(&message.conversation_id, err.user_message());
        if let Err(e) = self.channel.send(notice).await {
            warn!("Failed to send error notice: {}", e);
        }
    }

    /// Process messages until the stream ends
    pub async fn run_stream(&self, mut stream: InboundStream) -> RelayStats {
        let mut stats = RelayStats::default();

        while let Some(message) = stream.next().await {
            match self.handle_message(&message).await {
                Ok(()) => {
                    stats.handled += 1;
                    debug!("Message {} handled successfully", message.id);
                }
                Err(e) => {
                    stats.failed += 1;
                    error!(
                        "Error handling message {} from {}: {}",
                        message.id, message.conversation_id, e
                    );
                    self.notify_failure(&message, &e).await;
                }
            }
            // Continue processing next message regardless of error
        }

        stats
    }

    /// Receive from the channel until `shutdown` resolves.
    ///
    /// A stream that ends is restarted after a short delay.
    pub async fn run<F>(&self, shutdown: F) -> RelayStats
    where
        F: Future<Output = ()>,
    {
        let channel_type = self.channel.channel_type();
        info!(
            "Starting relay on {} (model={}, window_scope={})",
            channel_type,
            self.config.model,
            self.store.scope()
        );

        let mut stats = RelayStats::default();
        tokio::pin!(shutdown);

        loop {
            let Some(stream) = self.channel.start_receiving() else {
                warn!(
                    "Failed to start message stream for {}, retrying in {:?}",
                    channel_type, STREAM_RECONNECT_DELAY
                );
                if reconnect_delay(shutdown.as_mut()).await {
                    break;
                }
                continue;
            };

            tokio::select! {
                _ = shutdown.as_mut() => break,
                round = self.run_stream(stream) => {
                    stats.handled += round.handled;
                    stats.failed += round.failed;
                    warn!(
                        "Message stream ended for {}, restarting in {:?}",
                        channel_type, STREAM_RECONNECT_DELAY
                    );
                }
            }

            if reconnect_delay(shutdown.as_mut()).await {
                break;
            }
        }

        self.channel.stop_receiving();
        info!(
            "Relay stopped ({} handled, {} failed)",
            stats.handled, stats.failed
        );
        stats
    }
}

/// Wait before reconnecting; true when shutdown fired first
async fn reconnect_delay<F: Future<Output = ()>>(shutdown: Pin<&mut F>) -> bool {
    tokio::select! {
        _ = shutdown => true,
        _ = sleep(STREAM_RECONNECT_DELAY) => false,
    }
}
