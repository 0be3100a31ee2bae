//! Channel Trait Definitions

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use super::error::ChannelError;
use super::types::{ChannelType, InboundMessage, OutboundMessage};

/// Stream of inbound messages handed out by `Channel::start_receiving`
pub type InboundStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// Chat transport used by the relay loop
///
/// Only text messages are surfaced through `start_receiving`; events without
/// a text body never reach the relay.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get channel type
    fn channel_type(&self) -> ChannelType;

    /// Get channel display name
    fn name(&self) -> &str {
        self.channel_type().display_name()
    }

    /// Check if channel is properly configured
    fn is_configured(&self) -> bool;

    /// Send a message to the channel
    async fn send(&self, message: OutboundMessage) -> Result<(), ChannelError>;

    /// Send a simple text message
    async fn send_text(&self, conversation_id: &str, text: &str) -> Result<(), ChannelError> {
        self.send(OutboundMessage::new(conversation_id, text)).await
    }

    /// Show a "typing" indicator; channels without one do nothing
    async fn send_typing(&self, conversation_id: &str) -> Result<(), ChannelError> {
        let _ = conversation_id;
        Ok(())
    }

    /// Start receiving messages (returns None if the channel can't receive)
    fn start_receiving(&self) -> Option<InboundStream>;

    /// Stop any background receiver started by `start_receiving`
    fn stop_receiving(&self) {}
}

/// Test/mock channel for unit testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc;

    /// A mock channel that records sent messages and replays injected ones
    pub struct MockChannel {
        channel_type: ChannelType,
        fail_sends: AtomicBool,
        sent_messages: Arc<tokio::sync::Mutex<Vec<OutboundMessage>>>,
        typing: Arc<tokio::sync::Mutex<Vec<String>>>,
        inbound_tx: mpsc::UnboundedSender<InboundMessage>,
        inbound_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<InboundMessage>>>,
    }

    impl MockChannel {
        pub fn new(channel_type: ChannelType) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                channel_type,
                fail_sends: AtomicBool::new(false),
                sent_messages: Arc::new(tokio::sync::Mutex::new(Vec::new())),
                typing: Arc::new(tokio::sync::Mutex::new(Vec::new())),
                inbound_tx: tx,
                inbound_rx: std::sync::Mutex::new(Some(rx)),
            }
        }

        /// Make every subsequent `send` fail
        pub fn fail_sends(&self, fail: bool) {
            self.fail_sends.store(fail, Ordering::SeqCst);
        }

        /// Get all sent messages
        pub async fn get_sent_messages(&self) -> Vec<OutboundMessage> {
            self.sent_messages.lock().await.clone()
        }

        /// Conversations that received a typing indicator
        pub async fn typing_requests(&self) -> Vec<String> {
            self.typing.lock().await.clone()
        }

        /// Sender used to inject inbound messages
        pub fn inbound_sender(&self) -> mpsc::UnboundedSender<InboundMessage> {
            self.inbound_tx.clone()
        }
    }

    #[async_trait]
    impl Channel for MockChannel {
        fn channel_type(&self) -> ChannelType {
            self.channel_type
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn send(&self, message: OutboundMessage) -> Result<(), ChannelError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(ChannelError::Http {
                    channel: "Mock",
                    status: 502,
                    body: "bad gateway".to_string(),
                });
            }
            self.sent_messages.lock().await.push(message);
            Ok(())
        }

        async fn send_typing(&self, conversation_id: &str) -> Result<(), ChannelError> {
            self.typing.lock().await.push(conversation_id.to_string());
            Ok(())
        }

        fn start_receiving(&self) -> Option<InboundStream> {
            let rx = self.inbound_rx.lock().ok()?.take()?;
            Some(Box::pin(
                tokio_stream::wrappers::UnboundedReceiverStream::new(rx),
            ))
        }
    }
}
