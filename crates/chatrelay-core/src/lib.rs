//! chatrelay core - chat transport, configuration and the relay loop
//!
//! Inbound Telegram messages are fed through a [`relay::RelayHandler`],
//! which keeps the conversation window, asks the completion API for a reply
//! and sends it back to the originating chat.

pub mod channel;
pub mod config;
pub mod relay;

pub use config::{ConfigError, ConfigOverrides, FileConfig, RelayConfig};
pub use relay::{
    ConversationStore, RelayError, RelayHandler, RelayHandlerConfig, RelayStats, WindowScope,
};
