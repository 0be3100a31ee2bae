//! Chat channel layer
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         trait Channel                   │
//! │  - send(message)                        │
//! │  - send_typing(conversation_id)         │
//! │  - start_receiving() -> Stream          │
//! └─────────────────────────────────────────┘
//!              │
//!              ▼
//!          Telegram (Bot API, long-polling)
//! ```
//!
//! `InboundMessage` and `OutboundMessage` are channel-agnostic; the relay
//! loop only talks to `dyn Channel`.

mod chunk;
mod error;
pub mod telegram;
mod traits;
mod types;

pub use chunk::chunk_text;
pub use error::ChannelError;
pub use telegram::{TelegramChannel, TelegramConfig, TelegramUser};
pub use traits::{Channel, InboundStream};
pub use types::{ChannelType, InboundMessage, MessageLevel, OutboundMessage};

#[cfg(test)]
pub use traits::mock;
