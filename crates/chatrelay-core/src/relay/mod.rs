//! Relay loop
//!
//! ```text
//! Telegram ──InboundMessage──▶ RelayHandler ──CompletionRequest──▶ LlmClient
//!                                   │  ▲
//!                     lock window   │  │ record answer after delivery
//!                                   ▼  │
//!                           ConversationStore
//! ```

mod handler;
mod store;

pub use handler::{RelayError, RelayHandler, RelayHandlerConfig, RelayStats, compose_reply};
pub use store::{ConversationStore, WindowScope};
