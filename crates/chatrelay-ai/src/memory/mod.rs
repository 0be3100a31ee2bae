//! Conversation memory for the relay
//!
//! The window keeps a fixed preamble, a bounded trail of assistant replies
//! and the latest user turn, and assembles them into the message list sent
//! with each completion request.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  ConversationWindow                                      │
//! │  preamble: [system]          (fixed at construction)     │
//! │  pending:  user turn         (replaced every event)      │
//! │  history:  VecDeque<Message> (trimmed to max_history)    │
//! │                                                          │
//! │  assemble() = preamble ++ [pending] ++ history           │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod window;

pub use window::{AssemblyOrder, ConversationWindow, DEFAULT_MAX_HISTORY};
