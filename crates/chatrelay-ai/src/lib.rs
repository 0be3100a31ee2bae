//! chatrelay AI - completion client and conversation window
//!
//! This crate provides:
//! - Chat message types shared with the completion API (`Message`, `Role`)
//! - `LlmClient` trait and an OpenAI-compatible `/chat/completions` client
//! - `ConversationWindow`, the bounded history and request assembly policy

pub mod error;
pub mod http_client;
pub mod llm;
pub mod memory;

// Re-export commonly used types
pub use error::{AiError, Result};
pub use http_client::build_http_client;
pub use llm::{
    Choice, CompletionRequest, CompletionResponse, FinishReason, LlmClient, Message, OpenAIClient,
    Role, TokenUsage,
};
#[cfg(any(test, feature = "test-utils"))]
pub use llm::{MockLlmClient, MockStep};
pub use memory::{AssemblyOrder, ConversationWindow, DEFAULT_MAX_HISTORY};
