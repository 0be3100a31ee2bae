//! Conversation windows owned by the relay loop

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chatrelay_ai::ConversationWindow;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// How conversation windows are shared between chats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowScope {
    /// One window for every chat the bot talks to
    #[default]
    Shared,
    /// One window per conversation id
    PerConversation,
}

impl WindowScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::PerConversation => "per_conversation",
        }
    }
}

impl fmt::Display for WindowScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowScope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "shared" | "global" => Ok(Self::Shared),
            "per_conversation" | "per_chat" => Ok(Self::PerConversation),
            other => Err(format!(
                "unknown window scope '{}' (expected shared or per_conversation)",
                other
            )),
        }
    }
}

const SHARED_KEY: &str = "*";

/// Hands out exclusive access to conversation windows.
///
/// Windows are created lazily by cloning the template, so every conversation
/// starts with the same preamble, bound and assembly order.
pub struct ConversationStore {
    template: ConversationWindow,
    scope: WindowScope,
    windows: Mutex<HashMap<String, Arc<Mutex<ConversationWindow>>>>,
}

impl ConversationStore {
    pub fn new(template: ConversationWindow, scope: WindowScope) -> Self {
        Self {
            template,
            scope,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn scope(&self) -> WindowScope {
        self.scope
    }

    fn key_for<'a>(&self, conversation_id: &'a str) -> &'a str {
        match self.scope {
            WindowScope::Shared => SHARED_KEY,
            WindowScope::PerConversation => conversation_id,
        }
    }

    /// Lock the window serving `conversation_id`.
    ///
    /// The guard is held for a whole exchange; a second exchange on the same
    /// window waits until it is dropped.
    pub async fn window(&self, conversation_id: &str) -> OwnedMutexGuard<ConversationWindow> {
        let key = self.key_for(conversation_id);
        let window = {
            let mut windows = self.windows.lock().await;
            windows
                .entry(key.to_string())
                .or_insert_with(|| {
                    debug!("Creating conversation window for {}", key);
                    Arc::new(Mutex::new(self.template.clone()))
                })
                .clone()
        };
        window.lock_owned().await
    }

    /// Number of windows created so far
    pub async fn conversation_count(&self) -> usize {
        self.windows.lock().await.len()
    }
}
