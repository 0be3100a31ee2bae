//! Conversation Window - bounded history and request assembly
//!
//! # Example
//!
//! ```
//! use chatrelay_ai::memory::ConversationWindow;
//! use chatrelay_ai::llm::Message;
//!
//! let mut window = ConversationWindow::with_system_prompt("Be brief", 8);
//! window.record_user_turn("hello");
//! window.trim_history();
//!
//! let messages = window.assemble();
//! assert_eq!(messages, vec![Message::system("Be brief"), Message::user("hello")]);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::llm::Message;

/// Default number of history turns kept between requests
pub const DEFAULT_MAX_HISTORY: usize = 8;

/// Where the pending user turn goes in the assembled message list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyOrder {
    /// `preamble ++ [pending] ++ history`
    #[default]
    PendingFirst,
    /// `preamble ++ history ++ [pending]`
    Chronological,
}

impl AssemblyOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingFirst => "pending_first",
            Self::Chronological => "chronological",
        }
    }
}

impl fmt::Display for AssemblyOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssemblyOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pending_first" => Ok(Self::PendingFirst),
            "chronological" => Ok(Self::Chronological),
            other => Err(format!(
                "unknown assembly order '{}' (expected pending_first or chronological)",
                other
            )),
        }
    }
}

/// Rolling conversation state for one chat (or for every chat when shared)
///
/// History only receives assistant replies; user turns live in `pending`
/// until the next event replaces them. The bound is enforced by
/// [`trim_history`](Self::trim_history), which the relay calls before every
/// assembly, so history may hold `max_history + 1` entries between the
/// moment a reply is recorded and the next trim.
#[derive(Debug, Clone)]
pub struct ConversationWindow {
    preamble: Vec<Message>,
    history: VecDeque<Message>,
    pending: Option<Message>,
    max_history: usize,
    order: AssemblyOrder,
}

impl ConversationWindow {
    /// Create a window with the given preamble and history bound
    pub fn new(preamble: Vec<Message>, max_history: usize) -> Self {
        Self {
            preamble,
            history: VecDeque::new(),
            pending: None,
            max_history,
            order: AssemblyOrder::default(),
        }
    }

    /// Create a window whose preamble is one system message
    pub fn with_system_prompt(prompt: impl Into<String>, max_history: usize) -> Self {
        Self::new(vec![Message::system(prompt)], max_history)
    }

    /// Choose where the pending turn is placed by `assemble`
    pub fn with_order(mut self, order: AssemblyOrder) -> Self {
        self.order = order;
        self
    }

    /// Replace the pending user turn
    pub fn record_user_turn(&mut self, text: impl Into<String>) {
        self.pending = Some(Message::user(text));
    }

    /// Append an assistant reply to history
    pub fn record_assistant_turn(&mut self, text: impl Into<String>) {
        self.history.push_back(Message::assistant(text));
    }

    /// Drop the oldest history entries beyond `max_history`
    pub fn trim_history(&mut self) {
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    /// Build the ordered message list for the next request
    ///
    /// Does not mutate the window; the pending slot is omitted when no user
    /// turn has been recorded yet.
    pub fn assemble(&self) -> Vec<Message> {
        let mut messages =
            Vec::with_capacity(self.preamble.len() + 1 + self.history.len());
        messages.extend(self.preamble.iter().cloned());

        match self.order {
            AssemblyOrder::PendingFirst => {
                messages.extend(self.pending.iter().cloned());
                messages.extend(self.history.iter().cloned());
            }
            AssemblyOrder::Chronological => {
                messages.extend(self.history.iter().cloned());
                messages.extend(self.pending.iter().cloned());
            }
        }

        messages
    }

    pub fn preamble(&self) -> &[Message] {
        &self.preamble
    }

    pub fn history(&self) -> Vec<Message> {
        self.history.iter().cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn pending(&self) -> Option<&Message> {
        self.pending.as_ref()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn order(&self) -> AssemblyOrder {
        self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    fn window() -> ConversationWindow {
        ConversationWindow::with_system_prompt("P", DEFAULT_MAX_HISTORY)
    }

    #[test]
    fn test_assemble_empty_history() {
        let mut window = window();
        window.record_user_turn("U");
        window.trim_history();

        assert_eq!(
            window.assemble(),
            vec![Message::system("P"), Message::user("U")]
        );
    }

    #[test]
    fn test_assemble_without_pending() {
        let window = window();
        assert_eq!(window.assemble(), vec![Message::system("P")]);
    }

    #[test]
    fn test_pending_precedes_history() {
        let mut window = window();
        window.record_assistant_turn("a1");
        window.record_assistant_turn("a2");
        window.record_user_turn("u3");

        let roles: Vec<Role> = window.assemble().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Assistant]
        );
        assert_eq!(window.assemble()[2].content, "a1");
    }

    #[test]
    fn test_chronological_order() {
        let mut window = window().with_order(AssemblyOrder::Chronological);
        window.record_assistant_turn("a1");
        window.record_user_turn("u2");

        assert_eq!(
            window.assemble(),
            vec![
                Message::system("P"),
                Message::assistant("a1"),
                Message::user("u2")
            ]
        );
    }

    #[test]
    fn test_assemble_is_idempotent() {
        let mut window = window();
        window.record_assistant_turn("a1");
        window.record_user_turn("u2");

        assert_eq!(window.assemble(), window.assemble());
    }

    #[test]
    fn test_pending_is_replaced_not_accumulated() {
        let mut window = window();
        window.record_user_turn("first");
        window.record_user_turn("second");

        let messages = window.assemble();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "second");
        assert_eq!(window.history_len(), 0);
    }

    #[test]
    fn test_trim_keeps_most_recent() {
        let mut window = ConversationWindow::with_system_prompt("P", 3);
        for i in 0..5 {
            window.record_assistant_turn(format!("a{}", i));
        }
        assert_eq!(window.history_len(), 5);

        window.trim_history();

        let contents: Vec<String> = window.history().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["a2", "a3", "a4"]);
    }

    #[test]
    fn test_trim_noop_under_bound() {
        let mut window = window();
        window.record_assistant_turn("a0");
        window.trim_history();
        assert_eq!(window.history_len(), 1);
    }

    #[test]
    fn test_bounded_over_many_exchanges() {
        let mut window = window();

        for i in 0..20 {
            window.record_user_turn(format!("u{}", i));
            window.trim_history();
            let messages = window.assemble();

            let expected_history = i.min(DEFAULT_MAX_HISTORY);
            assert_eq!(messages.len(), 2 + expected_history);
            assert!(messages.len() <= DEFAULT_MAX_HISTORY + 2);

            // History portion holds the most recent replies, oldest first.
            let history: Vec<&str> = messages[2..].iter().map(|m| m.content.as_str()).collect();
            let first = i - expected_history;
            let expected: Vec<String> = (first..i).map(|n| format!("a{}", n)).collect();
            assert_eq!(history, expected);

            window.record_assistant_turn(format!("a{}", i));
        }
    }

    #[test]
    fn test_empty_text_is_a_valid_turn() {
        let mut window = window();
        window.record_user_turn("");
        assert_eq!(window.pending(), Some(&Message::user("")));
    }

    #[test]
    fn test_unbounded_limit_does_not_preallocate() {
        let mut window = ConversationWindow::with_system_prompt("P", usize::MAX);
        window.record_user_turn("u");
        window.record_assistant_turn("a");
        window.trim_history();

        assert_eq!(window.max_history(), usize::MAX);
        assert_eq!(window.history(), vec![Message::assistant("a")]);
    }

    #[test]
    fn test_assembly_order_parse() {
        assert_eq!(
            "pending_first".parse::<AssemblyOrder>().unwrap(),
            AssemblyOrder::PendingFirst
        );
        assert_eq!(
            "Chronological".parse::<AssemblyOrder>().unwrap(),
            AssemblyOrder::Chronological
        );
        assert!("newest".parse::<AssemblyOrder>().is_err());
    }
}
