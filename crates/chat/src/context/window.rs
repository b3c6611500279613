//! Conversation window construction.
//!
//! A window is the ordered message list sent on one model call:
//!
//! ```text
//! system | few-shot pairs | newest history that fits | final user message
//! ```
//!
//! Only the final user message and the included history count against the
//! budget. The system prompt and few-shots are always included and never
//! charged, so a large few-shot set can exceed `max_tokens` and starve real
//! history.

use super::token::TokenCounter;
use ragchat_core::message::{FewShotExample, HistoryTurn, Message, MessageContent};
use std::sync::Arc;
use tracing::debug;

/// Inputs for one window.
#[derive(Debug, Clone)]
pub struct WindowRequest<'a> {
    pub system_prompt: &'a str,
    pub model: &'a str,
    /// Full caller history. The last turn is the question being asked and is
    /// replaced by `user_content`.
    pub history: &'a [HistoryTurn],
    pub user_content: MessageContent,
    pub max_tokens: usize,
    pub few_shots: &'a [FewShotExample],
}

/// A built window plus what the budget did to the history.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationWindow {
    pub messages: Vec<Message>,
    /// Tokens charged against the budget (history + final user message)
    pub tokens_used: usize,
    pub history_included: usize,
    pub history_dropped: usize,
}

impl ConversationWindow {
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

/// Builds token-bounded conversation windows.
#[derive(Clone)]
pub struct WindowBuilder {
    counter: Arc<dyn TokenCounter>,
}

impl WindowBuilder {
    pub fn new(counter: Arc<dyn TokenCounter>) -> Self {
        Self { counter }
    }

    pub fn build(&self, request: WindowRequest<'_>) -> ConversationWindow {
        let user_message = Message::user(request.user_content);
        let mut used = self.counter.count(request.model, &user_message);

        let prior = match request.history.split_last() {
            Some((_, prior)) => prior,
            None => &[],
        };

        // Sliding window: include from newest → oldest, stop at the first
        // turn that doesn't fit so the kept history is contiguous.
        let mut included = Vec::new();
        for turn in prior.iter().rev() {
            let message = turn.to_message();
            let cost = self.counter.count(request.model, &message);
            if used + cost > request.max_tokens {
                debug!(
                    max_tokens = request.max_tokens,
                    "Reached max tokens, history will be truncated"
                );
                break;
            }
            used += cost;
            included.push(message);
        }

        // Reverse to restore chronological order.
        included.reverse();

        let history_included = included.len();
        let mut messages =
            Vec::with_capacity(2 + request.few_shots.len() * 2 + history_included);
        messages.push(Message::system(request.system_prompt));
        for shot in request.few_shots {
            messages.extend(shot.messages());
        }
        messages.extend(included);
        messages.push(user_message);

        ConversationWindow {
            messages,
            tokens_used: used,
            history_included,
            history_dropped: prior.len() - history_included,
        }
    }
}

impl Default for WindowBuilder {
    fn default() -> Self {
        Self::new(Arc::new(super::token::HeuristicTokenCounter))
    }
}
