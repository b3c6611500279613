//! Context construction: token accounting and conversation windows.

pub mod token;
pub mod window;

pub use token::{HeuristicTokenCounter, TokenCounter, estimate_tokens, token_limit};
pub use window::{ConversationWindow, WindowBuilder, WindowRequest};
