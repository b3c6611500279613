//! Errors surfaced by a chat request.

use ragchat_core::error::{ProviderError, RetrievalError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// The request carried no turns, so there is no question to answer.
    #[error("conversation history is empty")]
    EmptyHistory,

    #[error("model call failed: {0}")]
    Upstream(#[from] ProviderError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("no token limit known for model '{0}'")]
    UnknownModel(String),
}
