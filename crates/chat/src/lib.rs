//! The ragchat conversation core.
//!
//! A request flows through:
//!
//! 1. **Window**: system prompt, few-shots and the newest history that fits
//!    the token budget ([`context::WindowBuilder`])
//! 2. **Query**: a query-generation call, resolved to a search query
//!    ([`query::resolve_search_query`])
//! 3. **Retrieve**: the approach's retriever and optional image fetches
//! 4. **Answer**: a complete response ([`finalize::build_response`]) or a
//!    chunk stream with follow-up reassembly ([`stream::chunk_stream`])
//!
//! [`ChatService::run`] ties these together behind one call.

pub mod approach;
pub mod chunk;
pub mod context;
pub mod error;
pub mod finalize;
pub mod followup;
pub mod prompt;
pub mod query;
pub mod service;
pub mod stream;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use approach::{
    ApproachPrompts, AuthClaims, ChatApproach, ChatReadRetrieveRead, ChatReadRetrieveReadVision,
    Collaborators, ModelCall, ModelSettings, RequestContext, RetrieveThenRead,
    approach_from_config, build_filter,
};
pub use chunk::{ChatChunk, ChatResponse, DataPoints, ExtraInfo, ResponseContext, ThoughtStep};
pub use context::{
    ConversationWindow, HeuristicTokenCounter, TokenCounter, WindowBuilder, WindowRequest,
};
pub use error::ChatError;
pub use finalize::{Finalized, build_response, finalize};
pub use followup::{ReassemblyState, StreamReassembler, extract_followup_questions};
pub use query::resolve_search_query;
pub use service::{ChatOutput, ChatService};
pub use stream::{ChunkStream, chunk_stream};
