//! # ragchat core
//!
//! Domain types, collaborator traits, and error definitions for the ragchat
//! conversation engine. This crate has **zero framework dependencies**: it
//! defines the vocabulary every other crate builds against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (model endpoint, search index, embedding
//! service, image store) is a trait here. Implementations live in their
//! respective crates, which keeps the chat core testable with scripted stubs.

pub mod error;
pub mod message;
pub mod provider;
pub mod retrieval;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, RetrievalError};
pub use message::{ContentPart, FewShotExample, HistoryTurn, Message, MessageContent, Role};
pub use provider::{
    EmbeddingRequest, EmbeddingResponse, MessageToolCall, Provider, ProviderRequest,
    ProviderResponse, StreamChunk, StreamReceiver, ToolDefinition, Usage,
};
pub use retrieval::{
    Document, Embedder, ImageFetcher, Retriever, SearchFilter, SearchRequest, VectorField,
    VectorQuery, sources_content,
};
