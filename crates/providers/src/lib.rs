//! Model endpoint implementations for ragchat.
//!
//! All providers implement the `ragchat_core::Provider` trait.

pub mod embedder;
pub mod openai_compat;
pub mod vectorize;

#[cfg(test)]
pub(crate) mod test_server;

pub use embedder::ProviderEmbedder;
pub use openai_compat::OpenAiCompatProvider;
pub use vectorize::VisionVectorizer;
