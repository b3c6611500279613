//! Query embeddings backed by a model endpoint.

use crate::vectorize::VisionVectorizer;
use async_trait::async_trait;
use ragchat_core::error::RetrievalError;
use ragchat_core::provider::EmbeddingRequest;
use ragchat_core::{Embedder, Provider};
use std::sync::Arc;
use tracing::debug;

/// Computes text embeddings through [`Provider::embed`].
///
/// Image-space query embeddings go to a [`VisionVectorizer`] and are
/// reported as unsupported when none is attached.
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
    vectorizer: Option<Arc<VisionVectorizer>>,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            vectorizer: None,
        }
    }

    pub fn with_vectorizer(mut self, vectorizer: Arc<VisionVectorizer>) -> Self {
        self.vectorizer = Some(vectorizer);
        self
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        debug!(model = %self.model, "Computing query embedding");
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: vec![text.to_string()],
            })
            .await
            .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::EmbeddingFailed("empty embedding response".into()))
    }

    async fn embed_image_query(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let Some(vectorizer) = &self.vectorizer else {
            return Err(RetrievalError::Unsupported(
                "imageEmbedding queries need vision.vectorize_endpoint".into(),
            ));
        };
        vectorizer
            .vectorize_text(text)
            .await
            .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))
    }
}
