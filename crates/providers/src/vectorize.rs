//! Image-space text embeddings from a computer-vision endpoint.
//!
//! Page images are indexed with multimodal embeddings, so a text query has
//! to be embedded by the same model before it can be compared against the
//! `imageEmbedding` field.

use crate::openai_compat::check_status;
use ragchat_core::error::ProviderError;
use serde::Deserialize;
use tracing::debug;

const API_VERSION: &str = "2023-02-01-preview";
const MODEL_VERSION: &str = "latest";

/// Client for `computervision/retrieval:vectorizeText`.
pub struct VisionVectorizer {
    endpoint: String,
    key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct VectorizeResponse {
    vector: Vec<f32>,
}

impl VisionVectorizer {
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            key: key.into(),
            client,
        })
    }

    /// Build from `[vision]` settings. `None` when no endpoint is set.
    pub fn from_config(
        config: &ragchat_config::VisionConfig,
    ) -> Option<Result<Self, ProviderError>> {
        let endpoint = config.vectorize_endpoint.as_ref()?;
        let Some(key) = &config.vectorize_key else {
            return Some(Err(ProviderError::NotConfigured(
                "vision.vectorize_endpoint is set but no key (vision.vectorize_key or RAGCHAT_VISION_KEY)"
                    .into(),
            )));
        };
        Some(Self::new(endpoint.clone(), key.clone()))
    }

    fn url(&self) -> String {
        format!(
            "{}/computervision/retrieval:vectorizeText?api-version={API_VERSION}&modelVersion={MODEL_VERSION}",
            self.endpoint
        )
    }

    /// Embed `text` into the image space.
    pub async fn vectorize_text(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        debug!(endpoint = %self.endpoint, "Computing image-space query embedding");

        let response = self
            .client
            .post(self.url())
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let parsed: VectorizeResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse vectorize response: {e}"),
            })?;
        Ok(parsed.vector)
    }
}
