//! Multimodal approach: sources are sent as text and page images.

use super::{
    ApproachPrompts, ChatApproach, Collaborators, ModelCall, ModelSettings, RequestContext,
    build_filter, original_query,
};
use crate::chunk::{DataPoints, ExtraInfo, ThoughtStep};
use crate::context::WindowRequest;
use crate::error::ChatError;
use async_trait::async_trait;
use futures::future::try_join_all;
use ragchat_core::message::{ContentPart, HistoryTurn};
use ragchat_core::provider::ProviderRequest;
use ragchat_core::retrieval::{Document, SearchRequest, sources_content};
use serde_json::json;
use tracing::debug;

pub struct ChatReadRetrieveReadVision {
    collaborators: Collaborators,
    settings: ModelSettings,
    prompts: ApproachPrompts,
}

impl ChatReadRetrieveReadVision {
    pub fn new(collaborators: Collaborators, settings: ModelSettings, prompts: ApproachPrompts) -> Self {
        Self {
            collaborators,
            settings,
            prompts,
        }
    }

    /// Page images of the results, fetched concurrently, in result order.
    async fn fetch_images(&self, results: &[Document]) -> Result<Vec<String>, ChatError> {
        let Some(images) = &self.collaborators.images else {
            debug!("No image fetcher configured, sending text sources only");
            return Ok(Vec::new());
        };
        let urls = try_join_all(results.iter().map(|doc| images.fetch(doc))).await?;
        Ok(urls.into_iter().flatten().collect())
    }
}

#[async_trait]
impl ChatApproach for ChatReadRetrieveReadVision {
    fn name(&self) -> &str {
        "chat-read-retrieve-read-vision"
    }

    async fn run_until_final_call(
        &self,
        history: &[HistoryTurn],
        context: &RequestContext,
        should_stream: bool,
    ) -> Result<(ExtraInfo, ModelCall), ChatError> {
        let overrides = &context.overrides;
        let has_text = overrides.has_text();
        let has_vector = overrides.has_vector();
        let vector_fields = overrides.vector_fields();
        let use_semantic_captions = overrides.use_semantic_captions();
        let use_semantic_ranker = overrides.use_semantic_ranker();
        let top = overrides.top.unwrap_or(self.settings.default_top);
        let filter = build_filter(overrides, &context.auth_claims);
        let original_query = original_query(history)?;

        // ── Step 1: Generate a search query ──
        let generated = self
            .collaborators
            .generate_search_query(&self.settings, &self.prompts, history, original_query, vec![])
            .await?;

        // ── Step 2: Retrieve sources ──
        let vectors = if has_vector {
            self.collaborators
                .embed_query(&vector_fields, &generated.query)
                .await?
        } else {
            Vec::new()
        };
        let query_text = has_text.then(|| generated.query.clone());

        let results = self
            .collaborators
            .search(
                self.name(),
                SearchRequest {
                    top,
                    query_text: query_text.clone(),
                    filter,
                    vectors,
                    use_semantic_ranker,
                    use_semantic_captions,
                },
            )
            .await?;
        let sources = sources_content(&results, use_semantic_captions, true);

        // ── Step 3: Prepare the answer call ──
        let system_prompt = self.prompts.answer_system_prompt(overrides);

        let mut user_content = vec![ContentPart::text(original_query)];
        if overrides.include_gpt4v_text() {
            user_content.push(ContentPart::text(format!(
                "\n\nSources:\n{}",
                sources.join("\n")
            )));
        }
        let image_urls = if overrides.include_gpt4v_images() {
            self.fetch_images(&results).await?
        } else {
            Vec::new()
        };
        user_content.extend(image_urls.iter().map(ContentPart::image));

        let messages = self
            .collaborators
            .window
            .build(WindowRequest {
                system_prompt: &system_prompt,
                model: &self.settings.model,
                history,
                user_content: user_content.into(),
                max_tokens: self.settings.answer_budget(),
                few_shots: &self.prompts.answer_few_shots,
            })
            .into_messages();

        let extra = ExtraInfo {
            data_points: DataPoints {
                text: sources,
                images: Some(image_urls),
            },
            thoughts: vec![
                ThoughtStep::new("Original user query", original_query),
                ThoughtStep::new("Generated search query", &query_text).with_props(json!({
                    "use_semantic_captions": use_semantic_captions,
                    "vector_fields": vector_fields,
                })),
                ThoughtStep::new("Results", &results),
                ThoughtStep::new(
                    "Prompt",
                    messages.iter().map(ToString::to_string).collect::<Vec<_>>(),
                ),
            ],
        };

        let call = self
            .collaborators
            .call_model(ProviderRequest {
                model: self.settings.request_model().to_string(),
                messages,
                temperature: overrides
                    .temperature
                    .unwrap_or(self.settings.default_temperature),
                max_tokens: Some(self.settings.response_token_limit),
                tools: vec![],
                stream: should_stream,
            })
            .await?;

        Ok((extra, call))
    }
}
