//! Text approach: generate a query, retrieve, answer from the sources.

use super::{
    ApproachPrompts, ChatApproach, Collaborators, ModelCall, ModelSettings, RequestContext,
    build_filter, original_query,
};
use crate::chunk::{DataPoints, ExtraInfo, ThoughtStep};
use crate::context::WindowRequest;
use crate::error::ChatError;
use crate::query::search_sources_tool;
use async_trait::async_trait;
use ragchat_core::message::HistoryTurn;
use ragchat_core::provider::ProviderRequest;
use ragchat_core::retrieval::{SearchRequest, VectorField, sources_content};
use serde_json::json;

/// Read the history, retrieve sources, then read them to answer.
pub struct ChatReadRetrieveRead {
    collaborators: Collaborators,
    settings: ModelSettings,
    prompts: ApproachPrompts,
}

impl ChatReadRetrieveRead {
    pub fn new(collaborators: Collaborators, settings: ModelSettings, prompts: ApproachPrompts) -> Self {
        Self {
            collaborators,
            settings,
            prompts,
        }
    }
}

#[async_trait]
impl ChatApproach for ChatReadRetrieveRead {
    fn name(&self) -> &str {
        "chat-read-retrieve-read"
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
        let use_semantic_captions = overrides.use_semantic_captions();
        let use_semantic_ranker = overrides.use_semantic_ranker();
        let top = overrides.top.unwrap_or(self.settings.default_top);
        let filter = build_filter(overrides, &context.auth_claims);
        let original_query = original_query(history)?;

        // ── Step 1: Generate a search query ──
        let generated = self
            .collaborators
            .generate_search_query(
                &self.settings,
                &self.prompts,
                history,
                original_query,
                vec![search_sources_tool()],
            )
            .await?;

        // ── Step 2: Retrieve sources ──
        let vectors = if has_vector {
            self.collaborators
                .embed_query(&[VectorField::Embedding], &generated.query)
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
                    filter: filter.clone(),
                    vectors,
                    use_semantic_ranker,
                    use_semantic_captions,
                },
            )
            .await?;
        let sources = sources_content(&results, use_semantic_captions, false);

        // ── Step 3: Prepare the answer call ──
        let system_prompt = self.prompts.answer_system_prompt(overrides);
        let user_content = format!("{original_query}\n\nSources:\n{}", sources.join("\n"));

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
                text: sources.clone(),
                images: None,
            },
            thoughts: vec![
                ThoughtStep::new(
                    "Prompt to generate search query",
                    generated.messages.iter().map(ToString::to_string).collect::<Vec<_>>(),
                ),
                ThoughtStep::new("Search using generated search query", &query_text).with_props(
                    json!({
                        "use_semantic_captions": use_semantic_captions,
                        "use_semantic_ranker": use_semantic_ranker,
                        "top": top,
                        "filter": filter.to_odata(),
                        "has_vector": has_vector,
                    }),
                ),
                ThoughtStep::new("Search results", &results),
                ThoughtStep::new(
                    "Prompt to generate answer",
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
