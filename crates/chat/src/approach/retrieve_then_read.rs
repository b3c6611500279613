//! Ask approach: search with the question as asked, then answer from the
//! sources in one call.

use super::{
    ApproachPrompts, ChatApproach, Collaborators, ModelCall, ModelSettings, RequestContext,
    build_filter,
};
use crate::chunk::{DataPoints, ExtraInfo, ThoughtStep};
use crate::context::WindowRequest;
use crate::error::ChatError;
use async_trait::async_trait;
use ragchat_core::message::HistoryTurn;
use ragchat_core::provider::ProviderRequest;
use ragchat_core::retrieval::{SearchRequest, VectorField, sources_content};
use serde_json::json;

/// Retrieve sources for a single question, then read them to answer.
///
/// Only the last history turn is used. The answer is always requested as a
/// complete response; streaming callers get it as one delta.
pub struct RetrieveThenRead {
    collaborators: Collaborators,
    settings: ModelSettings,
    prompts: ApproachPrompts,
}

impl RetrieveThenRead {
    pub fn new(collaborators: Collaborators, settings: ModelSettings, prompts: ApproachPrompts) -> Self {
        Self {
            collaborators,
            settings,
            prompts,
        }
    }
}

#[async_trait]
impl ChatApproach for RetrieveThenRead {
    fn name(&self) -> &str {
        "retrieve-then-read"
    }

    async fn run_until_final_call(
        &self,
        history: &[HistoryTurn],
        context: &RequestContext,
        _should_stream: bool,
    ) -> Result<(ExtraInfo, ModelCall), ChatError> {
        let question = history.last().ok_or(ChatError::EmptyHistory)?;
        let q = question.content.as_str();
        let overrides = &context.overrides;
        let has_text = overrides.has_text();
        let has_vector = overrides.has_vector();
        let use_semantic_captions = overrides.use_semantic_captions();
        let use_semantic_ranker = overrides.use_semantic_ranker();
        let top = overrides.top.unwrap_or(self.settings.default_top);
        let filter = build_filter(overrides, &context.auth_claims);

        // ── Step 1: Retrieve sources for the question ──
        let vectors = if has_vector {
            self.collaborators
                .embed_query(&[VectorField::Embedding], q)
                .await?
        } else {
            Vec::new()
        };
        let query_text = has_text.then(|| q.to_string());

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
        let sources = sources_content(&results, use_semantic_captions, false);

        // ── Step 2: Prepare the answer call ──
        let system_prompt = self.prompts.answer_system_prompt(overrides);
        let user_content = format!("{q}\nSources:\n{}", sources.join("\n"));

        let messages = self
            .collaborators
            .window
            .build(WindowRequest {
                system_prompt: &system_prompt,
                model: &self.settings.model,
                history: std::slice::from_ref(question),
                user_content: user_content.into(),
                max_tokens: self.settings.answer_budget(),
                few_shots: &self.prompts.answer_few_shots,
            })
            .into_messages();

        let extra = ExtraInfo {
            data_points: DataPoints {
                text: sources,
                images: None,
            },
            thoughts: vec![
                ThoughtStep::new("Search Query", &query_text).with_props(json!({
                    "use_semantic_captions": use_semantic_captions,
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
                stream: false,
            })
            .await?;

        Ok((extra, call))
    }
}
