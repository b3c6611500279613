//! Chat approaches: retrieval-augmented answer generation strategies.
//!
//! The chat approaches run the same three steps up to the answer call:
//!
//! 1. **Generate** a search query from the history and the new question
//! 2. **Retrieve** sources with that query
//! 3. **Prepare** the answer call over a budgeted conversation window
//!
//! [`RetrieveThenRead`] answers a single question and skips step 1. All of
//! them hand back the retrieval metadata plus a [`ModelCall`]. Finalizing
//! the answer (streamed or not) is shared and lives in [`crate::service`].

pub mod read_retrieve_read;
pub mod retrieve_then_read;
pub mod vision;

pub use read_retrieve_read::ChatReadRetrieveRead;
pub use retrieve_then_read::RetrieveThenRead;
pub use vision::ChatReadRetrieveReadVision;

use crate::chunk::ExtraInfo;
use crate::context::{WindowBuilder, WindowRequest, token_limit};
use crate::error::ChatError;
use crate::prompt::system_prompt;
use crate::query::resolve_search_query;
use async_trait::async_trait;
use ragchat_config::{AppConfig, ApproachKind, ChatOverrides, PromptConfig};
use ragchat_core::message::{FewShotExample, HistoryTurn, Message};
use ragchat_core::provider::{
    Provider, ProviderRequest, ProviderResponse, StreamReceiver, ToolDefinition,
};
use ragchat_core::retrieval::{
    Document, Embedder, ImageFetcher, Retriever, SearchFilter, SearchRequest, VectorField,
    VectorQuery,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// The prepared answer call.
pub enum ModelCall {
    /// Non-streaming: the complete answer
    Immediate(ProviderResponse),
    /// Streaming: the upstream delta receiver
    Stream(StreamReceiver),
}

impl std::fmt::Debug for ModelCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate(response) => f.debug_tuple("Immediate").field(response).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Identity claims of the caller, as resolved by the transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,
    pub groups: Vec<String>,
}

/// Per-request inputs besides the history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestContext {
    pub overrides: ChatOverrides,
    pub auth_claims: AuthClaims,
}

/// Search filter for a request's overrides and claims.
pub fn build_filter(overrides: &ChatOverrides, claims: &AuthClaims) -> SearchFilter {
    SearchFilter {
        exclude_category: overrides.excluded_category().map(str::to_string),
        oid: overrides
            .use_oid_security_filter
            .then(|| claims.oid.clone().unwrap_or_default()),
        groups: overrides
            .use_groups_security_filter
            .then(|| claims.groups.clone()),
    }
}

/// A retrieval-augmented answer strategy.
#[async_trait]
pub trait ChatApproach: Send + Sync {
    fn name(&self) -> &str;

    /// Run every step up to (and including) issuing the answer call.
    async fn run_until_final_call(
        &self,
        history: &[HistoryTurn],
        context: &RequestContext,
        should_stream: bool,
    ) -> Result<(ExtraInfo, ModelCall), ChatError>;
}

/// Model and limits used by one approach.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    /// Model name, used for the token limit
    pub model: String,
    /// Deployment sent as the request model, when set
    pub deployment: Option<String>,
    pub token_limit: usize,
    pub response_token_limit: u32,
    pub query_response_token_limit: u32,
    pub default_temperature: f32,
    pub default_top: usize,
}

impl ModelSettings {
    /// Settings for the text approach.
    pub fn text(config: &AppConfig) -> Result<Self, ChatError> {
        Self::build(config, &config.chat.model, config.chat.deployment.clone())
    }

    /// Settings for the vision approach: both calls go to the vision model.
    pub fn vision(config: &AppConfig) -> Result<Self, ChatError> {
        Self::build(config, &config.vision.model, config.vision.deployment.clone())
    }

    /// Settings for the single-turn ask approach: the chat model with the
    /// `[ask]` temperature and answer length.
    pub fn ask(config: &AppConfig) -> Result<Self, ChatError> {
        let mut settings = Self::text(config)?;
        settings.default_temperature = config.ask.default_temperature;
        settings.response_token_limit = config.ask.response_token_limit;
        Ok(settings)
    }

    fn build(config: &AppConfig, model: &str, deployment: Option<String>) -> Result<Self, ChatError> {
        Ok(Self {
            model: model.to_string(),
            deployment,
            token_limit: token_limit(model)?,
            response_token_limit: config.chat.response_token_limit,
            query_response_token_limit: config.chat.query_response_token_limit,
            default_temperature: config.chat.default_temperature,
            default_top: config.chat.default_top,
        })
    }

    pub fn request_model(&self) -> &str {
        self.deployment.as_deref().unwrap_or(&self.model)
    }

    /// History budget of the answer call.
    pub fn answer_budget(&self) -> usize {
        self.token_limit
            .saturating_sub(self.response_token_limit as usize)
    }
}

/// Prompt text used by one approach.
#[derive(Debug, Clone, PartialEq)]
pub struct ApproachPrompts {
    pub system_template: String,
    pub query_template: String,
    pub followup_instructions: String,
    pub query_few_shots: Vec<FewShotExample>,
    /// Exchanges placed before the question in the answer call
    pub answer_few_shots: Vec<FewShotExample>,
}

impl ApproachPrompts {
    pub fn text(prompts: &PromptConfig) -> Self {
        Self::with_system(prompts, &prompts.chat_system_template)
    }

    pub fn vision(prompts: &PromptConfig) -> Self {
        Self::with_system(prompts, &prompts.vision_system_template)
    }

    pub fn ask(prompts: &PromptConfig) -> Self {
        Self {
            answer_few_shots: vec![prompts.ask_few_shot.clone()],
            ..Self::with_system(prompts, &prompts.ask_system_template)
        }
    }

    fn with_system(prompts: &PromptConfig, system_template: &str) -> Self {
        Self {
            system_template: system_template.to_string(),
            query_template: prompts.query_template.clone(),
            followup_instructions: prompts.followup_instructions.clone(),
            query_few_shots: prompts.query_few_shots.clone(),
            answer_few_shots: Vec::new(),
        }
    }

    /// System prompt of the answer call.
    pub fn answer_system_prompt(&self, overrides: &ChatOverrides) -> String {
        let followup = if overrides.suggest_followup_questions {
            self.followup_instructions.as_str()
        } else {
            ""
        };
        system_prompt(
            &self.system_template,
            overrides.prompt_template.as_deref(),
            followup,
        )
    }
}

/// External collaborators shared by every approach.
#[derive(Clone)]
pub struct Collaborators {
    pub provider: Arc<dyn Provider>,
    pub retriever: Arc<dyn Retriever>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub images: Option<Arc<dyn ImageFetcher>>,
    pub window: WindowBuilder,
}

/// Query generation output.
pub(crate) struct GeneratedQuery {
    pub messages: Vec<Message>,
    pub query: String,
}

impl Collaborators {
    pub fn new(provider: Arc<dyn Provider>, retriever: Arc<dyn Retriever>) -> Self {
        Self {
            provider,
            retriever,
            embedder: None,
            images: None,
            window: WindowBuilder::default(),
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_images(mut self, images: Arc<dyn ImageFetcher>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn with_window(mut self, window: WindowBuilder) -> Self {
        self.window = window;
        self
    }

    /// Step 1: ask the model for a search query.
    pub(crate) async fn generate_search_query(
        &self,
        settings: &ModelSettings,
        prompts: &ApproachPrompts,
        history: &[HistoryTurn],
        original_query: &str,
        tools: Vec<ToolDefinition>,
    ) -> Result<GeneratedQuery, ChatError> {
        let request_text = format!("Generate search query for: {original_query}");
        let max_tokens = settings
            .token_limit
            .saturating_sub(request_text.chars().count());

        let messages = self
            .window
            .build(WindowRequest {
                system_prompt: &prompts.query_template,
                model: &settings.model,
                history,
                user_content: request_text.into(),
                max_tokens,
                few_shots: &prompts.query_few_shots,
            })
            .into_messages();

        let completion = self
            .provider
            .complete(ProviderRequest {
                model: settings.request_model().to_string(),
                messages: messages.clone(),
                temperature: 0.0,
                max_tokens: Some(settings.query_response_token_limit),
                tools,
                stream: false,
            })
            .await?;

        let query = resolve_search_query(&completion, original_query);
        debug!(query = %query, "Resolved search query");
        Ok(GeneratedQuery { messages, query })
    }

    /// Query embeddings for the requested fields. Empty without an embedder.
    pub(crate) async fn embed_query(
        &self,
        fields: &[VectorField],
        query: &str,
    ) -> Result<Vec<VectorQuery>, ChatError> {
        let Some(embedder) = &self.embedder else {
            debug!("No embedder configured, skipping vector retrieval");
            return Ok(Vec::new());
        };
        let mut vectors = Vec::with_capacity(fields.len());
        for &field in fields {
            let vector = match field {
                VectorField::Embedding => embedder.embed_text(query).await?,
                VectorField::ImageEmbedding => embedder.embed_image_query(query).await?,
            };
            vectors.push(VectorQuery { field, vector });
        }
        Ok(vectors)
    }

    /// Step 2: retrieve sources.
    pub(crate) async fn search(
        &self,
        approach: &str,
        request: SearchRequest,
    ) -> Result<Vec<Document>, ChatError> {
        let results = self.retriever.search(request).await?;
        info!(
            approach,
            retriever = self.retriever.name(),
            results = results.len(),
            "Retrieved sources"
        );
        Ok(results)
    }

    /// Step 3: issue the answer call.
    pub(crate) async fn call_model(&self, request: ProviderRequest) -> Result<ModelCall, ChatError> {
        if request.stream {
            Ok(ModelCall::Stream(self.provider.stream(request).await?))
        } else {
            Ok(ModelCall::Immediate(self.provider.complete(request).await?))
        }
    }
}

/// The approach selected by `config.approach`.
pub fn approach_from_config(
    config: &AppConfig,
    collaborators: Collaborators,
) -> Result<Arc<dyn ChatApproach>, ChatError> {
    let approach: Arc<dyn ChatApproach> = match config.approach {
        ApproachKind::Text => Arc::new(ChatReadRetrieveRead::new(
            collaborators,
            ModelSettings::text(config)?,
            ApproachPrompts::text(&config.prompts),
        )),
        ApproachKind::Vision => Arc::new(ChatReadRetrieveReadVision::new(
            collaborators,
            ModelSettings::vision(config)?,
            ApproachPrompts::vision(&config.prompts),
        )),
        ApproachKind::Ask => Arc::new(RetrieveThenRead::new(
            collaborators,
            ModelSettings::ask(config)?,
            ApproachPrompts::ask(&config.prompts),
        )),
    };
    info!(approach = approach.name(), "Chat approach ready");
    Ok(approach)
}

/// The question being asked: the last history turn.
pub(crate) fn original_query(history: &[HistoryTurn]) -> Result<&str, ChatError> {
    history
        .last()
        .map(|turn| turn.content.as_str())
        .ok_or(ChatError::EmptyHistory)
}
