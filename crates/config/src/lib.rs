//! Configuration loading, validation, and request overrides for ragchat.
//!
//! Loads configuration from `~/.ragchat/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! Prompt templates and few-shot examples live here as configuration values
//! and are handed to the chat approaches at construction time.

use ragchat_core::{FewShotExample, VectorField};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.ragchat/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Which chat approach answers requests
    #[serde(default)]
    pub approach: ApproachKind,

    /// Text chat settings
    #[serde(default)]
    pub chat: ChatConfig,

    /// Multimodal chat settings
    #[serde(default)]
    pub vision: VisionConfig,

    /// Single-turn ask settings
    #[serde(default)]
    pub ask: AskConfig,

    /// Prompt templates and few-shot examples
    #[serde(default)]
    pub prompts: PromptConfig,

    /// Document index settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("approach", &self.approach)
            .field("chat", &self.chat)
            .field("vision", &self.vision)
            .field("ask", &self.ask)
            .field("prompts", &self.prompts)
            .field("search", &self.search)
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// The approach variant used by `ragchat ask` and the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApproachKind {
    /// Text retrieval with a query-generation tool call
    #[default]
    Text,
    /// Multimodal retrieval with page images
    Vision,
    /// Single-turn retrieval with the raw question as the query
    Ask,
}

impl std::str::FromStr for ApproachKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "vision" => Ok(Self::Vision),
            "ask" => Ok(Self::Ask),
            other => Err(ConfigError::ValidationError(format!(
                "unknown approach '{other}' (expected 'text', 'vision' or 'ask')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Model name used for token limits
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Deployment name sent to the endpoint instead of the model name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Tokens reserved for the answer
    #[serde(default = "default_response_token_limit")]
    pub response_token_limit: u32,

    /// Tokens allowed for the generated search query
    #[serde(default = "default_query_response_token_limit")]
    pub query_response_token_limit: u32,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Documents retrieved when the request does not say
    #[serde(default = "default_top")]
    pub default_top: usize,
}

fn default_chat_model() -> String {
    "gpt-35-turbo".into()
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".into()
}
fn default_response_token_limit() -> u32 {
    1024
}
fn default_query_response_token_limit() -> u32 {
    100
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top() -> usize {
    3
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            deployment: None,
            embedding_model: default_embedding_model(),
            response_token_limit: default_response_token_limit(),
            query_response_token_limit: default_query_response_token_limit(),
            default_temperature: default_temperature(),
            default_top: default_top(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default = "default_vision_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,

    /// Computer-vision endpoint that embeds query text into the image
    /// space (`imageEmbedding` vector field)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectorize_endpoint: Option<String>,

    /// Key for `vectorize_endpoint` (env: `RAGCHAT_VISION_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectorize_key: Option<String>,
}

impl std::fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionConfig")
            .field("model", &self.model)
            .field("deployment", &self.deployment)
            .field("vectorize_endpoint", &self.vectorize_endpoint)
            .field("vectorize_key", &redact(&self.vectorize_key))
            .finish()
    }
}

fn default_vision_model() -> String {
    "gpt-4v".into()
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model: default_vision_model(),
            deployment: None,
            vectorize_endpoint: None,
            vectorize_key: None,
        }
    }
}

/// Settings of the single-turn ask approach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskConfig {
    #[serde(default = "default_ask_temperature")]
    pub default_temperature: f32,

    #[serde(default = "default_response_token_limit")]
    pub response_token_limit: u32,
}

fn default_ask_temperature() -> f32 {
    0.3
}

impl Default for AskConfig {
    fn default() -> Self {
        Self {
            default_temperature: default_ask_temperature(),
            response_token_limit: default_response_token_limit(),
        }
    }
}

/// Prompt text. Templates use `{follow_up_questions_prompt}` and
/// `{injected_prompt}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default = "default_chat_system_template")]
    pub chat_system_template: String,

    #[serde(default = "default_vision_system_template")]
    pub vision_system_template: String,

    /// System prompt of the query-generation call
    #[serde(default = "default_query_template")]
    pub query_template: String,

    /// Inserted into the system prompt when follow-ups are requested
    #[serde(default = "default_followup_instructions")]
    pub followup_instructions: String,

    #[serde(default = "default_query_few_shots")]
    pub query_few_shots: Vec<FewShotExample>,

    /// System prompt of the ask approach (no placeholders)
    #[serde(default = "default_ask_system_template")]
    pub ask_system_template: String,

    /// Question/answer exchange shown before an ask question
    #[serde(default = "default_ask_few_shot")]
    pub ask_few_shot: FewShotExample,
}

fn default_ask_system_template() -> String {
    "You are an intelligent assistant helping users with questions about the documents in the knowledge base. \
Use 'you' to refer to the individual asking the questions even if they ask with 'I'. \
Answer the following question using only the data provided in the sources below. \
For tabular information return it as an html table. Do not return markdown format. \
Each source has a name followed by colon and the actual information, always include the source name for each fact you use in the response. \
If you cannot answer using the sources below, say you don't know."
        .into()
}

fn default_ask_few_shot() -> FewShotExample {
    FewShotExample::new(
        "'What is the deductible for the employee plan for a visit to Overlake in Bellevue?'

Sources:
info1.txt: deductibles depend on whether you are in-network or out-of-network. In-network deductibles are $500 for employee and $1000 for family. Out-of-network deductibles are $1000 for employee and $2000 for family.
info2.pdf: Overlake is in-network for the employee plan.
info3.pdf: Overlake is the name of the area that includes a park and ride near Bellevue.",
        "In-network deductibles are $500 for employee and $1000 for family [info1.txt] and Overlake is in-network for the employee plan [info2.pdf].",
    )
}

fn default_chat_system_template() -> String {
    "Assistant helps users answer questions about the documents in the knowledge base. \
Be brief in your answers.
Answer ONLY with the facts listed in the list of sources below. If there isn't enough information below, say you don't know. \
Do not generate answers that don't use the sources below.
Each source has a name followed by colon and the actual information, always include the source name for each fact you use in the response. \
Use square brackets to reference the source, for example [info1.txt]. Don't combine sources, list each source separately, for example [info1.txt][info2.pdf].
{follow_up_questions_prompt}
{injected_prompt}"
        .into()
}

fn default_vision_system_template() -> String {
    "You are an intelligent assistant helping users analyze documents that contain text, charts and page images.
Each image source has the file name in the top left corner of the image with coordinates (10,10) pixels and is in the format SourceFileName:<file_name>.
Each text source starts in a new line and has the file name followed by colon and the actual information.
Always include the source name from the image or text for each fact you use in the response in the format: [filename].
Answer the following question using only the data provided in the sources below.
If you cannot answer using the sources below, say you don't know.
{follow_up_questions_prompt}
{injected_prompt}"
        .into()
}

fn default_query_template() -> String {
    "Below is a history of the conversation so far, and a new question asked by the user that needs to be answered by searching in a knowledge base.
You have access to a search index with many documents.
Generate a search query based on the conversation and the new question.
Do not include cited source filenames and document names (e.g. info.txt or doc.pdf) in the search query terms.
Do not include any text inside [] or <<>> in the search query terms.
Do not include any special characters like '+'.
If you cannot generate a search query, return just the number 0."
        .into()
}

fn default_followup_instructions() -> String {
    "Generate 3 very brief follow-up questions that the user would likely ask next.
Enclose the follow-up questions in double angle brackets. Example:
<<Are there exclusions for prescriptions?>>
<<Which pharmacies can be ordered from?>>
<<What is the limit for over-the-counter medication?>>
Do not repeat questions that have already been asked.
Make sure the last question ends with \">>\"."
        .into()
}

fn default_query_few_shots() -> Vec<FewShotExample> {
    vec![
        FewShotExample::new(
            "How did crypto do last year?",
            "Summarize Cryptocurrency Market Dynamics from last year",
        ),
        FewShotExample::new("What are my health plans?", "Show available health plans"),
    ]
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            chat_system_template: default_chat_system_template(),
            vision_system_template: default_vision_system_template(),
            query_template: default_query_template(),
            followup_instructions: default_followup_instructions(),
            query_few_shots: default_query_few_shots(),
            ask_system_template: default_ask_system_template(),
            ask_few_shot: default_ask_few_shot(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    /// JSON file holding the indexed documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_path: Option<PathBuf>,

    /// Directory holding page images referenced by `sourcepage`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    50505
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ragchat/config.toml).
    ///
    /// Environment overrides:
    /// - `RAGCHAT_API_KEY`, then `OPENAI_API_KEY` (when the file sets no key)
    /// - `RAGCHAT_MODEL`
    /// - `RAGCHAT_APPROACH`
    /// - `RAGCHAT_VISION_KEY` (when the file sets no `vision.vectorize_key`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("RAGCHAT_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if config.vision.vectorize_key.is_none() {
            config.vision.vectorize_key = std::env::var("RAGCHAT_VISION_KEY").ok();
        }

        if let Ok(model) = std::env::var("RAGCHAT_MODEL") {
            config.chat.model = model;
        }

        if let Ok(approach) = std::env::var("RAGCHAT_APPROACH") {
            config.approach = approach.parse()?;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ragchat")
    }

    /// Check value ranges. `load_from` runs this on every parsed file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.chat.default_temperature) {
            return Err(ConfigError::ValidationError(
                "chat.default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.ask.default_temperature) {
            return Err(ConfigError::ValidationError(
                "ask.default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.chat.response_token_limit == 0
            || self.chat.query_response_token_limit == 0
            || self.ask.response_token_limit == 0
        {
            return Err(ConfigError::ValidationError(
                "token limits must be greater than 0".into(),
            ));
        }

        if self.chat.default_top == 0 {
            return Err(ConfigError::ValidationError(
                "chat.default_top must be at least 1".into(),
            ));
        }

        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            approach: ApproachKind::default(),
            chat: ChatConfig::default(),
            vision: VisionConfig::default(),
            ask: AskConfig::default(),
            prompts: PromptConfig::default(),
            search: SearchConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

// --- Per-request overrides ---

/// Which retrieval strategies a request uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    Text,
    Vectors,
    Hybrid,
}

/// Which retrieved material a multimodal request sends to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Gpt4vInput {
    TextAndImages,
    Texts,
    Images,
}

/// Request-level overrides, as sent in `context.overrides`.
///
/// Every key is optional. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_mode: Option<RetrievalMode>,
    pub suggest_followup_questions: bool,
    pub semantic_captions: bool,
    pub semantic_ranker: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_fields: Option<Vec<VectorField>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpt4v_input: Option<Gpt4vInput>,
    pub use_oid_security_filter: bool,
    pub use_groups_security_filter: bool,
}

impl ChatOverrides {
    /// Keyword search is used (text, hybrid, or unspecified mode).
    pub fn has_text(&self) -> bool {
        !matches!(self.retrieval_mode, Some(RetrievalMode::Vectors))
    }

    /// Vector search is used (vectors, hybrid, or unspecified mode).
    pub fn has_vector(&self) -> bool {
        !matches!(self.retrieval_mode, Some(RetrievalMode::Text))
    }

    pub fn use_semantic_captions(&self) -> bool {
        self.semantic_captions && self.has_text()
    }

    pub fn use_semantic_ranker(&self) -> bool {
        self.semantic_ranker && self.has_text()
    }

    /// Vector fields to query, `[embedding]` when unspecified.
    pub fn vector_fields(&self) -> Vec<VectorField> {
        self.vector_fields
            .clone()
            .unwrap_or_else(|| vec![VectorField::Embedding])
    }

    pub fn include_gpt4v_text(&self) -> bool {
        !matches!(self.gpt4v_input, Some(Gpt4vInput::Images))
    }

    pub fn include_gpt4v_images(&self) -> bool {
        !matches!(self.gpt4v_input, Some(Gpt4vInput::Texts))
    }

    /// A non-empty `exclude_category` value.
    pub fn excluded_category(&self) -> Option<&str> {
        self.exclude_category.as_deref().filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chat.model, "gpt-35-turbo");
        assert_eq!(config.chat.response_token_limit, 1024);
        assert_eq!(config.gateway.port, 50505);
        assert_eq!(config.approach, ApproachKind::Text);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.chat.model, config.chat.model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.prompts.query_few_shots, config.prompts.query_few_shots);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.chat.default_temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.vision.model, "gpt-4v");
    }

    #[test]
    fn load_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
approach = "vision"

[chat]
model = "gpt-4"
deployment = "chat-prod"

[[prompts.query_few_shots]]
user = "q"
assistant = "a"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.approach, ApproachKind::Vision);
        assert_eq!(config.chat.deployment.as_deref(), Some("chat-prod"));
        assert_eq!(config.chat.default_top, 3);
        assert_eq!(config.prompts.query_few_shots.len(), 1);
        assert!(config.prompts.chat_system_template.contains("{follow_up_questions_prompt}"));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "approach = [").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn debug_redacts_vectorize_key() {
        let mut config = AppConfig::default();
        config.vision.vectorize_key = Some("cv-secret".into());
        assert!(!format!("{config:?}").contains("cv-secret"));
    }

    #[test]
    fn approach_from_str() {
        assert_eq!("Vision".parse::<ApproachKind>().unwrap(), ApproachKind::Vision);
        assert_eq!(" ask ".parse::<ApproachKind>().unwrap(), ApproachKind::Ask);
        assert!("audio".parse::<ApproachKind>().is_err());
    }

    #[test]
    fn ask_defaults_and_overrides() {
        let config = AppConfig::default();
        assert_eq!(config.ask.default_temperature, 0.3);
        assert_eq!(config.ask.response_token_limit, 1024);
        assert!(config.prompts.ask_few_shot.user.contains("Sources:"));

        let config: AppConfig = toml::from_str(
            r#"
approach = "ask"

[ask]
default_temperature = 0.0

[vision]
vectorize_endpoint = "https://cv.example.com"
"#,
        )
        .unwrap();
        assert_eq!(config.approach, ApproachKind::Ask);
        assert_eq!(config.ask.default_temperature, 0.0);
        assert_eq!(config.ask.response_token_limit, 1024);
        assert_eq!(
            config.vision.vectorize_endpoint.as_deref(),
            Some("https://cv.example.com")
        );
    }

    #[test]
    fn invalid_ask_temperature_rejected() {
        let mut config = AppConfig::default();
        config.ask.default_temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_overrides_use_every_strategy() {
        let overrides: ChatOverrides = serde_json::from_str("{}").unwrap();
        assert!(overrides.has_text());
        assert!(overrides.has_vector());
        assert!(overrides.include_gpt4v_text());
        assert!(overrides.include_gpt4v_images());
        assert_eq!(overrides.vector_fields(), vec![VectorField::Embedding]);
        assert!(!overrides.suggest_followup_questions);
    }

    #[test]
    fn overrides_parse_wire_names() {
        let overrides: ChatOverrides = serde_json::from_str(
            r#"{
                "retrieval_mode": "vectors",
                "semantic_captions": true,
                "semantic_ranker": true,
                "vector_fields": ["embedding", "imageEmbedding"],
                "gpt4v_input": "images",
                "top": 5,
                "unrelated_key": 1
            }"#,
        )
        .unwrap();
        assert!(!overrides.has_text());
        assert!(!overrides.use_semantic_captions());
        assert!(!overrides.use_semantic_ranker());
        assert!(!overrides.include_gpt4v_text());
        assert_eq!(overrides.top, Some(5));
        assert_eq!(overrides.vector_fields().len(), 2);
    }

    #[test]
    fn unknown_retrieval_mode_rejected() {
        let result: Result<ChatOverrides, _> =
            serde_json::from_str(r#"{"retrieval_mode": "sideways"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn empty_exclude_category_is_ignored() {
        let overrides = ChatOverrides {
            exclude_category: Some(String::new()),
            ..ChatOverrides::default()
        };
        assert_eq!(overrides.excluded_category(), None);
    }
}
