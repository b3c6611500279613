//! OpenAI-compatible chat-completions client.
//!
//! Works with OpenAI, Azure OpenAI deployments fronted by a compatible
//! proxy, Ollama, vLLM, and any endpoint exposing `/chat/completions`.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Function calling (query-generation tool)
//! - Multimodal user content (text + image parts)
//! - Embeddings

use async_trait::async_trait;
use futures::StreamExt;
use ragchat_core::error::ProviderError;
use ragchat_core::message::{ContentPart, Message, MessageContent, Role};
use ragchat_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An OpenAI-compatible model endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Result<Self, ProviderError> {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Build from application configuration.
    pub fn from_config(config: &ragchat_config::AppConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ProviderError::NotConfigured(
                "no API key (set api_key in config.toml or RAGCHAT_API_KEY)".into(),
            )
        })?;
        Self::new("openai-compat", config.api_url.clone(), api_key)
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                },
                content: Some(match &m.content {
                    MessageContent::Text(text) => ApiContent::Text(text.clone()),
                    MessageContent::Parts(parts) => {
                        ApiContent::Parts(parts.iter().map(ApiContentPart::from).collect())
                    }
                }),
                tool_calls: None,
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "n": 1,
            "stream": stream,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
        event_stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/{path}", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if event_stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        check_status(response).await
    }
}

/// Map non-success statuses to provider errors.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    if status == 401 || status == 403 {
        return Err(ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ));
    }

    if status != 200 {
        let error_body = response.text().await.unwrap_or_default();
        warn!(status, body = %error_body, "Provider returned error");
        return Err(ProviderError::ApiError {
            status_code: status,
            message: error_body,
        });
    }

    Ok(response)
}

#[async_trait]
impl ragchat_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = Self::request_body(&request, false);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self.post("chat/completions", &body, false).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        api_response.into_provider_response()
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<StreamReceiver, ProviderError> {
        let mut body = Self::request_body(&request, true);
        body["stream_options"] = serde_json::json!({ "include_usage": true });

        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self.post("chat/completions", &body, true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Spawn task to read the SSE byte stream and parse chunks
        tokio::spawn(async move {
            pump_sse(response.bytes_stream(), tx, &provider_name).await;
        });

        Ok(rx)
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        let body = serde_json::json!({
            "model": request.model,
            "input": request.inputs,
            "encoding_format": "float",
        });

        debug!(
            provider = %self.name,
            model = %request.model,
            count = request.inputs.len(),
            "Sending embedding request"
        );

        let response = self.post("embeddings", &body, false).await?;

        let api_resp: EmbeddingApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse embedding response: {e}"),
            })?;

        Ok(EmbeddingResponse {
            embeddings: api_resp.data.into_iter().map(|d| d.embedding).collect(),
            model: api_resp.model,
        })
    }
}

fn done_marker(usage: Option<Usage>) -> StreamChunk {
    StreamChunk {
        content: None,
        finish_reason: None,
        done: true,
        usage,
    }
}

type DeltaSender = tokio::sync::mpsc::Sender<Result<StreamChunk, ProviderError>>;

/// Read an SSE body to the end and forward what it carries.
///
/// The receiver always sees either a terminal marker or one `Err` last.
async fn pump_sse<S, B, E>(body: S, tx: DeltaSender, provider: &str)
where
    S: futures::Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut body = std::pin::pin!(body);
    let mut decoder = SseDecoder::default();

    while let Some(read) = body.next().await {
        let bytes = match read {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tx
                    .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                    .await;
                return;
            }
        };
        for event in decoder.feed(bytes.as_ref()) {
            if !forward(&tx, event, provider).await {
                return;
            }
        }
    }

    for event in decoder.finish() {
        if !forward(&tx, event, provider).await {
            return;
        }
    }

    debug!(provider, "Stream ended without [DONE]");
    let _ = tx.send(Ok(done_marker(None))).await;
}

/// Send one decoded event. Returns `false` once nothing more may follow.
async fn forward(tx: &DeltaSender, event: SseEvent, provider: &str) -> bool {
    match event {
        SseEvent::Delta(chunk) => {
            if tx.send(Ok(chunk)).await.is_err() {
                debug!(provider, "Stream receiver dropped");
                return false;
            }
            true
        }
        SseEvent::Finished(usage) => {
            let _ = tx.send(Ok(done_marker(usage))).await;
            false
        }
        SseEvent::Failed(error) => {
            warn!(provider, error = %error, "Upstream failed mid-stream");
            let _ = tx.send(Err(error)).await;
            false
        }
    }
}

/// What one SSE line amounts to for the caller.
#[derive(Debug)]
enum SseEvent {
    Delta(StreamChunk),
    Finished(Option<Usage>),
    Failed(ProviderError),
}

/// Incremental SSE decoder.
///
/// Bytes are held until a full line is available, so a multi-byte
/// character split across network reads is decoded whole.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    /// `event:` field of the event being read
    event: Option<String>,
}

impl SseDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            self.line(&line[..end], &mut events);
        }
        events
    }

    /// Flush a trailing line that had no newline.
    fn finish(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        let mut events = Vec::new();
        if !rest.is_empty() {
            self.line(&rest, &mut events);
        }
        events
    }

    fn line(&mut self, raw: &[u8], events: &mut Vec<SseEvent>) {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim_end_matches('\r'),
            Err(e) => {
                events.push(SseEvent::Failed(ProviderError::StreamInterrupted(format!(
                    "invalid UTF-8 in event stream: {e}"
                ))));
                return;
            }
        };

        match parse_sse_line(line) {
            SseLine::Blank => self.event = None,
            SseLine::Skip => {}
            SseLine::Event(name) => self.event = Some(name.to_string()),
            SseLine::Done => events.push(SseEvent::Finished(None)),
            SseLine::Data(data) => {
                let is_error_event = self.event.as_deref() == Some("error");
                decode_data(data, is_error_event, events);
            }
        }
    }
}

fn decode_data(data: &str, is_error_event: bool, events: &mut Vec<SseEvent>) {
    let parsed = serde_json::from_str::<StreamResponse>(data);

    if let Ok(StreamResponse {
        error: Some(error), ..
    }) = &parsed
    {
        events.push(SseEvent::Failed(error.to_provider_error()));
        return;
    }
    if is_error_event {
        events.push(SseEvent::Failed(ProviderError::StreamInterrupted(
            data.to_string(),
        )));
        return;
    }

    match parsed {
        Ok(response) => {
            if let Some(chunk) = response.content_chunk() {
                events.push(SseEvent::Delta(chunk));
            }
            if let Some(usage) = response.usage {
                events.push(SseEvent::Finished(Some(usage.into())));
            }
        }
        Err(e) => {
            warn!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
        }
    }
}

/// One line of an SSE body, classified.
#[derive(Debug, PartialEq)]
enum SseLine<'a> {
    /// Empty line: ends the current event
    Blank,
    /// Comment or an unused field
    Skip,
    /// `event: <name>`
    Event(&'a str),
    /// `data: [DONE]`
    Done,
    /// `data: {...}`
    Data(&'a str),
}

fn parse_sse_line(line: &str) -> SseLine<'_> {
    if line.is_empty() {
        return SseLine::Blank;
    }
    if line.starts_with(':') {
        return SseLine::Skip;
    }
    if let Some(name) = line.strip_prefix("event:") {
        return SseLine::Event(name.trim());
    }
    match line.strip_prefix("data:") {
        Some(data) => {
            let data = data.trim();
            if data == "[DONE]" {
                SseLine::Done
            } else if data.is_empty() {
                SseLine::Skip
            } else {
                SseLine::Data(data)
            }
        }
        None => SseLine::Skip,
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<ApiContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Parts(Vec<ApiContentPart>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentPart {
    Text { text: String },
    ImageUrl { image_url: ApiImageUrl },
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiImageUrl {
    url: String,
}

impl From<&ContentPart> for ApiContentPart {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text { text } => ApiContentPart::Text { text: text.clone() },
            ContentPart::ImageUrl { image_url } => ApiContentPart::ImageUrl {
                image_url: ApiImageUrl {
                    url: image_url.clone(),
                },
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

impl ApiResponse {
    fn into_provider_response(self) -> Result<ProviderResponse, ProviderError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter(|tc| tc.r#type == "function")
            .map(|tc| MessageToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let text = match choice.message.content {
            Some(ApiContent::Text(text)) => text,
            Some(ApiContent::Parts(parts)) => parts
                .into_iter()
                .filter_map(|p| match p {
                    ApiContentPart::Text { text } => Some(text),
                    ApiContentPart::ImageUrl { .. } => None,
                })
                .collect(),
            None => String::new(),
        };

        Ok(ProviderResponse {
            id: self.id,
            message: Message::assistant(text),
            tool_calls,
            finish_reason: choice.finish_reason,
            usage: self.usage.map(Into::into),
            model: self.model,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

// --- Embedding API types ---

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    /// Set when the endpoint aborts the stream
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

/// `{"error": {...}}` payload sent in place of a delta.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl ApiErrorBody {
    fn to_provider_error(&self) -> ProviderError {
        let mut detail = self.message.clone();
        if let Some(kind) = &self.kind {
            detail = format!("{kind}: {detail}");
        }
        if let Some(code) = &self.code {
            detail = format!("{detail} (code {code})");
        }
        ProviderError::StreamInterrupted(detail)
    }
}

impl StreamResponse {
    /// The delta worth forwarding, if any.
    ///
    /// Some endpoints send a first event with empty `choices`; those and
    /// role-only deltas produce nothing.
    fn content_chunk(&self) -> Option<StreamChunk> {
        let choice = self.choices.first()?;
        let has_content = choice.delta.content.as_ref().is_some_and(|c| !c.is_empty());
        if !has_content && choice.finish_reason.is_none() {
            return None;
        }
        Some(StreamChunk {
            content: choice.delta.content.clone().filter(|c| !c.is_empty()),
            finish_reason: choice.finish_reason.clone(),
            done: false,
            usage: None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}
