//! Client-facing payloads.
//!
//! Non-streaming requests produce a [`ChatResponse`]; streaming requests
//! produce a sequence of [`ChatChunk`]s:
//!
//! - one opening chunk with `delta.role` and the retrieval context
//! - content chunks carrying only `delta.content`
//! - optionally, a closing chunk carrying only `context.followup_questions`

use ragchat_core::message::Role;
use ragchat_core::provider::{StreamChunk, Usage};
use serde::{Deserialize, Serialize};

pub const CHUNK_OBJECT: &str = "chat.completion.chunk";
pub const RESPONSE_OBJECT: &str = "chat.completion";

/// One step of the approach's reasoning, shown to the user for transparency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtStep {
    pub title: String,
    pub description: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<serde_json::Value>,
}

impl ThoughtStep {
    pub fn new(title: impl Into<String>, description: impl Serialize) -> Self {
        Self {
            title: title.into(),
            description: serde_json::to_value(description).unwrap_or_default(),
            props: None,
        }
    }

    pub fn with_props(mut self, props: serde_json::Value) -> Self {
        self.props = Some(props);
        self
    }
}

/// Retrieved material that grounded the answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPoints {
    pub text: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

/// Metadata produced while preparing the answer call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraInfo {
    pub data_points: DataPoints,
    pub thoughts: Vec<ThoughtStep>,
}

/// The `context` object attached to a choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_points: Option<DataPoints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thoughts: Option<Vec<ThoughtStep>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followup_questions: Option<Vec<String>>,
}

impl From<ExtraInfo> for ResponseContext {
    fn from(extra: ExtraInfo) -> Self {
        Self {
            data_points: Some(extra.data_points),
            thoughts: Some(extra.thoughts),
            followup_questions: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub delta: Delta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ResponseContext>,
    /// Present (possibly `null`) on the opening chunk only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_state: Option<serde_json::Value>,
    pub finish_reason: Option<String>,
    pub index: u32,
}

/// One streamed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChunk {
    pub choices: Vec<ChunkChoice>,
    pub object: String,
}

impl ChatChunk {
    fn single(choice: ChunkChoice) -> Self {
        Self {
            choices: vec![choice],
            object: CHUNK_OBJECT.into(),
        }
    }

    /// Opening chunk: role announcement and retrieval context.
    pub fn opening(extra: ExtraInfo, session_state: serde_json::Value) -> Self {
        Self::single(ChunkChoice {
            delta: Delta {
                role: Some(Role::Assistant),
                content: None,
            },
            context: Some(extra.into()),
            session_state: Some(session_state),
            finish_reason: None,
            index: 0,
        })
    }

    /// A model-derived delta.
    pub fn delta(delta: StreamChunk) -> Self {
        Self::single(ChunkChoice {
            delta: Delta {
                role: None,
                content: delta.content,
            },
            context: None,
            session_state: None,
            finish_reason: delta.finish_reason,
            index: 0,
        })
    }

    /// Closing chunk carrying follow-up questions.
    pub fn followups(questions: Vec<String>) -> Self {
        Self::single(ChunkChoice {
            delta: Delta {
                role: Some(Role::Assistant),
                content: None,
            },
            context: Some(ResponseContext {
                followup_questions: Some(questions),
                ..ResponseContext::default()
            }),
            session_state: None,
            finish_reason: None,
            index: 0,
        })
    }

    /// Text content of the first choice, if any.
    pub fn content(&self) -> Option<&str> {
        self.choices.first()?.delta.content.as_deref()
    }

    /// Whether this chunk carries model output rather than metadata.
    pub fn is_model_delta(&self) -> bool {
        self.choices
            .first()
            .is_some_and(|c| c.context.is_none() && c.delta.role.is_none())
    }

    /// Follow-up questions of the first choice, if any.
    pub fn followup_questions(&self) -> Option<&[String]> {
        self.choices
            .first()?
            .context
            .as_ref()?
            .followup_questions
            .as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseChoice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
    pub context: ResponseContext,
    #[serde(default)]
    pub session_state: serde_json::Value,
}

/// Complete (non-streaming) answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    pub choices: Vec<ResponseChoice>,
}

impl ChatResponse {
    pub fn content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}
