//! The `run` entry point shared by every transport.

use crate::approach::{ChatApproach, ModelCall, RequestContext};
use crate::chunk::{ChatResponse, ExtraInfo};
use crate::error::ChatError;
use crate::finalize::build_response;
use crate::stream::{ChunkStream, chunk_stream};
use ragchat_core::message::{HistoryTurn, Message};
use ragchat_core::provider::{ProviderResponse, StreamChunk, StreamReceiver};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of [`ChatService::run`].
pub enum ChatOutput {
    Response(ChatResponse),
    Stream(ChunkStream),
}

impl std::fmt::Debug for ChatOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Response(response) => f.debug_tuple("Response").field(response).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Answers chat requests with one configured approach.
#[derive(Clone)]
pub struct ChatService {
    approach: Arc<dyn ChatApproach>,
}

impl ChatService {
    pub fn new(approach: Arc<dyn ChatApproach>) -> Self {
        Self { approach }
    }

    pub fn approach_name(&self) -> &str {
        self.approach.name()
    }

    /// Answer the last turn of `history`.
    ///
    /// `session_state` is passed through untouched.
    pub async fn run(
        &self,
        history: &[HistoryTurn],
        stream: bool,
        session_state: serde_json::Value,
        context: &RequestContext,
    ) -> Result<ChatOutput, ChatError> {
        if stream {
            self.run_with_streaming(history, session_state, context)
                .await
                .map(ChatOutput::Stream)
        } else {
            self.run_without_streaming(history, session_state, context)
                .await
                .map(ChatOutput::Response)
        }
    }

    pub async fn run_without_streaming(
        &self,
        history: &[HistoryTurn],
        session_state: serde_json::Value,
        context: &RequestContext,
    ) -> Result<ChatResponse, ChatError> {
        let (extra, call) = self.prepare(history, context, false).await?;
        let completion = match call {
            ModelCall::Immediate(completion) => completion,
            ModelCall::Stream(rx) => collect_stream(rx).await?,
        };
        let followups = context.overrides.suggest_followup_questions;
        Ok(build_response(completion, extra, followups, session_state))
    }

    /// Everything up to the answer call runs before this returns; the
    /// returned stream only carries the answer.
    pub async fn run_with_streaming(
        &self,
        history: &[HistoryTurn],
        session_state: serde_json::Value,
        context: &RequestContext,
    ) -> Result<ChunkStream, ChatError> {
        let (extra, call) = self.prepare(history, context, true).await?;
        let followups = context.overrides.suggest_followup_questions;
        match call {
            ModelCall::Stream(rx) => Ok(chunk_stream(extra, session_state, rx, followups)),
            ModelCall::Immediate(completion) => Ok(immediate_stream(
                extra,
                session_state,
                completion,
                followups,
            )),
        }
    }

    async fn prepare(
        &self,
        history: &[HistoryTurn],
        context: &RequestContext,
        should_stream: bool,
    ) -> Result<(ExtraInfo, ModelCall), ChatError> {
        if history.is_empty() {
            return Err(ChatError::EmptyHistory);
        }
        info!(
            approach = self.approach.name(),
            turns = history.len(),
            stream = should_stream,
            "Chat request"
        );
        self.approach
            .run_until_final_call(history, context, should_stream)
            .await
    }
}

/// Drain a delta stream into one completion.
async fn collect_stream(
    mut rx: StreamReceiver,
) -> Result<ProviderResponse, ChatError> {
    let mut text = String::new();
    let mut finish_reason = None;
    let mut usage = None;
    while let Some(delta) = rx.recv().await {
        let delta = delta?;
        if let Some(content) = delta.content {
            text.push_str(&content);
        }
        finish_reason = delta.finish_reason.or(finish_reason);
        usage = delta.usage.or(usage);
    }
    debug!(chars = text.len(), "Collected streamed completion");
    Ok(ProviderResponse {
        id: String::new(),
        message: Message::assistant(text),
        tool_calls: vec![],
        finish_reason,
        usage,
        model: String::new(),
    })
}

/// A complete answer replayed through the chunk sequence.
fn immediate_stream(
    extra: ExtraInfo,
    session_state: serde_json::Value,
    completion: ProviderResponse,
    followups: bool,
) -> ChunkStream {
    let (tx, rx) = tokio::sync::mpsc::channel(1);
    let _ = tx.try_send(Ok(StreamChunk {
        content: Some(completion.message.text()),
        finish_reason: completion.finish_reason,
        done: true,
        usage: completion.usage,
    }));
    chunk_stream(extra, session_state, rx, followups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChatChunk;
    use crate::approach::{ApproachPrompts, ChatReadRetrieveRead, Collaborators, ModelSettings};
    use crate::finalize::finalize;
    use crate::test_helpers::{
        Script, ScriptedProvider, StubRetriever, doc, search_call_response, stream_of,
        text_response,
    };
    use futures::StreamExt;
    use ragchat_config::{AppConfig, ChatOverrides};
    use ragchat_core::error::ProviderError;

    fn service(scripts: Vec<Script>) -> ChatService {
        let config = AppConfig::default();
        let collaborators = Collaborators::new(
            Arc::new(ScriptedProvider::new(scripts)),
            Arc::new(StubRetriever::new(vec![doc("faq.md", "Answers.")])),
        );
        ChatService::new(Arc::new(ChatReadRetrieveRead::new(
            collaborators,
            ModelSettings::text(&config).unwrap(),
            ApproachPrompts::text(&config.prompts),
        )))
    }

    fn followups_on() -> RequestContext {
        RequestContext {
            overrides: ChatOverrides {
                suggest_followup_questions: true,
                ..ChatOverrides::default()
            },
            ..RequestContext::default()
        }
    }

    fn question() -> Vec<HistoryTurn> {
        vec![HistoryTurn::user("What is the FAQ?")]
    }

    const ANSWER: &str = "The FAQ answers questions [faq.md].<<Where is it?>><<Who wrote it?>>";

    #[tokio::test]
    async fn non_streaming_response_with_followups() {
        let svc = service(vec![
            Script::Complete(search_call_response("faq")),
            Script::Complete(text_response(ANSWER)),
        ]);
        let output = svc
            .run(&question(), false, serde_json::json!("state-1"), &followups_on())
            .await
            .unwrap();
        let ChatOutput::Response(response) = output else {
            panic!("expected response");
        };
        let choice = &response.choices[0];
        assert_eq!(choice.message.content, "The FAQ answers questions [faq.md].");
        assert_eq!(
            choice.context.followup_questions,
            Some(vec!["Where is it?".to_string(), "Who wrote it?".to_string()])
        );
        assert_eq!(choice.session_state, serde_json::json!("state-1"));
        assert_eq!(
            choice.context.data_points.as_ref().unwrap().text,
            vec!["faq.md: Answers."]
        );
        assert_eq!(response.id, "chatcmpl-test");
    }

    #[tokio::test]
    async fn streaming_and_non_streaming_agree() {
        let deltas = ["The FAQ ", "answers questions [faq.md].<<Where", " is it?>><<Who wrote it?>>"];
        let svc = service(vec![
            Script::Complete(search_call_response("faq")),
            stream_of(&deltas),
        ]);
        let stream = svc
            .run_with_streaming(&question(), serde_json::Value::Null, &followups_on())
            .await
            .unwrap();
        let chunks: Vec<ChatChunk> = stream.map(Result::unwrap).collect().await;

        let visible: String = chunks.iter().filter_map(ChatChunk::content).collect();
        let streamed: Vec<String> = chunks
            .iter()
            .filter_map(ChatChunk::followup_questions)
            .flatten()
            .cloned()
            .collect();

        let expected = finalize(ANSWER, true);
        assert_eq!(visible, expected.visible_text);
        assert_eq!(streamed, expected.followup_questions);

        // opening, 2 content deltas, the finish delta is swallowed while
        // capturing, closing follow-up chunk
        assert_eq!(chunks.len(), 4);
        assert!(!chunks[0].is_model_delta());
        assert!(chunks[1].is_model_delta());
        assert!(chunks[3].followup_questions().is_some());
    }

    #[tokio::test]
    async fn streaming_without_followups_passes_annotation_through() {
        let svc = service(vec![
            Script::Complete(search_call_response("faq")),
            stream_of(&["A", "<<Q>>"]),
        ]);
        let stream = svc
            .run_with_streaming(&question(), serde_json::Value::Null, &RequestContext::default())
            .await
            .unwrap();
        let chunks: Vec<ChatChunk> = stream.map(Result::unwrap).collect().await;
        let visible: String = chunks.iter().filter_map(ChatChunk::content).collect();
        assert_eq!(visible, "A<<Q>>");
        assert_eq!(chunks.last().unwrap().choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn empty_history_rejected_before_any_call() {
        let svc = service(vec![]);
        let err = svc
            .run(&[], false, serde_json::Value::Null, &RequestContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::EmptyHistory));
    }

    #[tokio::test]
    async fn answer_call_failure_is_request_failure() {
        let svc = service(vec![
            Script::Complete(search_call_response("faq")),
            Script::Fail(ProviderError::RateLimited { retry_after_secs: 3 }),
        ]);
        let err = svc
            .run(&question(), true, serde_json::Value::Null, &RequestContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Upstream(ProviderError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn stream_collected_for_non_streaming_call() {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tx.send(Ok(StreamChunk::text("Hel"))).await.unwrap();
        tx.send(Ok(StreamChunk::text("lo"))).await.unwrap();
        drop(tx);
        let completion = collect_stream(rx).await.unwrap();
        assert_eq!(completion.message.text(), "Hello");
    }

    #[tokio::test]
    async fn immediate_answer_replays_as_chunks() {
        let chunks: Vec<ChatChunk> = immediate_stream(
            ExtraInfo::default(),
            serde_json::Value::Null,
            text_response("Done.<<Next?>>"),
            true,
        )
        .map(Result::unwrap)
        .collect()
        .await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].content(), Some("Done."));
        assert_eq!(chunks[2].followup_questions(), Some(&["Next?".to_string()][..]));
    }
}
