//! Shared test helpers: scripted collaborators.

use async_trait::async_trait;
use ragchat_core::error::{ProviderError, RetrievalError};
use ragchat_core::message::Message;
use ragchat_core::provider::{
    MessageToolCall, Provider, ProviderRequest, ProviderResponse, StreamChunk, StreamReceiver,
    Usage,
};
use ragchat_core::retrieval::{Document, Embedder, ImageFetcher, Retriever, SearchRequest};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted model call.
pub enum Script {
    Complete(ProviderResponse),
    Stream(Vec<Result<StreamChunk, ProviderError>>),
    Fail(ProviderError),
}

/// A provider that answers calls from a queue of scripts and records every
/// request it receives.
///
/// Panics if more calls are made than scripts provided.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: ProviderRequest) -> Script {
        self.requests.lock().unwrap().push(request);
        self.scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedProvider: no more scripts")
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.next(request) {
            Script::Complete(response) => Ok(response),
            Script::Fail(e) => Err(e),
            Script::Stream(_) => panic!("ScriptedProvider: stream script used for complete()"),
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<StreamReceiver, ProviderError> {
        let items = match self.next(request) {
            Script::Stream(items) => items,
            Script::Complete(response) => vec![Ok(StreamChunk {
                content: Some(response.message.text()),
                finish_reason: response.finish_reason,
                done: true,
                usage: response.usage,
            })],
            Script::Fail(e) => return Err(e),
        };
        let (tx, rx) = tokio::sync::mpsc::channel(items.len().max(1));
        for item in items {
            tx.send(item).await.unwrap();
        }
        Ok(rx)
    }
}

/// A plain text completion.
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        id: "chatcmpl-test".into(),
        message: Message::assistant(text),
        tool_calls: vec![],
        finish_reason: Some("stop".into()),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "gpt-35-turbo".into(),
    }
}

/// A completion invoking `search_sources` with the given query.
pub fn search_call_response(query: &str) -> ProviderResponse {
    let mut response = text_response("");
    response.finish_reason = Some("tool_calls".into());
    response.tool_calls = vec![MessageToolCall {
        id: "call_search".into(),
        name: crate::query::SEARCH_SOURCES.into(),
        arguments: serde_json::json!({ "search_query": query }).to_string(),
    }];
    response
}

/// Stream script from text deltas, closed by a finish delta and the
/// transport's end marker.
pub fn stream_of(deltas: &[&str]) -> Script {
    let mut items: Vec<Result<StreamChunk, ProviderError>> =
        deltas.iter().map(|d| Ok(StreamChunk::text(*d))).collect();
    items.push(Ok(StreamChunk {
        finish_reason: Some("stop".into()),
        ..StreamChunk::default()
    }));
    items.push(Ok(StreamChunk {
        done: true,
        ..StreamChunk::default()
    }));
    Script::Stream(items)
}

pub fn doc(sourcepage: &str, content: &str) -> Document {
    Document {
        id: sourcepage.into(),
        content: content.into(),
        sourcepage: sourcepage.into(),
        sourcefile: sourcepage.into(),
        ..Document::default()
    }
}

/// A retriever returning fixed documents and recording requests.
pub struct StubRetriever {
    docs: Vec<Document>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl StubRetriever {
    pub fn new(docs: Vec<Document>) -> Self {
        Self {
            docs,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for StubRetriever {
    fn name(&self) -> &str {
        "stub"
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<Document>, RetrievalError> {
        let top = request.top;
        self.requests.lock().unwrap().push(request);
        Ok(self.docs.iter().take(top).cloned().collect())
    }
}

/// Fixed two-dimensional embeddings: text → `[1, 0]`, image space → `[0, 1]`.
pub struct StubEmbedder;

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
        Ok(vec![1.0, 0.0])
    }

    async fn embed_image_query(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
        Ok(vec![0.0, 1.0])
    }
}

/// Serves a fake data URL for every `.png` source page.
pub struct StubImages;

#[async_trait]
impl ImageFetcher for StubImages {
    async fn fetch(&self, doc: &Document) -> Result<Option<String>, RetrievalError> {
        if doc.sourcepage.ends_with(".png") {
            Ok(Some(format!("data:image/png;base64,{}", doc.sourcepage)))
        } else {
            Ok(None)
        }
    }
}
