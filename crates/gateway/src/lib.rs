//! HTTP gateway for ragchat.
//!
//! Exposes the chat service over HTTP:
//!
//! - `POST /chat`: complete answer as JSON
//! - `POST /chat/stream`: answer as Server-Sent Events, one chunk per event
//! - `GET /health`: liveness
//!
//! Built on Axum.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{
        Json,
        sse::{Event as SseEvent, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use ragchat_chat::{
    ChatError, ChatResponse, ChatService, Collaborators, RequestContext, approach_from_config,
};
use ragchat_config::AppConfig;
use ragchat_core::error::{ProviderError, RetrievalError};
use ragchat_core::message::HistoryTurn;
use ragchat_core::provider::Provider;
use ragchat_providers::{OpenAiCompatProvider, ProviderEmbedder, VisionVectorizer};
use ragchat_search::{FsImageFetcher, InMemoryIndex};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub service: ChatService,
}

pub type SharedState = Arc<GatewayState>;

/// Body of `POST /chat` and `POST /chat/stream`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<HistoryTurn>,
    #[serde(default)]
    pub session_state: serde_json::Value,
    #[serde(default)]
    pub context: RequestContext,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Wire the configured collaborators into a chat service.
pub async fn build_service(config: &AppConfig) -> Result<ChatService, Box<dyn std::error::Error>> {
    let provider: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::from_config(config)?);

    let index = match &config.search.index_path {
        Some(path) => InMemoryIndex::load(path).await?,
        None => {
            warn!("No search index configured, answers will have no sources");
            InMemoryIndex::new()
        }
    };

    let mut embedder = ProviderEmbedder::new(provider.clone(), &config.chat.embedding_model);
    if let Some(vectorizer) = VisionVectorizer::from_config(&config.vision).transpose()? {
        embedder = embedder.with_vectorizer(Arc::new(vectorizer));
    }

    let mut collaborators =
        Collaborators::new(provider, Arc::new(index)).with_embedder(Arc::new(embedder));
    if let Some(dir) = &config.search.images_dir {
        collaborators = collaborators.with_images(Arc::new(FsImageFetcher::new(dir)));
    }

    Ok(ChatService::new(approach_from_config(config, collaborators)?))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let service = build_service(&config).await?;
    let app = build_router(Arc::new(GatewayState { service }));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn error_status(e: &ChatError) -> StatusCode {
    match e {
        ChatError::EmptyHistory | ChatError::Retrieval(RetrievalError::Unsupported(_)) => {
            StatusCode::BAD_REQUEST
        }
        ChatError::Upstream(ProviderError::RateLimited { .. }) => StatusCode::TOO_MANY_REQUESTS,
        ChatError::Upstream(_) | ChatError::Retrieval(_) => StatusCode::BAD_GATEWAY,
        ChatError::UnknownModel(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(e: ChatError) -> ApiError {
    let status = error_status(&e);
    if status.is_server_error() {
        error!(error = %e, "Chat request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    approach: String,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        approach: state.service.approach_name().to_string(),
    })
}

/// `POST /chat`: answer the last message.
async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    info!(turns = payload.messages.len(), "chat request");
    let response = state
        .service
        .run_without_streaming(&payload.messages, payload.session_state, &payload.context)
        .await
        .map_err(api_error)?;
    Ok(Json(response))
}

/// `POST /chat/stream`: answer the last message as SSE.
///
/// Each event's data is one chunk as JSON. A failure after the stream has
/// started is sent as a final `error` event.
async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    info!(turns = payload.messages.len(), "chat/stream SSE request");
    let chunks = state
        .service
        .run_with_streaming(&payload.messages, payload.session_state, &payload.context)
        .await
        .map_err(api_error)?;

    let stream = chunks.map(|item| {
        let event = match item {
            Ok(chunk) => SseEvent::default().data(serde_json::to_string(&chunk).unwrap_or_default()),
            Err(e) => {
                error!(error = %e, "Chat stream failed");
                let body = ErrorResponse {
                    error: e.to_string(),
                };
                SseEvent::default()
                    .event("error")
                    .data(serde_json::to_string(&body).unwrap_or_default())
            }
        };
        Ok(event)
    });

    Ok(Sse::new(stream))
}
