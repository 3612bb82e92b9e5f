use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use async_stream::stream;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use drekee_kernel::{
    ClientBuilder, DrekeeClient, HistoryStats, SendOutcome, SendRequest, StreamItem,
};
use drekee_protocol::{
    ChatError, ChatFile, ChatId, ChatSession, MemoryStats, ModelMode, PipelineEvent, RequestId,
};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "drekee-api")]
#[command(about = "Drekee chat control-plane API")]
struct Cli {
    #[arg(long, env = "DREKEE_ROOT", default_value = ".drekee")]
    root: PathBuf,
    #[arg(long, default_value = "127.0.0.1:8788")]
    listen: SocketAddr,
}

#[derive(Clone)]
struct AppState {
    client: DrekeeClient,
}

#[derive(Debug, Deserialize, Default)]
struct CreateChatRequest {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    message: String,
    #[serde(default)]
    attachments: Vec<ChatFile>,
    /// Switches the agent mode before sending.
    mode: Option<ModelMode>,
}

#[derive(Debug, Deserialize)]
struct ModeRequest {
    mode: ModelMode,
}

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    message: String,
    response: String,
    feedback: String,
}

#[derive(Debug, Serialize)]
struct ChatSummary {
    id: ChatId,
    title: String,
    message_count: usize,
    generated_files: usize,
}

impl From<&ChatSession> for ChatSummary {
    fn from(chat: &ChatSession) -> Self {
        Self {
            id: chat.id.clone(),
            title: chat.title.clone(),
            message_count: chat.messages.len(),
            generated_files: chat.generated_files.len(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct EventStreamQuery {
    request_id: Option<String>,
    replay_limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct RecentEventsQuery {
    limit: Option<usize>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            message: error.to_string(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "bad_request",
            message: message.into(),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(error: ChatError) -> Self {
        let (status, kind) = match &error {
            ChatError::Aborted => (StatusCode::CONFLICT, "aborted"),
            ChatError::Busy => (StatusCode::CONFLICT, "busy"),
            ChatError::EmptyAttachments(_) => (StatusCode::BAD_REQUEST, "empty_attachments"),
            ChatError::ChatNotFound(_) | ChatError::NoActiveChat => {
                (StatusCode::NOT_FOUND, "chat_not_found")
            }
            ChatError::Gateway(_) if error.is_configuration() => {
                (StatusCode::SERVICE_UNAVAILABLE, "configuration")
            }
            ChatError::Gateway(_) => (StatusCode::BAD_GATEWAY, "gateway"),
            ChatError::Persistence(_) | ChatError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "persistence")
            }
        };
        Self {
            status,
            kind,
            message: error.user_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "error": self.message, "kind": self.kind })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let client = ClientBuilder::new(&cli.root).build().await?;
    let state = AppState { client };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/status", get(status))
        .route("/api/mode", post(set_mode))
        .route("/api/chats", get(list_chats).post(create_chat))
        .route("/api/chats/{chat_id}", get(get_chat).delete(delete_chat))
        .route("/api/chats/{chat_id}/select", post(select_chat))
        .route("/api/messages", post(send_message))
        .route("/api/stop", post(stop))
        .route("/api/memory", get(memory_stats).delete(clear_memory))
        .route("/api/memory/feedback", post(record_feedback))
        .route("/api/history", get(history_stats).delete(clear_history))
        .route("/api/events", get(recent_events))
        .route("/api/events/stream", get(stream_events))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!(listen = %cli.listen, root = %cli.root.display(), "drekee-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "drekee-api"
    }))
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let client = &state.client;
    Json(json!({
        "providers": client.provider_status(),
        "mode": client.mode(),
        "busy": client.is_busy(),
        "history": client.history_stats(),
        "memory": client.memory_stats(),
    }))
}

async fn set_mode(
    State(state): State<AppState>,
    Json(request): Json<ModeRequest>,
) -> Json<serde_json::Value> {
    state.client.set_mode(request.mode);
    Json(json!({ "mode": request.mode }))
}

async fn list_chats(State(state): State<AppState>) -> ApiResult<Json<Vec<ChatSummary>>> {
    let chats = state
        .client
        .list_chats()
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(chats.iter().map(ChatSummary::from).collect()))
}

async fn create_chat(
    State(state): State<AppState>,
    Json(request): Json<CreateChatRequest>,
) -> ApiResult<(StatusCode, Json<ChatSession>)> {
    let chat = state
        .client
        .new_chat(request.title)
        .await
        .map_err(ApiError::internal)?;
    state.client.clear_history();
    Ok((StatusCode::CREATED, Json(chat)))
}

async fn get_chat(
    Path(chat_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<ChatSession>> {
    let chat_id = parse_chat_id(&chat_id)?;
    let chat = state
        .client
        .get_chat(&chat_id)
        .await
        .map_err(not_found_or_internal)?;
    Ok(Json(chat))
}

async fn select_chat(
    Path(chat_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<ChatSummary>> {
    let chat_id = parse_chat_id(&chat_id)?;
    let chat = state
        .client
        .select_chat(&chat_id)
        .await
        .map_err(not_found_or_internal)?;
    state.client.clear_history();
    Ok(Json(ChatSummary::from(&chat)))
}

async fn delete_chat(
    Path(chat_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<StatusCode> {
    let chat_id = parse_chat_id(&chat_id)?;
    state
        .client
        .delete_chat(&chat_id)
        .await
        .map_err(not_found_or_internal)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> ApiResult<Json<SendOutcome>> {
    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }
    if let Some(mode) = request.mode {
        state.client.set_mode(mode);
    }
    let outcome = state
        .client
        .send(SendRequest::text(request.message).with_attachments(request.attachments))
        .await?;
    Ok(Json(outcome))
}

async fn stop(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "stopped": state.client.stop() }))
}

async fn memory_stats(State(state): State<AppState>) -> Json<MemoryStats> {
    Json(state.client.memory_stats())
}

async fn clear_memory(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state
        .client
        .clear_memory()
        .await
        .map_err(ApiError::internal)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn record_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> ApiResult<StatusCode> {
    state
        .client
        .record_feedback(&request.message, &request.response, &request.feedback)
        .await
        .map_err(ApiError::internal)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn history_stats(State(state): State<AppState>) -> Json<HistoryStats> {
    Json(state.client.history_stats())
}

async fn clear_history(State(state): State<AppState>) -> StatusCode {
    state.client.clear_history();
    StatusCode::NO_CONTENT
}

async fn recent_events(
    Query(query): Query<RecentEventsQuery>,
    State(state): State<AppState>,
) -> Json<Vec<PipelineEvent>> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    Json(state.client.events().recent(limit))
}

async fn stream_events(
    Query(query): Query<EventStreamQuery>,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let request_filter = query.request_id.map(RequestId::from_string);
    let replay_limit = query.replay_limit.unwrap_or(0).min(1000);

    let replay: Vec<PipelineEvent> = if replay_limit == 0 {
        Vec::new()
    } else {
        state
            .client
            .events()
            .recent(replay_limit)
            .into_iter()
            .filter(|event| {
                request_filter
                    .as_ref()
                    .is_none_or(|wanted| event.request_id() == wanted)
            })
            .collect()
    };
    let mut live = Box::pin(state.client.events().subscribe_filtered(request_filter));

    let stream = stream! {
        for event in &replay {
            yield Ok(as_sse_event(event));
        }

        while let Some(item) = live.next().await {
            match item {
                StreamItem::Event(event) => yield Ok(as_sse_event(&event)),
                StreamItem::Lagged(skipped) => {
                    let lag_payload = json!({ "skipped": skipped }).to_string();
                    yield Ok(Event::default().event("stream.lagged").data(lag_payload));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn as_sse_event(event: &PipelineEvent) -> Event {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_owned());
    Event::default().event("pipeline.event").data(payload)
}

fn parse_chat_id(raw: &str) -> ApiResult<ChatId> {
    let valid = !raw.is_empty()
        && raw
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if !valid {
        return Err(ApiError::bad_request(format!("invalid chat id: {raw}")));
    }
    Ok(ChatId::from_string(raw))
}

fn not_found_or_internal(error: anyhow::Error) -> ApiError {
    match error.downcast::<ChatError>() {
        Ok(chat_error) => ApiError::from(chat_error),
        Err(other) => ApiError::internal(format!("{other:#}")),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    tracing::error!(%error, "failed to install SIGTERM handler");
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
