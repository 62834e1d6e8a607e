//! `POST /api/chat` – the chat request pipeline.
//!
//! Stages, each of which can end the request:
//!
//! 1. rate limit (route middleware, before the body is read) → 429
//! 2. validation → 400
//! 3. prompt assembly
//! 4. completion, synchronous (JSON) or streamed (SSE) → 500/503 on
//!    provider failure before the first byte
//! 5. persistence of the turn, queued after the response is built and
//!    never able to change it

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};
use persona_chat_core::{
    prompt, validation, ChatMessage, Mode, RateLimitDecision, Role, Turn, ValidationError,
};
use tracing::{debug, info};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::error::ServerError;
use crate::middleware::rate_limit::enforce_rate_limit;
use crate::schemas::chat::{ChatRequest, ChatResponse, RateLimitInfo, Reply};
use crate::sse::{self, CompletionHook};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(chat),
    components(schemas(ChatRequest, ChatResponse, Reply, RateLimitInfo))
)]
pub struct ChatApi;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/chat", post(chat))
        .route_layer(middleware::from_fn_with_state(state, enforce_rate_limit))
}

/// Send the conversation to the assistant and return its reply.
///
/// With `stream: true` the reply is delivered as `text/event-stream` frames
/// `data: {"chunk","id"}`, terminated by `data: [DONE]` or a single
/// `data: {"error"}` frame.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Reply generated (JSON, or an event stream when `stream` is set)", body = ChatResponse),
        (status = 400, description = "Invalid messages, mode or content length"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 500, description = "Provider configuration or unexpected error"),
        (status = 503, description = "Provider quota exceeded"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(limit): Extension<RateLimitDecision>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(req) = body.map_err(|e| {
        debug!(error = %e, "rejected chat body");
        ValidationError::InvalidMessages
    })?;

    let validated = validation::validate(&req.messages, req.mode.as_deref().unwrap_or("friend"))?;
    let full_prompt = prompt::assemble(validated.mode, &validated.messages);

    let pending = PendingTurn {
        user_id: req.user_id.filter(|u| !u.trim().is_empty()),
        mode: validated.mode,
        user_content: last_content(&validated.messages),
        reply_id: Uuid::new_v4(),
    };

    debug!(
        mode = %pending.mode,
        messages = validated.messages.len(),
        stream = req.stream,
        authenticated = pending.user_id.is_some(),
        "chat request accepted"
    );

    if req.stream {
        stream_reply(&state, &full_prompt, pending).await
    } else {
        sync_reply(&state, &full_prompt, pending, limit).await
    }
}

/// What is needed to store the turn once the reply text is known.
struct PendingTurn {
    user_id: Option<String>,
    mode: Mode,
    user_content: String,
    reply_id: Uuid,
}

impl PendingTurn {
    fn into_turn(self, assistant_content: String) -> Option<Turn> {
        Some(Turn {
            user_id: self.user_id?,
            mode: self.mode,
            user_content: self.user_content,
            assistant_id: self.reply_id,
            assistant_content,
        })
    }
}

async fn sync_reply(
    state: &AppState,
    full_prompt: &[ChatMessage],
    pending: PendingTurn,
    limit: RateLimitDecision,
) -> Result<Response, ServerError> {
    let content = state.provider.complete(full_prompt).await?;
    info!(reply_id = %pending.reply_id, output_len = content.len(), "chat completion done");

    let response = Json(ChatResponse {
        reply: Reply {
            role: Role::Assistant,
            content: content.clone(),
            id: pending.reply_id.to_string(),
        },
        rate_limit: RateLimitInfo {
            remaining: limit.remaining,
            reset: limit.reset_at.timestamp_millis(),
        },
    })
    .into_response();

    if let Some(turn) = pending.into_turn(content) {
        state.persistence.submit(turn);
    }
    Ok(response)
}

async fn stream_reply(
    state: &AppState,
    full_prompt: &[ChatMessage],
    pending: PendingTurn,
) -> Result<Response, ServerError> {
    // Failures here happen before any byte is sent and map to a status code.
    let chunks = state.provider.complete_stream(full_prompt).await?;
    let reply_id = pending.reply_id.to_string();

    let hook: Option<CompletionHook> = pending.user_id.is_some().then(|| {
        let queue = state.persistence.clone();
        Box::new(move |content: String| {
            if content.is_empty() {
                debug!("empty streamed reply; nothing to persist");
                return;
            }
            if let Some(turn) = pending.into_turn(content) {
                queue.submit(turn);
            }
        }) as CompletionHook
    });

    Ok(sse::into_response(sse::encode(reply_id, chunks, hook)))
}

/// Content of the newest message; stored as the user's side of the turn.
fn last_content(messages: &[ChatMessage]) -> String {
    messages.last().map(|m| m.content.clone()).unwrap_or_default()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
