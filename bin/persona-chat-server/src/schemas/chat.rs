//! `POST /api/chat` request / response types.

use persona_chat_core::{RawMessage, Role};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Conversation so far, oldest first; the last entry is the new user turn.
    #[serde(default)]
    pub messages: Vec<RawMessage>,
    /// Persona: `"friend"` (default), `"mentor"` or `"developer"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Owner of the conversation.  Anonymous turns are not stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// When `true`, the reply is streamed as server-sent events.
    #[serde(default)]
    pub stream: bool,
}

/// The assistant's reply.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Reply {
    /// Always `"assistant"`.
    pub role: Role,
    pub content: String,
    /// Identifier shared with the stored assistant message.
    pub id: String,
}

/// Quota left for the calling client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RateLimitInfo {
    pub remaining: u32,
    /// End of the current window, Unix epoch milliseconds.
    pub reset: i64,
}

/// Response body for a non-streaming `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: Reply,
    pub rate_limit: RateLimitInfo,
}
