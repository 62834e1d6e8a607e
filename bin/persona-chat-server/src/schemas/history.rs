//! `GET /api/messages/{user_id}` types.

use chrono::{DateTime, Utc};
use persona_chat_core::{MessageRecord, Mode, Role};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Only return messages from this persona.
    pub mode: Option<String>,
}

/// One stored message.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub mode: Mode,
    pub created_at: DateTime<Utc>,
}

impl From<MessageRecord> for StoredMessage {
    fn from(r: MessageRecord) -> Self {
        Self {
            id: r.id.to_string(),
            role: r.role,
            content: r.content,
            mode: r.mode,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    pub messages: Vec<StoredMessage>,
}
