use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use persona_chat_core::{Mode, ValidationError};
use tracing::debug;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::history::{HistoryQuery, HistoryResponse, StoredMessage};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(list_messages), components(schemas(HistoryResponse, StoredMessage)))]
pub struct HistoryApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/messages/{user_id}", get(list_messages))
}

/// Stored conversation of one user, oldest first.
///
/// The caller is not authenticated: anyone who knows a `user_id` can read that
/// user's history. Deploy behind a gateway that checks the caller owns the id.
#[utoipa::path(
    get,
    path = "/api/messages/{user_id}",
    tag = "chat",
    params(
        ("user_id" = String, Path, description = "Owner of the conversation"),
        HistoryQuery,
    ),
    responses(
        (status = 200, description = "Stored messages", body = HistoryResponse),
        (status = 400, description = "Unknown mode filter"),
        (status = 500, description = "Database error"),
    )
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ServerError> {
    let mode = match query.mode.as_deref() {
        None => None,
        Some(name) => Some(Mode::from_str(name).map_err(|_| ValidationError::InvalidMode {
            given: name.to_owned(),
        })?),
    };

    let records = state.store.list_messages(&user_id, mode).await?;
    debug!(user_id = %user_id, count = records.len(), "history listed");

    Ok(Json(HistoryResponse {
        messages: records.into_iter().map(StoredMessage::from).collect(),
    }))
}

#[cfg(test)]
mod test {
    use crate::test_support::*;
    use axum::http::StatusCode;
    use persona_chat_core::MemoryMessageStore;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn lists_persisted_turns_filtered_by_mode() {
        let store = Arc::new(MemoryMessageStore::new());
        let h = harness(ScriptedProvider::reply("hello"), store, 20);

        let chat = |mode: &str| json!({
            "messages": [{ "role": "user", "content": format!("hi {mode}") }],
            "mode": mode,
            "userId": "u1",
        });
        h.post_chat("10.0.0.1", &chat("friend")).await;
        h.post_chat("10.0.0.1", &chat("mentor")).await;
        h.wait_for_writes(4).await;

        let all = json_body(h.get("/api/messages/u1").await).await;
        assert_eq!(all["messages"].as_array().unwrap().len(), 4);
        assert_eq!(all["messages"][0]["content"], "hi friend");
        assert_eq!(all["messages"][1]["role"], "assistant");

        let mentor = json_body(h.get("/api/messages/u1?mode=mentor").await).await;
        let mentor = mentor["messages"].as_array().unwrap();
        assert_eq!(mentor.len(), 2);
        assert!(mentor.iter().all(|m| m["mode"] == "mentor"));

        let other = json_body(h.get("/api/messages/u2").await).await;
        assert!(other["messages"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_mode_filter_is_rejected() {
        let h = harness(ScriptedProvider::reply("x"), Arc::new(MemoryMessageStore::new()), 20);
        let resp = h.get("/api/messages/u1?mode=philosopher").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn store_errors_are_generic_500s() {
        let h = harness(ScriptedProvider::reply("x"), Arc::new(FailingStore), 20);
        let resp = h.get("/api/messages/u1").await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(resp).await["error"],
            "An unexpected error occurred. Please try again."
        );
    }
}
