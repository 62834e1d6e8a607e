//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are converted to a JSON body
//! `{"error": "..."}` with an appropriate status code.
//!
//! Internal errors (provider, database) are logged with full detail but only
//! a fixed message is returned, so upstream payloads and SQL never reach
//! clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::SecondsFormat;
use persona_chat_core::{ProviderError, RateLimitDecision, StoreError, UpstreamErrorKind, ValidationError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded. Please try again later.";
pub const UPSTREAM_CONFIG_MESSAGE: &str = "OpenAI API configuration error.";
pub const UPSTREAM_QUOTA_MESSAGE: &str = "OpenAI API quota exceeded.";
pub const GENERIC_MESSAGE: &str = "An unexpected error occurred. Please try again.";

pub static X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub static X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub static X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// All errors that can occur in the request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The client used up its quota for the current window.
    #[error("rate limit exceeded")]
    RateLimited(RateLimitDecision),

    /// The request failed a validation rule; the message is user-facing.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The completion provider failed before any response byte was sent.
    #[error("upstream error: {0}")]
    Upstream(#[from] ProviderError),

    /// Propagated from the message store.
    #[error("database error: {0}")]
    Database(#[from] StoreError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::RateLimited(decision) => return rate_limited(decision),
            ServerError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),

            ServerError::Upstream(e) => {
                error!(error = %e, "completion provider error");
                match e.kind() {
                    UpstreamErrorKind::Configuration => {
                        (StatusCode::INTERNAL_SERVER_ERROR, UPSTREAM_CONFIG_MESSAGE.to_owned())
                    }
                    UpstreamErrorKind::Quota => {
                        (StatusCode::SERVICE_UNAVAILABLE, UPSTREAM_QUOTA_MESSAGE.to_owned())
                    }
                    UpstreamErrorKind::Other => {
                        (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_MESSAGE.to_owned())
                    }
                }
            }
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_MESSAGE.to_owned())
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

fn rate_limited(decision: &RateLimitDecision) -> Response {
    let body = json!({
        "error": RATE_LIMITED_MESSAGE,
        "details": {
            "limit": decision.limit,
            "remaining": decision.remaining,
            "reset": decision.reset_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        },
    });
    let headers = [
        (X_RATELIMIT_LIMIT, decision.limit.to_string()),
        (X_RATELIMIT_REMAINING, decision.remaining.to_string()),
        (X_RATELIMIT_RESET, decision.reset_at.timestamp_millis().to_string()),
    ];
    (StatusCode::TOO_MANY_REQUESTS, headers, Json(body)).into_response()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
