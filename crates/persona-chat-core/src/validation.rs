//! Structural and size checks on an incoming chat request.
//!
//! Rules run in a fixed order and the first failure wins:
//!
//! 1. the message list is non-empty;
//! 2. every message has a known role and non-blank content;
//! 3. the mode names a known persona;
//! 4. total content stays within [`MAX_TOTAL_CONTENT_CHARS`].
//!
//! Nothing is partially accepted: a failing rule rejects the whole request
//! before any provider call is made.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::message::{ChatMessage, Mode, Role};

/// Upper bound on the summed length (in characters) of all message contents.
pub const MAX_TOTAL_CONTENT_CHARS: usize = 10_000;

/// A message as it arrives on the wire, before any checks.
///
/// Fields are optional so that a missing role or content is reported as a
/// validation failure instead of a deserialization error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RawMessage {
    /// `"system"`, `"user"` or `"assistant"`.
    #[serde(default)]
    pub role: Option<String>,
    /// Message text; must contain at least one non-whitespace character.
    #[serde(default)]
    pub content: Option<String>,
}

impl RawMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: Some(role.to_owned()),
            content: Some(content.to_owned()),
        }
    }
}

/// A request that passed every rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub mode: Mode,
    pub messages: Vec<ChatMessage>,
}

/// Why a request was rejected.  `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid messages format. Messages must be non-empty strings with valid roles.")]
    InvalidMessages,

    #[error("Invalid mode. Must be one of: {}", Mode::valid_names())]
    InvalidMode { given: String },

    #[error("Message content too long. Please keep messages under 10KB.")]
    ContentTooLong { total: usize, max: usize },
}

pub fn validate(messages: &[RawMessage], mode: &str) -> Result<ValidatedRequest, ValidationError> {
    if messages.is_empty() {
        return Err(ValidationError::InvalidMessages);
    }

    let messages = messages
        .iter()
        .map(check_message)
        .collect::<Option<Vec<_>>>()
        .ok_or(ValidationError::InvalidMessages)?;

    let mode = Mode::from_str(mode).map_err(|_| ValidationError::InvalidMode {
        given: mode.to_owned(),
    })?;

    let total: usize = messages.iter().map(|m| m.content.chars().count()).sum();
    if total > MAX_TOTAL_CONTENT_CHARS {
        return Err(ValidationError::ContentTooLong {
            total,
            max: MAX_TOTAL_CONTENT_CHARS,
        });
    }

    Ok(ValidatedRequest { mode, messages })
}

fn check_message(raw: &RawMessage) -> Option<ChatMessage> {
    let role = Role::from_str(raw.role.as_deref()?).ok()?;
    let content = raw.content.as_deref()?;
    if content.trim().is_empty() {
        return None;
    }
    Some(ChatMessage::new(role, content))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
