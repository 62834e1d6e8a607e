//! Conversation message and persona types.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use utoipa::ToSchema;

/// Author of a [`ChatMessage`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
    Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Persona preset selecting the assistant's tone.
///
/// Every request resolves to exactly one mode; unknown names are rejected by
/// [`crate::validation`] rather than silently mapped to a default.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema,
    Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    #[default]
    Friend,
    Mentor,
    Developer,
}

impl Mode {
    /// Fixed system instruction prepended to every conversation in this mode.
    pub fn system_prompt(self) -> &'static str {
        match self {
            Mode::Friend => {
                "You are Jake, a reliable friend who loves to make people smile. You're casual, \
                 supportive, and always ready to listen. Keep responses conversational and warm."
            }
            Mode::Mentor => {
                "You are a supportive life mentor who explains concepts clearly and teaches the \
                 user with easy-to-understand examples. Focus on growth, learning, and providing \
                 actionable guidance."
            }
            Mode::Developer => {
                "You are a senior developer who responds concisely and with technical accuracy. \
                 Provide practical coding solutions, best practices, and technical insights. Use \
                 code examples when helpful."
            }
        }
    }

    /// Comma-separated list of every valid mode name, in declaration order.
    pub fn valid_names() -> String {
        Mode::iter()
            .map(|m| m.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A single message in a conversation.
///
/// Messages are never edited once sent; the pipeline only ever builds new
/// sequences around them.
///
/// Stored history uses [`crate::store::MessageRecord`] instead, which adds the
/// owner, persona and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
