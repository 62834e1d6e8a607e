//! Completion provider boundary.
//!
//! The orchestrator depends only on [`CompletionProvider`]; the hosted-LLM
//! specifics live in [`openai`].  Streaming is exposed as a pull-based
//! [`ChunkStream`]: dropping it tells the provider to stop reading and close
//! its upstream connection.

pub mod openai;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::message::ChatMessage;

pub use openai::{OpenAiConfig, OpenAiProvider};

/// Text returned when the provider answers without any content.
pub const EMPTY_REPLY_FALLBACK: &str = "No response from the AI model.";

/// Lazy, finite, non-restartable sequence of generated text fragments.
///
/// Fragments arrive in generation order.  The stream ends after the last
/// fragment, or right after yielding a single `Err`.
pub type ChunkStream = BoxStream<'static, Result<String, ProviderError>>;

#[async_trait]
pub trait CompletionProvider: Send + Sync + 'static {
    /// Run one completion and return the assistant's full reply.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;

    /// Start a streaming completion.
    ///
    /// An `Err` here means nothing was generated; errors after the first
    /// fragment are delivered through the stream.
    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream, ProviderError>;
}

/// Errors raised while talking to the completion provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("OpenAI API key is not configured")]
    MissingApiKey,

    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed provider payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("provider stream failed: {0}")]
    Stream(String),
}

/// How an upstream failure should surface to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// Credentials are missing or rejected; operator-fixable.
    Configuration,
    /// The provider account is out of quota; retry later.
    Quota,
    Other,
}

impl ProviderError {
    pub fn kind(&self) -> UpstreamErrorKind {
        if matches!(self, ProviderError::MissingApiKey) {
            return UpstreamErrorKind::Configuration;
        }
        let message = self.to_string().to_lowercase();
        if message.contains("api key") {
            UpstreamErrorKind::Configuration
        } else if message.contains("quota") {
            UpstreamErrorKind::Quota
        } else {
            UpstreamErrorKind::Other
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn api(message: &str) -> ProviderError {
        ProviderError::Api { status: 400, message: message.into() }
    }

    #[test]
    fn classifies_key_problems_as_configuration() {
        assert_eq!(ProviderError::MissingApiKey.kind(), UpstreamErrorKind::Configuration);
        assert_eq!(
            api("Incorrect API key provided: sk-****").kind(),
            UpstreamErrorKind::Configuration
        );
    }

    #[test]
    fn classifies_quota_problems() {
        assert_eq!(
            api("You exceeded your current quota, please check your plan").kind(),
            UpstreamErrorKind::Quota
        );
    }

    #[test]
    fn everything_else_is_other() {
        assert_eq!(api("model overloaded").kind(), UpstreamErrorKind::Other);
        assert_eq!(ProviderError::Stream("reset".into()).kind(), UpstreamErrorKind::Other);
    }
}
