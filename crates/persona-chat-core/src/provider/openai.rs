//! OpenAI chat-completions adapter.
//!
//! Talks to any endpoint that speaks the OpenAI `/chat/completions` wire
//! format.  Streaming responses are read on a background task that forwards
//! decoded text fragments through a bounded channel; the task exits (and the
//! HTTP connection is dropped) as soon as the receiving side goes away.

use std::pin::pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use super::{ChunkStream, CompletionProvider, ProviderError, EMPTY_REPLY_FALLBACK};
use crate::message::{ChatMessage, Role};

/// Fragments buffered between the upstream reader and the consumer.
const STREAM_BUFFER: usize = 32;

/// Connection settings for [`OpenAiProvider`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Bearer token.  `None` makes every call fail with
    /// [`ProviderError::MissingApiKey`].
    pub api_key: Option<String>,
    /// API root, e.g. `"https://api.openai.com/v1"`.
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn send(&self, messages: &[ChatMessage], stream: bool) -> Result<reqwest::Response, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ProviderError::MissingApiKey)?;

        let body = CompletionBody {
            model: &self.config.model,
            messages: messages
                .iter()
                .map(|m| WireMessage { role: m.role, content: &m.content })
                .collect(),
            temperature: self.config.temperature,
            stream,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!(%url, model = %self.config.model, messages = messages.len(), stream, "calling completion provider");

        let resp = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let resp = self.send(messages, false).await?;
        let bytes = resp.bytes().await?;
        let parsed: CompletionResponse = serde_json::from_slice(&bytes)?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_owned()))
    }

    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream, ProviderError> {
        let resp = self.send(messages, true).await?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(pump(resp.bytes_stream(), tx));
        Ok(ReceiverStream::new(rx).boxed())
    }
}

/// Read an SSE byte stream from the provider and forward text deltas to `tx`.
///
/// Stops after `data: [DONE]`, the end of the body, the first error (which is
/// forwarded), or when the receiver is dropped.
async fn pump<S, E>(body: S, tx: mpsc::Sender<Result<String, ProviderError>>)
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<ProviderError>,
{
    let mut body = pin!(body);
    let mut decoder = SseLineDecoder::default();

    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                debug!("stream consumer dropped; closing upstream connection");
                return;
            }
            next = body.next() => next,
        };

        let bytes = match next {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                let _ = tx.send(Err(e.into())).await;
                return;
            }
            None => return,
        };

        for data in decoder.push(&bytes) {
            let payload = match data {
                SseData::Done => return,
                SseData::Payload(payload) => payload,
            };
            match delta_text(&payload) {
                Ok(Some(text)) => {
                    if tx.send(Ok(text)).await.is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "undecodable provider stream chunk");
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }
    }
}

fn delta_text(payload: &str) -> Result<Option<String>, ProviderError> {
    let chunk: StreamChunk = serde_json::from_str(payload)?;
    if let Some(err) = chunk.error {
        return Err(ProviderError::Stream(err.message));
    }
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|t| !t.is_empty()))
}

/// Extract `error.message` from a provider error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_owned())
}

// ── SSE line decoding ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum SseData {
    Payload(String),
    Done,
}

/// Incremental decoder for `data:` lines of a server-sent-event body.
///
/// Network chunks may split lines (and multi-byte characters) anywhere, so
/// bytes are buffered until a full line is available.
#[derive(Debug, Default)]
struct SseLineDecoder {
    buf: Vec<u8>,
}

impl SseLineDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseData> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim_start();
            if data == "[DONE]" {
                out.push(SseData::Done);
            } else if !data.is_empty() {
                out.push(SseData::Payload(data.to_owned()));
            }
        }
        out
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ── Tests ──────────────────────────────────────────────────────────────────────
