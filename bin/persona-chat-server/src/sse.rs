//! Server-sent-event encoding of a streamed reply.
//!
//! Every text fragment becomes one `data: {"chunk":..,"id":..}` frame.  The
//! stream then ends with exactly one terminal frame: `data: [DONE]` when the
//! provider finished, or `data: {"error":"Streaming failed"}` when it failed
//! part-way.  Nothing is emitted after the terminal frame.
//!
//! Dropping the encoded stream (client disconnect) drops the provider's
//! [`ChunkStream`], which closes the upstream connection.

use std::convert::Infallible;

use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::{stream, Stream, StreamExt};
use persona_chat_core::ChunkStream;
use serde_json::json;
use tracing::{debug, warn};

/// Payload of the error frame sent when the provider fails mid-stream.
pub const STREAM_FAILED: &str = "Streaming failed";

/// Marker payload of the final frame of a successful stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Called once with the full reply text when the stream completes successfully.
pub type CompletionHook = Box<dyn FnOnce(String) + Send + 'static>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Chunk { chunk: String, id: String },
    Done,
    Error { error: String },
}

impl Frame {
    /// Text carried on the frame's `data:` line.
    pub fn data(&self) -> String {
        match self {
            Frame::Chunk { chunk, id } => json!({ "chunk": chunk, "id": id }).to_string(),
            Frame::Done => DONE_MARKER.to_owned(),
            Frame::Error { error } => json!({ "error": error }).to_string(),
        }
    }

    pub fn into_event(self) -> Event {
        Event::default().data(self.data())
    }
}

struct EncoderState {
    id: String,
    chunks: ChunkStream,
    content: String,
    on_complete: Option<CompletionHook>,
}

/// Turn provider fragments into frames for the reply identified by `id`.
pub fn encode(
    id: String,
    chunks: ChunkStream,
    on_complete: Option<CompletionHook>,
) -> impl Stream<Item = Frame> + Send + 'static {
    let state = EncoderState {
        id,
        chunks,
        content: String::new(),
        on_complete,
    };

    // `None` state means the terminal frame has been emitted.
    stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        match state.chunks.next().await {
            Some(Ok(text)) => {
                state.content.push_str(&text);
                let frame = Frame::Chunk {
                    chunk: text,
                    id: state.id.clone(),
                };
                Some((frame, Some(state)))
            }
            Some(Err(e)) => {
                warn!(error = %e, reply_id = %state.id, "completion stream failed");
                let frame = Frame::Error {
                    error: STREAM_FAILED.to_owned(),
                };
                Some((frame, None))
            }
            None => {
                debug!(reply_id = %state.id, len = state.content.len(), "completion stream finished");
                if let Some(hook) = state.on_complete.take() {
                    hook(std::mem::take(&mut state.content));
                }
                Some((Frame::Done, None))
            }
        }
    })
}

/// Wrap encoded frames in an `text/event-stream` response.
pub fn into_response(frames: impl Stream<Item = Frame> + Send + 'static) -> Response {
    Sse::new(frames.map(|f| Ok::<Event, Infallible>(f.into_event()))).into_response()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
