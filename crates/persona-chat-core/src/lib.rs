//! persona-chat-core – the request pipeline pieces behind the chat endpoint.
//!
//! Everything here is transport-agnostic: the HTTP server composes these
//! building blocks into the `/api/chat` handler.
//!
//! - [`rate_limit`]  fixed-window, per-client request limiter
//! - [`validation`]  structural / size checks on incoming messages
//! - [`prompt`]      persona system-prompt assembly
//! - [`provider`]    completion provider boundary (sync + streaming)
//! - [`store`]       message store boundary (SQLite, in-memory)
//! - [`persistence`] background, best-effort turn persistence

pub mod message;
pub mod persistence;
pub mod prompt;
pub mod provider;
pub mod rate_limit;
pub mod store;
pub mod validation;

pub use message::{ChatMessage, Mode, Role};
pub use persistence::{PersistenceQueue, StampSource, Turn};
pub use provider::{ChunkStream, CompletionProvider, OpenAiConfig, OpenAiProvider, ProviderError, UpstreamErrorKind};
pub use rate_limit::{spawn_sweeper, FixedWindowLimiter, MAX_WINDOW as MAX_RATE_LIMIT_WINDOW, RateLimitConfig, RateLimitDecision, RateLimiter};
pub use store::{MemoryMessageStore, MessageRecord, MessageStore, SqliteMessageStore, StoreError};
pub use validation::{RawMessage, ValidatedRequest, ValidationError};
