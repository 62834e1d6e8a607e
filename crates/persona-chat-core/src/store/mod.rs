//! Message store abstraction.
//!
//! [`MessageStore`] is the only thing the pipeline knows about persistence.
//! The default implementation is [`sqlite::SqliteMessageStore`];
//! [`memory::MemoryMessageStore`] keeps everything in process memory.  To
//! swap to another database, implement [`MessageStore`] for the new type and
//! hand it to the server bootstrap.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::message::{Mode, Role};

pub use memory::MemoryMessageStore;
pub use sqlite::SqliteMessageStore;

/// A single row in the `messages` table.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub id: Uuid,
    /// Owner of the conversation.  Anonymous turns are never stored.
    pub user_id: String,
    pub role: Role,
    pub content: String,
    pub mode: Mode,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A stored row could not be mapped back into a [`MessageRecord`].
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Persist one message.
    async fn append_message(&self, record: MessageRecord) -> Result<(), StoreError>;

    /// All messages owned by `user_id`, oldest first, optionally limited to
    /// one persona.
    async fn list_messages(
        &self,
        user_id: &str,
        mode: Option<Mode>,
    ) -> Result<Vec<MessageRecord>, StoreError>;
}
