//! SQLite implementation of [`MessageStore`].
//!
//! Uses [`sqlx`] with the `sqlite` feature.  Migrations are embedded at
//! compile time from `./migrations` (relative to the crate root) and run on
//! [`SqliteMessageStore::connect`].
//!
//! The runtime-checked `sqlx::query` form is used so that no `DATABASE_URL`
//! is needed at compile time.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{MessageRecord, MessageStore, StoreError};
use crate::message::{Mode, Role};

type MessageRow = (String, String, String, String, String, String);

#[derive(Clone, Debug)]
pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    /// Open (or create) the database at `url` and run pending migrations.
    ///
    /// `url` is a sqlx SQLite URL, e.g. `"sqlite://persona-chat.db?mode=rwc"`
    /// or `"sqlite::memory:"` for tests.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let mut options = SqlitePoolOptions::new();
        if url.contains(":memory:") {
            // Every connection to `:memory:` is a separate database.
            options = options.max_connections(1);
        }
        let pool = options.connect(url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn append_message(&self, record: MessageRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO messages (id, user_id, role, content, mode, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(record.id.to_string())
        .bind(&record.user_id)
        .bind(record.role.as_ref())
        .bind(&record.content)
        .bind(record.mode.as_ref())
        .bind(timestamp(record.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_messages(
        &self,
        user_id: &str,
        mode: Option<Mode>,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let rows: Vec<MessageRow> = match mode {
            Some(mode) => {
                sqlx::query_as(
                    "SELECT id, user_id, role, content, mode, created_at \
                     FROM messages WHERE user_id = ?1 AND mode = ?2 \
                     ORDER BY created_at ASC, rowid ASC",
                )
                .bind(user_id)
                .bind(mode.as_ref())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT id, user_id, role, content, mode, created_at \
                     FROM messages WHERE user_id = ?1 \
                     ORDER BY created_at ASC, rowid ASC",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(from_row).collect()
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn from_row((id, user_id, role, content, mode, created_at): MessageRow) -> Result<MessageRecord, StoreError> {
    Ok(MessageRecord {
        id: Uuid::parse_str(&id).map_err(|e| StoreError::Corrupt(format!("id {id:?}: {e}")))?,
        user_id,
        role: Role::from_str(&role).map_err(|_| StoreError::Corrupt(format!("role {role:?}")))?,
        content,
        mode: Mode::from_str(&mode).map_err(|_| StoreError::Corrupt(format!("mode {mode:?}")))?,
        created_at: created_at
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("created_at {created_at:?}: {e}")))?,
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────
