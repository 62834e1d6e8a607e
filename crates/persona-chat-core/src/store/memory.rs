//! In-process [`MessageStore`], selected with `CHAT_DATABASE_URL=memory:`.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{MessageRecord, MessageStore, StoreError};
use crate::message::Mode;

#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    records: Mutex<Vec<MessageRecord>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored record in insertion order.
    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append_message(&self, record: MessageRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Corrupt("message table lock poisoned".into()))?
            .push(record);
        Ok(())
    }

    async fn list_messages(
        &self,
        user_id: &str,
        mode: Option<Mode>,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let records = self
            .records
            .lock()
            .map_err(|_| StoreError::Corrupt("message table lock poisoned".into()))?;
        let mut out: Vec<MessageRecord> = records
            .iter()
            .filter(|r| r.user_id == user_id && mode.is_none_or(|m| r.mode == m))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.created_at);
        Ok(out)
    }
}
