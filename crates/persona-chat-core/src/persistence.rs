//! Best-effort, post-response persistence of conversation turns.
//!
//! Handlers hand a finished [`Turn`] to a [`PersistenceQueue`] and move on.
//! A single background worker writes the user message and then the assistant
//! message to the [`MessageStore`].  Each turn is attempted at most once;
//! failures are logged and never reach the client.
//!
//! Ordering inside a turn does not rely on the store: both records are
//! stamped from a [`StampSource`] whose readings strictly increase, so the
//! assistant row always sorts after the user row.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn, Instrument};
use uuid::Uuid;

use crate::message::{Mode, Role};
use crate::store::{MessageRecord, MessageStore};

/// One completed exchange, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub user_id: String,
    pub mode: Mode,
    pub user_content: String,
    /// Same id that was returned to the client for the reply.
    pub assistant_id: Uuid,
    pub assistant_content: String,
}

/// Wall-clock timestamps that never repeat or go backwards.
///
/// Readings are truncated to microseconds (the precision the stores keep) and
/// bumped by one microsecond whenever the clock has not moved past the
/// previous reading.
#[derive(Debug)]
pub struct StampSource {
    last: Mutex<DateTime<Utc>>,
}

impl Default for StampSource {
    fn default() -> Self {
        Self {
            last: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }
}

impl StampSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let stamp = if now > *last {
            now
        } else {
            *last + TimeDelta::microseconds(1)
        };
        *last = stamp;
        stamp
    }
}

#[derive(Debug)]
struct StampedTurn {
    turn: Turn,
    user_at: DateTime<Utc>,
    assistant_at: DateTime<Utc>,
}

/// Sending half of the persistence worker.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct PersistenceQueue {
    tx: mpsc::Sender<StampedTurn>,
    stamps: Arc<StampSource>,
}

impl PersistenceQueue {
    /// Start the worker.  It runs until every queue clone is dropped and the
    /// backlog is drained; await the returned handle to wait for that.
    pub fn spawn(store: Arc<dyn MessageStore>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_worker(store, rx).in_current_span());
        let queue = Self {
            tx,
            stamps: Arc::new(StampSource::new()),
        };
        (queue, handle)
    }

    /// Queue `turn` for storage without waiting.
    ///
    /// Returns `false` (and logs) when the turn was dropped because the queue
    /// is full or the worker has stopped.
    pub fn submit(&self, turn: Turn) -> bool {
        let user_at = self.stamps.next();
        let assistant_at = self.stamps.next();
        let stamped = StampedTurn { turn, user_at, assistant_at };

        match self.tx.try_send(stamped) {
            Ok(()) => true,
            Err(TrySendError::Full(t)) => {
                warn!(user_id = %t.turn.user_id, "persistence queue full; dropping turn");
                false
            }
            Err(TrySendError::Closed(t)) => {
                warn!(user_id = %t.turn.user_id, "persistence worker stopped; dropping turn");
                false
            }
        }
    }
}

async fn run_worker(store: Arc<dyn MessageStore>, mut rx: mpsc::Receiver<StampedTurn>) {
    while let Some(stamped) = rx.recv().await {
        write_turn(store.as_ref(), stamped).await;
    }
    debug!("persistence worker drained; exiting");
}

async fn write_turn(store: &dyn MessageStore, stamped: StampedTurn) {
    let StampedTurn { turn, user_at, assistant_at } = stamped;

    let user = MessageRecord {
        id: Uuid::new_v4(),
        user_id: turn.user_id.clone(),
        role: Role::User,
        content: turn.user_content,
        mode: turn.mode,
        created_at: user_at,
    };
    if let Err(e) = store.append_message(user).await {
        error!(error = %e, user_id = %turn.user_id, role = "user", "failed to persist message");
    }

    let assistant = MessageRecord {
        id: turn.assistant_id,
        user_id: turn.user_id.clone(),
        role: Role::Assistant,
        content: turn.assistant_content,
        mode: turn.mode,
        created_at: assistant_at,
    };
    if let Err(e) = store.append_message(assistant).await {
        error!(error = %e, user_id = %turn.user_id, role = "assistant", "failed to persist message");
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::{MemoryMessageStore, StoreError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    struct FailingStore {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl MessageStore for FailingStore {
        async fn append_message(&self, _record: MessageRecord) -> Result<(), StoreError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Corrupt("disk on fire".into()))
        }

        async fn list_messages(&self, _: &str, _: Option<Mode>) -> Result<Vec<MessageRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn turn() -> Turn {
        Turn {
            user_id: "u1".into(),
            mode: Mode::Friend,
            user_content: "hi".into(),
            assistant_id: Uuid::new_v4(),
            assistant_content: "hello".into(),
        }
    }

    #[test]
    fn stamps_strictly_increase() {
        let stamps = StampSource::new();
        let mut prev = stamps.next();
        for _ in 0..10_000 {
            let next = stamps.next();
            assert!(next > prev);
            prev = next;
        }
    }

    #[tokio::test]
    async fn writes_user_then_assistant_with_increasing_stamps() {
        let store = Arc::new(MemoryMessageStore::new());
        let (queue, worker) = PersistenceQueue::spawn(store.clone(), 8);
        let t = turn();

        assert!(queue.submit(t.clone()));
        drop(queue);
        worker.await.unwrap();

        let rows = store.snapshot();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].role, Role::User);
        assert_eq!(rows[0].content, "hi");
        assert_eq!(rows[1].role, Role::Assistant);
        assert_eq!(rows[1].content, "hello");
        assert_eq!(rows[1].id, t.assistant_id);
        assert!(rows[1].created_at > rows[0].created_at);
        assert!(rows.iter().all(|r| r.user_id == "u1" && r.mode == Mode::Friend));
    }

    #[tokio::test]
    #[traced_test]
    async fn store_failures_are_logged_and_swallowed() {
        let store = Arc::new(FailingStore { attempts: AtomicUsize::new(0) });
        let (queue, worker) = PersistenceQueue::spawn(store.clone(), 8);

        assert!(queue.submit(turn()));
        assert!(queue.submit(turn()));
        drop(queue);
        worker.await.expect("worker must not panic on store errors");

        assert_eq!(store.attempts.load(Ordering::SeqCst), 4);
        assert!(logs_contain("failed to persist message"));
    }

    #[tokio::test]
    async fn submit_after_worker_stops_is_dropped() {
        let store = Arc::new(MemoryMessageStore::new());
        let (queue, worker) = PersistenceQueue::spawn(store, 8);
        worker.abort();
        let _ = worker.await;
        assert!(!queue.submit(turn()));
    }
}
