//! Fakes and a router harness shared by the handler tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use futures::{stream, StreamExt};
use http_body_util::BodyExt;
use persona_chat_core::{
    ChatMessage, ChunkStream, CompletionProvider, FixedWindowLimiter, MessageRecord, MessageStore, Mode,
    PersistenceQueue, ProviderError, RateLimitConfig, StoreError,
};
use tower::ServiceExt;

use crate::config::Config;
use crate::routes;
use crate::state::AppState;

enum Script {
    Reply(String),
    Chunks(Vec<Result<&'static str, &'static str>>),
    Fail(String),
}

/// Provider that answers every call from a fixed script.
pub struct ScriptedProvider {
    script: Script,
    calls: AtomicUsize,
    last_prompt: Mutex<Vec<ChatMessage>>,
}

impl ScriptedProvider {
    fn with(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(Vec::new()),
        })
    }

    pub fn reply(text: &str) -> Arc<Self> {
        Self::with(Script::Reply(text.to_owned()))
    }

    /// Stream these fragments; an `Err` ends the stream with a failure.
    pub fn chunks(items: Vec<Result<&'static str, &'static str>>) -> Arc<Self> {
        Self::with(Script::Chunks(items))
    }

    /// Fail before producing anything, with an upstream error carrying `message`.
    pub fn fail(message: &str) -> Arc<Self> {
        Self::with(Script::Fail(message.to_owned()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Vec<ChatMessage> {
        self.last_prompt.lock().unwrap().clone()
    }

    fn record(&self, messages: &[ChatMessage]) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = messages.to_vec();
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        self.record(messages);
        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Chunks(items) => Ok(items.iter().filter_map(|r| r.ok()).collect()),
            Script::Fail(message) => Err(ProviderError::Api { status: 500, message: message.clone() }),
        }
    }

    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream, ProviderError> {
        self.record(messages);
        let items: Vec<Result<String, ProviderError>> = match &self.script {
            Script::Reply(text) => vec![Ok(text.clone())],
            Script::Chunks(items) => items
                .iter()
                .map(|r| r.map(str::to_owned).map_err(|e| ProviderError::Stream(e.to_owned())))
                .collect(),
            Script::Fail(message) => {
                return Err(ProviderError::Api { status: 500, message: message.clone() });
            }
        };
        Ok(stream::iter(items).boxed())
    }
}

/// Store whose every write fails.
#[derive(Default)]
pub struct FailingStore;

#[async_trait]
impl MessageStore for FailingStore {
    async fn append_message(&self, _record: MessageRecord) -> Result<(), StoreError> {
        Err(StoreError::Corrupt("disk on fire".into()))
    }

    async fn list_messages(&self, _: &str, _: Option<Mode>) -> Result<Vec<MessageRecord>, StoreError> {
        Err(StoreError::Corrupt("disk on fire".into()))
    }
}

/// Counts finished write attempts, successful or not.
struct CountingStore {
    inner: Arc<dyn MessageStore>,
    writes: Arc<AtomicUsize>,
}

#[async_trait]
impl MessageStore for CountingStore {
    async fn append_message(&self, record: MessageRecord) -> Result<(), StoreError> {
        let result = self.inner.append_message(record).await;
        self.writes.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn list_messages(&self, user_id: &str, mode: Option<Mode>) -> Result<Vec<MessageRecord>, StoreError> {
        self.inner.list_messages(user_id, mode).await
    }
}

pub struct Harness {
    router: Router,
    writes: Arc<AtomicUsize>,
}

/// Full router over the given fakes, with `max_requests` per client per minute.
pub fn harness(provider: Arc<dyn CompletionProvider>, store: Arc<dyn MessageStore>, max_requests: u32) -> Harness {
    let writes = Arc::new(AtomicUsize::new(0));
    let store: Arc<dyn MessageStore> = Arc::new(CountingStore { inner: store, writes: writes.clone() });
    let (persistence, _worker) = PersistenceQueue::spawn(store.clone(), 16);

    let config = Config {
        enable_swagger: false,
        ..Config::default()
    };
    let state = Arc::new(AppState {
        config: Arc::new(config),
        rate_limiter: Arc::new(FixedWindowLimiter::new(RateLimitConfig {
            window: Duration::from_secs(60),
            max_requests,
        })),
        provider,
        store,
        persistence,
    });

    Harness { router: routes::build(state), writes }
}

impl Harness {
    pub async fn send(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_chat(&self, client_ip: &str, body: &serde_json::Value) -> Response {
        self.post_chat_body(client_ip, Body::from(body.to_string())).await
    }

    pub async fn post_chat_body(&self, client_ip: &str, body: Body) -> Response {
        let req = Request::post("/api/chat")
            .header("content-type", "application/json")
            .header("x-forwarded-for", client_ip)
            .body(body)
            .unwrap();
        self.send(req).await
    }

    /// Wait until the persistence worker has attempted `n` writes.
    pub async fn wait_for_writes(&self, n: usize) -> usize {
        for _ in 0..200 {
            let done = self.writes.load(Ordering::SeqCst);
            if done >= n {
                return done;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("persistence worker did not reach {n} writes");
    }

    /// Give background work a moment to run when nothing is expected to happen.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

pub async fn text_body(resp: Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn json_body(resp: Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
