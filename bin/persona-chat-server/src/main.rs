//! persona-chat-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Open the message store (SQLite with migrations, or in-memory).
//! 4. Build the completion provider, rate limiter and persistence worker.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.
//! 6. Stop the limiter sweeper and drain queued turns into the store.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod sse;
mod state;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use persona_chat_core::{
    spawn_sweeper, FixedWindowLimiter, MemoryMessageStore, MessageStore, OpenAiProvider, PersistenceQueue,
    RateLimiter, SqliteMessageStore, MAX_RATE_LIMIT_WINDOW,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: CHAT_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "persona-chat-server starting");

    // ── 3. Message store ───────────────────────────────────────────────────────
    let store: Arc<dyn MessageStore> = if cfg.uses_memory_store() {
        warn!("using in-memory message store; history is lost on restart");
        Arc::new(MemoryMessageStore::new())
    } else {
        let store = SqliteMessageStore::connect(&cfg.database_url).await?;
        info!(database_url = %cfg.database_url, "database ready");
        Arc::new(store)
    };

    // ── 4. Pipeline collaborators ──────────────────────────────────────────────
    let openai = cfg.openai();
    if openai.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; chat requests will fail with a configuration error");
    }
    let provider = Arc::new(OpenAiProvider::new(openai));

    let limits = cfg.rate_limit();
    let rate_limiter: Arc<dyn RateLimiter> = Arc::new(FixedWindowLimiter::new(limits));
    let sweeper = spawn_sweeper(
        rate_limiter.clone(),
        limits.window.clamp(Duration::from_secs(1), MAX_RATE_LIMIT_WINDOW),
    );
    info!(window_secs = limits.window.as_secs(), max_requests = limits.max_requests, "rate limiter ready");

    let (persistence, persistence_worker) = PersistenceQueue::spawn(store.clone(), cfg.persist_queue_capacity);

    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        rate_limiter,
        provider,
        store,
        persistence,
    });

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // ── 6. Cleanup ─────────────────────────────────────────────────────────────
    sweeper.abort();
    // The worker exits once the last queue handle is gone.
    drop(state);
    if let Err(e) = persistence_worker.await {
        warn!(error = %e, "persistence worker ended abnormally");
    }

    info!("persona-chat-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
