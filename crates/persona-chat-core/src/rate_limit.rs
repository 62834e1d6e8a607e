//! Fixed-window request limiter keyed by client identifier.
//!
//! Each client gets a counter that resets at a fixed boundary (`window` after
//! the first request of the window) rather than a sliding average.  The table
//! lives in process memory only, so several server instances each keep their
//! own independent counters.  Put another [`RateLimiter`] implementation
//! behind the trait to share counters between instances.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Longest window a [`FixedWindowLimiter`] will use; larger settings are clamped.
pub const MAX_WINDOW: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Limiter tuning; the defaults allow 20 requests per minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 20,
        }
    }
}

/// Outcome of a single [`RateLimiter::check`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

pub trait RateLimiter: Send + Sync + 'static {
    /// Count one request for `client_key` and report whether it may proceed.
    ///
    /// Never fails: a client without any recorded history is allowed.
    fn check(&self, client_key: &str) -> RateLimitDecision;

    /// Drop bookkeeping for windows that have already ended.  Returns the
    /// number of entries removed.
    fn sweep(&self) -> usize {
        0
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Process-local [`RateLimiter`] backed by a mutex-guarded map.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    limit: u32,
    window: TimeDelta,
    entries: Mutex<HashMap<String, WindowEntry>>,
}

impl FixedWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        if config.window > MAX_WINDOW {
            warn!(window_secs = config.window.as_secs(), max_secs = MAX_WINDOW.as_secs(), "rate-limit window clamped");
        }
        let window = TimeDelta::from_std(config.window.min(MAX_WINDOW)).unwrap_or(TimeDelta::seconds(60));
        Self {
            limit: config.max_requests,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// [`RateLimiter::check`] against an explicit clock reading.
    pub fn check_at(&self, client_key: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let mut entries = self.entries();

        match entries.get_mut(client_key) {
            Some(entry) if now <= entry.reset_at => {
                if entry.count >= self.limit {
                    return RateLimitDecision {
                        allowed: false,
                        limit: self.limit,
                        remaining: 0,
                        reset_at: entry.reset_at,
                    };
                }
                entry.count += 1;
                RateLimitDecision {
                    allowed: true,
                    limit: self.limit,
                    remaining: self.limit - entry.count,
                    reset_at: entry.reset_at,
                }
            }
            // First request ever, or the previous window has ended.
            _ => {
                let reset_at = now.checked_add_signed(self.window).unwrap_or(DateTime::<Utc>::MAX_UTC);
                entries.insert(client_key.to_owned(), WindowEntry { count: 1, reset_at });
                RateLimitDecision {
                    allowed: true,
                    limit: self.limit,
                    remaining: self.limit.saturating_sub(1),
                    reset_at,
                }
            }
        }
    }

    /// [`RateLimiter::sweep`] against an explicit clock reading.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.reset_at);
        before - entries.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.entries().len()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, WindowEntry>> {
        // The map holds plain counters, so a panic mid-update cannot leave it
        // in a state worth refusing to read.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, client_key: &str) -> RateLimitDecision {
        self.check_at(client_key, Utc::now())
    }

    fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }
}

/// Periodically purge expired entries from `limiter` every `every`.
///
/// The caller owns the returned handle and aborts it on shutdown.
pub fn spawn_sweeper(limiter: Arc<dyn RateLimiter>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately; nothing can have expired yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.sweep();
            if removed > 0 {
                debug!(removed, "purged expired rate-limit windows");
            }
        }
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────
