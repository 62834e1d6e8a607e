//! Per-client rate limiting, applied before the request body is touched.
//!
//! On success the [`RateLimitDecision`] is stored in the request extensions so
//! the handler can report the remaining quota.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use persona_chat_core::RateLimitDecision;
use tracing::warn;

use crate::error::ServerError;
use crate::state::AppState;

/// Bucket shared by every client that sends neither proxy header.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the rate-limit key for a request.
///
/// Uses the first address in `X-Forwarded-For`, then `X-Real-IP`, then
/// [`UNKNOWN_CLIENT`].
pub fn client_key(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header("x-real-ip"))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_owned()
}

pub async fn enforce_rate_limit(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let key = client_key(req.headers());
    let decision: RateLimitDecision = state.rate_limiter.check(&key);

    if !decision.allowed {
        warn!(client = %key, limit = decision.limit, reset_at = %decision.reset_at, "rate limit exceeded");
        return ServerError::RateLimited(decision).into_response();
    }

    req.extensions_mut().insert(decision);
    next.run(req).await
}

#[cfg(test)]
mod test {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, v.parse().unwrap());
        }
        map
    }

    #[test]
    fn forwarded_for_wins_and_uses_first_hop() {
        let h = headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1"), ("x-real-ip", "10.9.9.9")]);
        assert_eq!(client_key(&h), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_real_ip() {
        assert_eq!(client_key(&headers(&[("x-real-ip", "198.51.100.2")])), "198.51.100.2");
        assert_eq!(
            client_key(&headers(&[("x-forwarded-for", " "), ("x-real-ip", "198.51.100.2")])),
            "198.51.100.2"
        );
    }

    #[test]
    fn header_less_clients_share_one_bucket() {
        assert_eq!(client_key(&HeaderMap::new()), UNKNOWN_CLIENT);
    }
}
