use std::time::Instant;

use axum::{
    body::{Body, HttpBody},
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Bodies larger than this are never read by the middleware.
const MAX_LOGGED_BODY: u64 = 1024;

/// Tag every request with a trace ID, run it inside an `http_request` span,
/// and log small JSON bodies in both directions.
///
/// Only bodies with a known length of at most [`MAX_LOGGED_BODY`] bytes are
/// buffered.  Everything else, including chunked uploads and event-stream
/// responses, passes through unread so later layers (the rate limiter, body
/// limits) still see it first.
pub async fn trace_middleware(req: Request, next: Next) -> Response {
    let start_time = Instant::now();

    // Reuse the caller's trace ID when it is a valid UUID.
    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let trace_value = HeaderValue::from_str(&trace_id.to_string()).ok();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!("→ request started");
        let (parts, body) = req.into_parts();
        let body = log_small_body("request", &parts.headers, body).await;
        let mut req = Request::from_parts(parts, body);
        if let Some(v) = &trace_value {
            req.headers_mut().insert(X_TRACE_ID, v.clone());
        }

        let response = next.run(req).await;
        let (parts, body) = response.into_parts();
        let body = log_small_body("response", &parts.headers, body).await;
        let mut response = Response::from_parts(parts, body);

        if let Some(v) = trace_value {
            response.headers_mut().insert(X_TRACE_ID, v);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response finished"
        );
        response
    }
    .instrument(span)
    .await
}

/// Log `body` when it is small JSON of known length, returning an equivalent
/// body.  Other bodies are returned untouched without being polled.
async fn log_small_body(direction: &str, headers: &HeaderMap, body: Body) -> Body {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    match HttpBody::size_hint(&body).exact() {
        Some(0) => body,
        Some(size) if size <= MAX_LOGGED_BODY && content_type.contains("application/json") => {
            match body.collect().await {
                Ok(collected) => {
                    let bytes = collected.to_bytes();
                    if let Ok(text) = std::str::from_utf8(&bytes) {
                        info!("{direction} body: {text}");
                    }
                    Body::from(bytes)
                }
                Err(e) => {
                    warn!(error = %e, "failed to read {direction} body");
                    Body::empty()
                }
            }
        }
        Some(size) => {
            info!("{direction} body: [skipped: type={content_type}, size={size}]");
            body
        }
        None => {
            info!("{direction} body: [streamed: type={content_type}]");
            body
        }
    }
}
