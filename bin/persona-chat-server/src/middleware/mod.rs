//! HTTP middleware stack.
//!
//! - [`trace`]      per-request trace ID, span and body logging
//! - [`cors`]       CORS policy from configuration
//! - [`rate_limit`] per-client fixed-window limiting for the chat route

pub mod cors;
pub mod rate_limit;
pub mod trace;
