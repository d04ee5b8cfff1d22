//! Transport layer (HTTP via axum).
//!
//! Adapts inbound HTTP requests to `RequestFacts` and governance errors back
//! to HTTP responses.

pub mod http;
