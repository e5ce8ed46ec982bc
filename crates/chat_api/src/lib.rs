//! HTTP transport for the streaming chat pipeline.
//!
//! This crate owns request building, retry and response-status handling for
//! the streaming send endpoint. It exposes the response body as an ordered
//! chunk stream and leaves decoding and rendering to `chat_stream`. It carries
//! no authentication or CSRF handling; callers add such headers through
//! [`ChatApiConfig::extra_headers`].

pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod url;

pub use client::{ChatApiClient, ChunkStream};
pub use config::ChatApiConfig;
pub use error::ChatApiError;
pub use payload::ChatRequest;
pub use url::normalize_stream_url;
