//! Line-oriented terminal chat client.
//!
//! Reads one message per line from stdin, streams the response as plain text
//! and keeps the conversation id assigned by the server for follow-up sends.
//!
//! Environment:
//! - `CHAT_BASE_URL` overrides the server base URL.
//! - `CHAT_MODEL` selects a model for every send.
//! - `CHAT_CONVERSATION_ID` resumes an existing conversation.
//! - `CHAT_STREAM_LOG` / `CHAT_STREAM_LOG_JSON` control diagnostics on stderr.

pub mod app;
pub mod commands;
pub mod terminal;
