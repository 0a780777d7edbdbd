//! Incremental consumption of streamed response bodies
//!
//! - text.rs: chunked plain-text bodies (minutes drafts) into a StreamBuffer
//! - sse.rs: line-based server-sent-events decoder
//! - agent.rs: typed agent / knowledge-base events decoded from SSE payloads

pub mod text;
pub mod sse;
pub mod agent;

pub use text::{consume_text, StreamBuffer, Utf8Decoder};
pub use sse::{consume_sse, SseDecoder, SseEvent};
pub use agent::AgentEvent;
