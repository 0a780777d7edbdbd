//! Server-sent events decoder
//!
//! Incremental and line-based: the partial trailing line is carried between
//! chunks, and a block is dispatched when a blank line ends it. Only line
//! boundaries are significant, so a payload containing `"data:"` or a chunk
//! boundary anywhere inside a block is handled the same as any other text.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use std::ops::ControlFlow;

use super::text::Utf8Decoder;
use crate::error::{ClientError, Result};

/// Event name used when a block has no `event:` line
const DEFAULT_EVENT: &str = "message";

/// One dispatched event block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    /// All `data:` lines of the block joined with `\n`
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    utf8: Utf8Decoder,
    /// Incomplete trailing line from the previous chunk
    line: String,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every block completed by them
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let text = self.utf8.decode(chunk);
        self.push_str(&text)
    }

    pub fn push_str(&mut self, text: &str) -> Vec<SseEvent> {
        let mut events = Vec::new();
        let mut rest = text;

        while let Some(pos) = rest.find('\n') {
            self.line.push_str(&rest[..pos]);
            rest = &rest[pos + 1..];

            let line = std::mem::take(&mut self.line);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        self.line.push_str(rest);
        events
    }

    /// End of stream: a final block without its blank line still counts
    pub fn finish(&mut self) -> Option<SseEvent> {
        let tail = self.utf8.finish();
        self.line.push_str(&tail);
        let line = std::mem::take(&mut self.line);
        let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
        if !line.is_empty() {
            // A trailing line can only extend the block, never dispatch it
            let _ = self.process_line(&line);
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" | "retry" => {}
            _ => {
                // Unprefixed continuation of a multi-line payload
                if !self.data.is_empty() {
                    self.data.push(line.to_string());
                } else {
                    crate::hot_trace!("Ignoring SSE line: {}", line);
                }
            }
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if event.is_none() && self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
        })
    }
}

/// Drain a byte stream through an [`SseDecoder`], handing each event to
/// `on_event` as soon as its block completes. The handler can stop reading
/// early by returning `ControlFlow::Break`. Returns the number of events
/// handled.
pub async fn consume_sse<S, E, F>(mut stream: S, mut on_event: F) -> Result<usize>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Display,
    F: FnMut(SseEvent) -> ControlFlow<()>,
{
    let mut decoder = SseDecoder::new();
    let mut count = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ClientError::Stream(e.to_string()))?;
        for event in decoder.push(&chunk) {
            crate::hot_trace!("SSE event '{}' ({} bytes)", event.event, event.data.len());
            count += 1;
            if on_event(event).is_break() {
                return Ok(count);
            }
        }
    }
    if let Some(event) = decoder.finish() {
        count += 1;
        let _ = on_event(event);
    }
    Ok(count)
}
