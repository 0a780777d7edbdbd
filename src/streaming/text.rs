//! Chunked plain-text stream consumer
//!
//! Bytes are decoded as they arrive and appended to a [`StreamBuffer`]; the
//! rendering layer watches the buffer, so text shows up as it is produced.
//! Multi-byte characters split across chunks are carried to the next chunk.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use tokio::sync::watch;

use crate::error::{ClientError, Result};

/// Append-only text accumulator observed through a watch channel
#[derive(Debug, Clone)]
pub struct StreamBuffer {
    tx: std::sync::Arc<watch::Sender<String>>,
}

impl StreamBuffer {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(String::new());
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn append(&self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.tx.send_modify(|text| text.push_str(chunk));
    }

    pub fn text(&self) -> String {
        self.tx.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.tx.send_replace(String::new());
    }
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// UTF-8 decoder that tolerates characters split across chunk boundaries
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + chunk` as forms whole characters.
    /// Invalid sequences become U+FFFD.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    // valid_up_to guarantees this prefix is well-formed
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[bad..];
                        }
                        // Truncated character; wait for more bytes
                        None => {
                            rest = tail;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = rest.to_vec();
        out
    }

    /// Flush whatever is left at end of stream
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }
}

/// Drain a byte stream into `buffer`. Returns the number of bytes read.
/// On a read error the text received so far stays in the buffer.
pub async fn consume_text<S, E>(mut stream: S, buffer: &StreamBuffer) -> Result<usize>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Display,
{
    let mut decoder = Utf8Decoder::new();
    let mut total = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ClientError::Stream(e.to_string()))?;
        total += chunk.len();
        crate::hot_trace!("Text stream chunk: {} bytes", chunk.len());
        buffer.append(&decoder.decode(&chunk));
    }
    buffer.append(&decoder.finish());

    log::debug!("Text stream complete: {} bytes", total);
    Ok(total)
}
