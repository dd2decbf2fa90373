//! Incremental Server-Sent-Events decoding for streamed generation
//!
//! The service sends one `data: <json>` line per event. Bytes are buffered
//! until a full line is available, so frames and multi-byte characters may be
//! split across reads arbitrarily.

use crate::error::{RagPipeError, Result};
use crate::metrics::GenerationMetrics;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::pin::Pin;

/// Prefix marking an SSE data line
pub const DATA_PREFIX: &str = "data: ";

/// Boxed stream of decoded events, as returned by streaming clients
pub type EventStream = BoxStream<'static, Result<StreamEvent>>;

/// One decoded generation event
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental answer text
    Content(String),
    /// Throughput sample in tokens per second
    Throughput(f64),
    /// Terminal event carrying the final generation metrics
    Done(GenerationMetrics),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

/// Loose shape of a data payload; classification happens in [`parse_payload`]
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tokens_per_sec: Option<f64>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    metrics: Option<GenerationMetrics>,
}

/// Byte buffer that yields complete `\n`-terminated lines
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push_chunk(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    fn next_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        line.pop();
        Some(decode_line(line))
    }

    fn take_remaining(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        Some(decode_line(std::mem::take(&mut self.pending)))
    }
}

fn decode_line(mut line: Vec<u8>) -> String {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    match String::from_utf8(line) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Parse one SSE line. Non-data lines and malformed payloads yield nothing.
pub fn parse_line(line: &str) -> Vec<StreamEvent> {
    match line.strip_prefix(DATA_PREFIX) {
        Some(payload) => parse_payload(payload),
        None => Vec::new(),
    }
}

/// Classify a JSON payload into zero or more events
pub fn parse_payload(payload: &str) -> Vec<StreamEvent> {
    let frame: RawFrame = match serde_json::from_str(payload) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!("Dropping malformed SSE payload: {}", e);
            return Vec::new();
        }
    };

    if frame.done {
        if let Some(metrics) = frame.metrics {
            return vec![StreamEvent::Done(metrics)];
        }
    }

    let mut events = Vec::with_capacity(2);
    if let Some(content) = frame.content {
        events.push(StreamEvent::Content(content));
    }
    if let Some(rate) = frame.tokens_per_sec {
        events.push(StreamEvent::Throughput(rate));
    }
    if events.is_empty() {
        tracing::debug!("Ignoring SSE payload with no known event: {}", payload);
    }
    events
}

/// Push-style decoder: feed byte chunks, collect events
#[derive(Debug, Default)]
pub struct SseDecoder {
    lines: LineBuffer,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the events completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.lines.push_chunk(chunk);
        let mut events = Vec::new();
        while let Some(line) = self.lines.next_line() {
            events.extend(parse_line(&line));
        }
        events
    }

    /// Flush an unterminated final line at end of data
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        self.lines
            .take_remaining()
            .map(|line| parse_line(&line))
            .unwrap_or_default()
    }
}

struct DecodeState<S> {
    source: Pin<Box<S>>,
    decoder: SseDecoder,
    ready: VecDeque<StreamEvent>,
    finished: bool,
}

/// Turn a byte-chunk stream into a lazy stream of events.
///
/// A transport error is yielded once and ends the stream. Reaching the end of
/// the source without a [`StreamEvent::Done`] is not reported here; callers
/// check for the terminal event themselves.
pub fn decode_events<S, B, E>(source: S) -> EventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<RagPipeError> + Send,
{
    let state = DecodeState {
        source: Box::pin(source),
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.ready.pop_front() {
                return Some((Ok(event), state));
            }
            if state.finished {
                return None;
            }
            match state.source.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(chunk.as_ref());
                    state.ready.extend(events);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    state.finished = true;
                    let events = state.decoder.finish();
                    state.ready.extend(events);
                }
            }
        }
    })
    .boxed()
}
