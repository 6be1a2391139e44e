// ABOUTME: SSE (Server-Sent Events) line-buffering parser for streamed model responses
// ABOUTME: Handles partial lines across TCP boundaries and shares the retry/backoff policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # SSE Stream Parser
//!
//! A line-buffering parser for Server-Sent Events. Solves two correctness issues:
//!
//! 1. **Multiple events per TCP chunk**: when network buffers batch several SSE events
//!    into a single `bytes_stream()` chunk, all events are emitted (not just the first).
//!
//! 2. **Partial JSON across TCP boundaries**: when a JSON payload is split across two
//!    TCP chunks, the line buffer accumulates partial data until a complete line arrives.
//!
//! The caller supplies a `parse_data` closure that converts one `data:` payload into
//! zero or more items. Framing (line buffering, prefix stripping, `[DONE]`) is handled here.

use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures_util::stream::unfold;
use futures_util::{Stream, StreamExt};
use syntia_core::errors::{AppError, AppResult};

/// A parsed SSE event from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload with the JSON string (prefix stripped)
    Data(String),
    /// The `[DONE]` termination signal
    Done,
}

/// Line-buffering SSE parser that handles partial lines across TCP chunk boundaries
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    /// Accumulated text not yet terminated by a newline
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence
    pending_bytes: Vec<u8>,
}

impl SseLineBuffer {
    /// Create a new empty line buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from a TCP chunk into the buffer, returning any complete SSE events
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending_bytes.extend_from_slice(bytes);
        let valid_up_to = match std::str::from_utf8(&self.pending_bytes) {
            Ok(_) => self.pending_bytes.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending_bytes.len(),
        };
        let complete: Vec<u8> = self.pending_bytes.drain(..valid_up_to).collect();
        self.buffer.push_str(&String::from_utf8_lossy(&complete));

        let mut events = Vec::new();

        while let Some(newline_pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }

        events
    }

    /// Flush any remaining buffered content as a final event
    pub fn flush(&mut self) -> Vec<SseEvent> {
        let tail = mem::take(&mut self.pending_bytes);
        let mut remaining = mem::take(&mut self.buffer);
        remaining.push_str(&String::from_utf8_lossy(&tail));
        parse_line(&remaining).into_iter().collect()
    }
}

fn parse_line(line: &str) -> Option<SseEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Ignore non-data SSE fields (event:, id:, retry:, comments starting with :)
    let data = trimmed.strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    Some(SseEvent::Data(data.to_owned()))
}

/// Boxed stream of parsed items
pub type ParsedStream<T> = Pin<Box<dyn Stream<Item = AppResult<T>> + Send>>;

/// Create a properly-buffered SSE stream from a raw byte stream
///
/// `parse_data` turns one `data:` payload into items; an empty vector skips the
/// payload. A transport error ends the stream after being yielded once.
pub fn create_sse_stream<T, S, F>(
    byte_stream: S,
    parse_data: F,
    provider_name: &'static str,
) -> ParsedStream<T>
where
    T: Send + 'static,
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: Fn(&str) -> Vec<AppResult<T>> + Send + 'static,
{
    let state = SseStreamState {
        byte_stream: Box::pin(byte_stream),
        parser: SseLineBuffer::new(),
        pending: VecDeque::new(),
        stream_ended: false,
        parse_data,
        provider_name,
    };

    // unfold keeps parser state across polls; each iteration drains a pending
    // item or reads the next TCP chunk
    let stream = unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }

            if state.stream_ended {
                return None;
            }

            match state.byte_stream.next().await {
                Some(Ok(bytes)) => {
                    let events = state.parser.feed(&bytes);
                    state.enqueue(events);
                }
                Some(Err(e)) => {
                    state.stream_ended = true;
                    let error = if e.is_timeout() || e.is_connect() {
                        AppError::external_unavailable(
                            state.provider_name,
                            format!("Stream read error: {e}"),
                        )
                    } else {
                        AppError::external_service(
                            state.provider_name,
                            format!("Stream read error: {e}"),
                        )
                    };
                    return Some((Err(error), state));
                }
                None => {
                    state.stream_ended = true;
                    let events = state.parser.flush();
                    state.enqueue(events);
                }
            }
        }
    });

    Box::pin(stream)
}

/// Internal state for the SSE stream unfold
struct SseStreamState<T, F> {
    byte_stream: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    parser: SseLineBuffer,
    pending: VecDeque<AppResult<T>>,
    stream_ended: bool,
    parse_data: F,
    provider_name: &'static str,
}

impl<T, F> SseStreamState<T, F>
where
    F: Fn(&str) -> Vec<AppResult<T>>,
{
    fn enqueue(&mut self, events: Vec<SseEvent>) {
        for event in events {
            if let SseEvent::Data(json_str) = event {
                self.pending.extend((self.parse_data)(&json_str));
            }
        }
    }
}

// ============================================================================
// Retry Configuration
// ============================================================================

/// Retry configuration for model calls
///
/// Retries only cover the initial HTTP request. Once bytes start flowing, the
/// stream is not retried (the client may have already consumed partial output).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries)
    pub max_retries: u32,
    /// Initial delay before first retry (milliseconds)
    pub initial_delay_ms: u64,
    /// Maximum delay cap for exponential backoff (milliseconds)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl RetryConfig {
    /// Default retry config: 3 retries, 500ms initial, 5s max
    #[must_use]
    pub const fn default_config() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }

    /// Calculate exponential backoff delay with jitter for a given attempt
    ///
    /// `delay = min(initial_ms * 2^attempt, max_ms) + jitter(0..100ms)`
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self
            .initial_delay_ms
            .saturating_mul(1_u64 << attempt.min(20));
        let capped_delay = base_delay.min(self.max_delay_ms);
        // Small jitter (0-99ms) to avoid thundering herd
        let jitter = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::from(d.subsec_millis()))
            % 100;
        Duration::from_millis(capped_delay + jitter)
    }
}

/// Check if an HTTP error status code is retryable
///
/// Retryable errors are transient conditions that may resolve on retry:
/// - 429 Too Many Requests (rate limiting)
/// - 5xx server-side failures
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

/// Check if a request error is retryable (connection/timeout errors)
#[must_use]
pub fn is_retryable_request_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_line_is_buffered() {
        let mut parser = SseLineBuffer::new();
        assert!(parser.feed(b"data: {\"a\":").is_empty());
        let events = parser.feed(b"1}\n\ndata: {\"b\":2}\n\n");
        assert_eq!(
            events,
            vec![
                SseEvent::Data("{\"a\":1}".to_owned()),
                SseEvent::Data("{\"b\":2}".to_owned())
            ]
        );
    }

    #[test]
    fn test_split_utf8_sequence() {
        let mut parser = SseLineBuffer::new();
        let payload = "data: {\"t\":\"rosácea\"}\n".as_bytes();
        // split inside the two-byte 'á'
        let split = payload.iter().position(|b| *b == 0xC3).unwrap() + 1;
        assert!(parser.feed(&payload[..split]).is_empty());
        let events = parser.feed(&payload[split..]);
        assert_eq!(events, vec![SseEvent::Data("{\"t\":\"rosácea\"}".to_owned())]);
    }

    #[test]
    fn test_done_and_flush() {
        let mut parser = SseLineBuffer::new();
        assert_eq!(parser.feed(b"data: [DONE]\n"), vec![SseEvent::Done]);
        assert!(parser.feed(b"data: {\"c\":3}").is_empty());
        assert_eq!(parser.flush(), vec![SseEvent::Data("{\"c\":3}".to_owned())]);
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig::default_config();
        assert!(config.delay_for_attempt(0) >= Duration::from_millis(500));
        assert!(config.delay_for_attempt(10) < Duration::from_millis(5100));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(500));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
    }
}
