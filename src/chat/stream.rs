// ABOUTME: Client-facing stream events of a chat turn and the sink the agent writes them to
// ABOUTME: A closed sink means the client went away; writers stop instead of failing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Chat Stream Events
//!
//! Wire shapes (each sent as one SSE `data:` line):
//! - `{ "t": "...", "d": false }` text delta, or keep-alive when `t` is empty
//! - `{ "d": true, "cid", "mid", "r", "l" }` terminal success
//! - `{ "d": true, "e", "r", "l" }` terminal error

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// One event sent to a streaming client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatEvent {
    /// Incremental answer text or keep-alive
    Delta {
        /// Text, empty for keep-alive
        t: String,
        /// Always false
        d: bool,
    },
    /// The turn completed and was stored
    Done {
        /// Always true
        d: bool,
        /// Conversation id
        cid: Uuid,
        /// Assistant message id, absent if storing failed
        mid: Option<Uuid>,
        /// Remaining queries today
        r: i32,
        /// Daily limit
        l: i32,
    },
    /// The turn failed
    Failed {
        /// Always true
        d: bool,
        /// Error code or human-readable message
        e: String,
        /// Remaining queries today
        r: i32,
        /// Daily limit
        l: i32,
    },
}

impl ChatEvent {
    /// Answer text delta
    pub fn text(text: impl Into<String>) -> Self {
        Self::Delta {
            t: text.into(),
            d: false,
        }
    }

    /// Empty delta that keeps the connection busy
    #[must_use]
    pub fn keep_alive() -> Self {
        Self::text("")
    }

    /// Terminal success
    #[must_use]
    pub const fn done(conversation_id: Uuid, message_id: Option<Uuid>, remaining: i32, limit: i32) -> Self {
        Self::Done {
            d: true,
            cid: conversation_id,
            mid: message_id,
            r: remaining,
            l: limit,
        }
    }

    /// Terminal error
    pub fn failed(error: impl Into<String>, remaining: i32, limit: i32) -> Self {
        Self::Failed {
            d: true,
            e: error.into(),
            r: remaining,
            l: limit,
        }
    }

    /// Whether this event ends the stream
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Delta { .. })
    }

    /// JSON payload for the SSE `data:` field
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"d":true,"e":"serialization"}"#.to_owned())
    }
}

/// Where the agent writes client events
///
/// A buffered sink drops every event but still reports when the waiting
/// client has gone away. A disabled sink has no client at all.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::Sender<ChatEvent>>,
    streaming: bool,
}

impl EventSink {
    /// Sink feeding a streaming response
    #[must_use]
    pub const fn channel(tx: mpsc::Sender<ChatEvent>) -> Self {
        Self {
            tx: Some(tx),
            streaming: true,
        }
    }

    /// Sink for a buffered response; the client is gone once the receiver drops
    #[must_use]
    pub const fn buffered(tx: mpsc::Sender<ChatEvent>) -> Self {
        Self {
            tx: Some(tx),
            streaming: false,
        }
    }

    /// Sink with no client behind it
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            tx: None,
            streaming: false,
        }
    }

    /// Whether events reach a client
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Deliver `event`; `false` once the client has gone away
    pub async fn send(&self, event: ChatEvent) -> bool {
        match &self.tx {
            Some(tx) if self.streaming => tx.send(event).await.is_ok(),
            Some(tx) => !tx.is_closed(),
            None => true,
        }
    }

    /// Send a text delta
    pub async fn text(&self, text: &str) -> bool {
        if text.is_empty() {
            return !self.is_closed();
        }
        self.send(ChatEvent::text(text)).await
    }

    /// Send a keep-alive
    pub async fn keep_alive(&self) -> bool {
        self.send(ChatEvent::keep_alive()).await
    }

    /// Whether the client has gone away
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().is_some_and(mpsc::Sender::is_closed)
    }

    /// Resolve when the client goes away; never resolves for a disabled sink
    pub async fn closed(&self) {
        match &self.tx {
            Some(tx) => tx.closed().await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shapes() {
        assert_eq!(ChatEvent::keep_alive().to_json(), r#"{"t":"","d":false}"#);
        assert_eq!(
            ChatEvent::failed("RESPONSE_TOO_LONG", 3, 20).to_json(),
            r#"{"d":true,"e":"RESPONSE_TOO_LONG","r":3,"l":20}"#
        );
        let cid = Uuid::nil();
        let done = serde_json::to_value(ChatEvent::done(cid, None, 4, 20)).unwrap();
        assert_eq!(done["d"], true);
        assert_eq!(done["mid"], serde_json::Value::Null);
        assert_eq!(done["r"], 4);
    }

    #[tokio::test]
    async fn test_sink_reports_disconnect() {
        let (tx, rx) = mpsc::channel(4);
        let sink = EventSink::channel(tx);
        assert!(sink.text("hola").await);
        drop(rx);
        assert!(sink.is_closed());
        assert!(!sink.keep_alive().await);
        assert!(EventSink::disabled().text("x").await);
    }

    #[tokio::test]
    async fn test_buffered_sink_only_tracks_liveness() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = EventSink::buffered(tx);
        assert!(!sink.is_streaming());
        assert!(sink.text("hola").await);
        assert!(rx.try_recv().is_err());
        drop(rx);
        assert!(sink.is_closed());
        assert!(!sink.keep_alive().await);
    }
}
