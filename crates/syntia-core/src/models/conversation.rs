// ABOUTME: Chat conversation and message record types for database persistence
// ABOUTME: DTOs for user-owned conversations, rated messages, and atomic turn inserts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author of a stored message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Sent by the CRM user
    User,
    /// Produced by the agent
    Assistant,
}

impl MessageRole {
    /// Database string for this role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown message role: {other}")),
        }
    }
}

/// Database representation of a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Unique conversation ID
    pub id: Uuid,
    /// Internal user ID who owns the conversation
    pub user_id: String,
    /// Rolling summary produced by compaction
    pub summary: Option<String>,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
    /// When the conversation was last touched by a completed turn
    pub updated_at: DateTime<Utc>,
}

/// Database representation of a chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique message ID
    pub id: Uuid,
    /// Conversation ID this message belongs to
    pub conversation_id: Uuid,
    /// Author of the message
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// Client (doctor) the message concerns, if any
    pub context_client_id: Option<String>,
    /// Prompt tokens reported by the model (assistant rows only)
    pub tokens_input: Option<i32>,
    /// Output tokens reported by the model (assistant rows only)
    pub tokens_output: Option<i32>,
    /// End-to-end latency of the turn (assistant rows only)
    pub latency_ms: Option<i64>,
    /// 1-5 rating given by the user
    pub rating: Option<i16>,
    /// When the rating was given
    pub rated_at: Option<DateTime<Utc>>,
    /// When the message was created
    pub created_at: DateTime<Utc>,
}

/// Role/content pair used to rebuild prompt history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Author of the message
    pub role: MessageRole,
    /// Message content
    pub content: String,
}

impl HistoryMessage {
    /// Build a user-authored history entry
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Build an assistant-authored history entry
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Stored summary plus the chronological message list of one conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    /// Summary produced by the last compaction, if any
    pub summary: Option<String>,
    /// Messages in chronological order
    pub messages: Vec<HistoryMessage>,
}

/// A completed user/assistant exchange ready to be persisted atomically
#[derive(Debug, Clone)]
pub struct NewTurn {
    /// Conversation receiving the turn
    pub conversation_id: Uuid,
    /// Text the user sent
    pub user_message: String,
    /// Text the agent answered
    pub assistant_message: String,
    /// Client (doctor) context attached to both rows
    pub context_client_id: Option<String>,
    /// Prompt tokens of the last model call
    pub tokens_input: i32,
    /// Output tokens of the last model call
    pub tokens_output: i32,
    /// End-to-end latency of the turn
    pub latency_ms: i64,
}

/// IDs of the two rows written for a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedTurn {
    /// ID of the user row
    pub user_message_id: Uuid,
    /// ID of the assistant row
    pub assistant_message_id: Uuid,
}

/// Minimal projection used to authorize a rating
#[derive(Debug, Clone)]
pub struct MessageOwnership {
    /// Message ID
    pub id: Uuid,
    /// Author of the message
    pub role: MessageRole,
    /// Owner of the conversation that holds the message
    pub owner_id: String,
}
