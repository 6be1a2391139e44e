// ABOUTME: Domain model module root re-exporting users, conversations, and usage counters
// ABOUTME: Shared by the datastore adapters, the agent loop, and the HTTP surface
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Domain Models
//!
//! Plain data types that cross layer boundaries. None of these types perform
//! I/O; persistence lives in the service crate's `database` module.

mod conversation;
mod usage;
mod user;

pub use conversation::{
    ConversationHistory, ConversationRecord, HistoryMessage, MessageOwnership, MessageRecord,
    MessageRole, NewTurn, PersistedTurn,
};
pub use usage::UsageSnapshot;
pub use user::{User, UserRole};
