// ABOUTME: Agent loop, history window, and tool output limits
// ABOUTME: Defaults for the tunables exposed through environment configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Model-call rounds that may request tools before the forced final answer
pub const MAX_TOOL_ROUNDS: usize = 3;

/// Raw messages replayed when no summary exists
pub const MAX_HISTORY_MESSAGES: usize = 8;

/// Raw messages replayed after the summary turn
pub const RECENT_MESSAGES_WITH_SUMMARY: usize = 4;

/// Post-turn message count that triggers the first compaction
pub const COMPACTION_THRESHOLD: usize = 8;

/// Message-count interval for re-compaction once a summary exists (0 disables)
pub const RECOMPACTION_INTERVAL: usize = 16;

/// Maximum characters of a tool result fed back to the model
pub const MAX_TOOL_RESULT_CHARS: usize = 8_000;

/// Model output ceiling per call
pub const MAX_OUTPUT_TOKENS: u32 = 1_024;

/// Sampling temperature
pub const TEMPERATURE: f32 = 0.3;

/// Keep-alive cadence while tools execute
pub const TOOL_KEEPALIVE_INTERVAL_SECS: u64 = 10;

/// Summaries of other conversations added to the system instruction
pub const PREVIOUS_SUMMARIES: i64 = 3;

/// Per-doctor rows shown by aggregate tools
pub const MAX_ROWS_PER_DOCTOR_REPORT: usize = 30;

/// Candidates returned by the fuzzy client search
pub const CLIENT_SEARCH_LIMIT: i32 = 5;

/// Collection events returned by the collections tool
pub const COLLECTIONS_LIMIT: i32 = 20;

/// Streaming response channel capacity (frames)
pub const STREAM_CHANNEL_CAPACITY: usize = 64;
