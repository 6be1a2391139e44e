// ABOUTME: Conversational agent core: transcript assembly, tool-calling loop, compaction and streaming
// ABOUTME: Exposes ChatEngine as the single entry point used by the HTTP routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Tool-calling agent loop
pub mod agent;
/// Rolling conversation summaries
pub mod compaction;
/// Turn orchestration
pub mod engine;
/// Model transcript assembly
pub mod history;
/// System instruction assembly
pub mod prompt;
/// Client stream events
pub mod stream;

pub use agent::{is_disconnect, AgentLoop, AgentOutcome, AgentSettings};
pub use compaction::{CompactionPolicy, CompactionTrigger, Compactor};
pub use engine::{ChatEngine, ChatServices, PreparedTurn, SendMessage, TurnResult};
pub use history::{build_transcript, HistoryWindow};
pub use prompt::{build_system_instruction, SystemPromptProvider};
pub use stream::{ChatEvent, EventSink};
