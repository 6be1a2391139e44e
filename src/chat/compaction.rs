// ABOUTME: Background summarization of long conversations into a rolling summary
// ABOUTME: Runs after the response is produced; failures are logged and never surface
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use syntia_core::constants::messages::{
    COMPACTION_PROMPT, SUMMARY_ACK, SUMMARY_TURN_PREFIX, SUMMARY_TURN_SUFFIX,
};
use syntia_core::errors::AppResult;
use syntia_core::models::{HistoryMessage, MessageRole};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::history::merge_turns;
use crate::database::ConversationStore;
use crate::llm::{ContentRole, GenerateRequest, GenerationConfig, GenerativeBackend};

/// Why a conversation is being summarized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionTrigger {
    /// First summary of the conversation
    Initial,
    /// The conversation grew past another interval since the last summary
    Refresh,
}

/// When to compact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPolicy {
    /// Message count that triggers the first summary
    pub threshold: usize,
    /// Re-summarize every this many messages; 0 disables
    pub recompaction_interval: usize,
}

impl CompactionPolicy {
    /// Decide whether the turn that moved the count from `before` to `after` compacts
    #[must_use]
    pub const fn trigger(self, before: usize, after: usize, has_summary: bool) -> Option<CompactionTrigger> {
        if !has_summary {
            if after >= self.threshold {
                return Some(CompactionTrigger::Initial);
            }
            return None;
        }
        let interval = self.recompaction_interval;
        if interval > 0 && after / interval > before / interval {
            return Some(CompactionTrigger::Refresh);
        }
        None
    }
}

/// Summarizes conversations through the generative backend
pub struct Compactor {
    backend: Arc<dyn GenerativeBackend>,
    store: Arc<dyn ConversationStore>,
    generation: GenerationConfig,
    policy: CompactionPolicy,
}

impl Compactor {
    /// Create a compactor
    #[must_use]
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        store: Arc<dyn ConversationStore>,
        generation: GenerationConfig,
        policy: CompactionPolicy,
    ) -> Self {
        Self {
            backend,
            store,
            generation,
            policy,
        }
    }

    /// Active policy
    #[must_use]
    pub const fn policy(&self) -> CompactionPolicy {
        self.policy
    }

    /// Summarize `messages` and store the result
    ///
    /// # Errors
    ///
    /// Returns the backend or store error; an empty summary is not stored
    #[instrument(skip(self, previous_summary, messages), fields(messages = messages.len()))]
    pub async fn compact(
        &self,
        conversation_id: Uuid,
        previous_summary: Option<&str>,
        messages: &[HistoryMessage],
    ) -> AppResult<Option<String>> {
        let mut turns: Vec<(ContentRole, String)> = Vec::with_capacity(messages.len() + 2);
        if let Some(summary) = previous_summary {
            turns.push((
                ContentRole::User,
                format!("{SUMMARY_TURN_PREFIX}{summary}{SUMMARY_TURN_SUFFIX}"),
            ));
            turns.push((ContentRole::Model, SUMMARY_ACK.to_owned()));
        }
        turns.extend(messages.iter().map(|m| {
            let role = match m.role {
                MessageRole::User => ContentRole::User,
                MessageRole::Assistant => ContentRole::Model,
            };
            (role, m.content.clone())
        }));

        let request = GenerateRequest::new(COMPACTION_PROMPT, merge_turns(turns), self.generation);
        let response = self.backend.generate(&request).await?;
        let summary = response.text().trim().to_owned();

        if summary.is_empty() {
            warn!(conversation_id = %conversation_id, "Compaction produced no text");
            return Ok(None);
        }

        self.store.update_summary(conversation_id, &summary).await?;
        info!(conversation_id = %conversation_id, chars = summary.len(), "Conversation compacted");
        Ok(Some(summary))
    }

    /// Run [`Self::compact`] in the background, logging any failure
    pub fn spawn(
        self: &Arc<Self>,
        conversation_id: Uuid,
        previous_summary: Option<String>,
        messages: Vec<HistoryMessage>,
    ) -> JoinHandle<()> {
        let compactor = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = compactor
                .compact(conversation_id, previous_summary.as_deref(), &messages)
                .await
            {
                warn!(conversation_id = %conversation_id, error = %e, "Compaction failed");
            }
        })
    }
}

impl std::fmt::Debug for Compactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compactor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
