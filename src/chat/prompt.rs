// ABOUTME: System instruction assembly from the cached agent prompt, caller identity and past summaries
// ABOUTME: The prompt row is cached process-wide and refreshed lazily on expiry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use syntia_core::constants::messages::PREVIOUS_SUMMARIES_HEADER;
use syntia_core::errors::{AppError, AppResult};
use syntia_core::models::User;
use tracing::debug;

use crate::cache::ExpiringCache;
use crate::database::ConfigStore;

/// Cached access to the agent's base instruction text
#[derive(Clone)]
pub struct SystemPromptProvider {
    store: Arc<dyn ConfigStore>,
    cache: Arc<ExpiringCache<String>>,
}

impl SystemPromptProvider {
    /// Create a provider reading from `store` through `cache`
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>, cache: Arc<ExpiringCache<String>>) -> Self {
        Self { store, cache }
    }

    /// Base prompt, from cache when fresh
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no prompt row exists, or the store error
    pub async fn load(&self) -> AppResult<String> {
        self.cache
            .get_or_try_refresh(|| async {
                debug!("Loading system prompt from datastore");
                self.store
                    .system_prompt()
                    .await?
                    .filter(|prompt| !prompt.trim().is_empty())
                    .ok_or_else(|| AppError::config("System prompt is not configured"))
            })
            .await
    }
}

impl std::fmt::Debug for SystemPromptProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemPromptProvider")
            .field("ttl", &self.cache.ttl())
            .finish_non_exhaustive()
    }
}

/// Full system instruction for one turn
#[must_use]
pub fn build_system_instruction(base: &str, user: &User, previous_summaries: &[String]) -> String {
    let mut instruction = format!("{base}\nUSUARIO: id_usuario={}, rol={}", user.id, user.role);

    if !previous_summaries.is_empty() {
        instruction.push_str("\n\n");
        instruction.push_str(PREVIOUS_SUMMARIES_HEADER);
        for summary in previous_summaries {
            instruction.push_str("\n- ");
            instruction.push_str(summary);
        }
    }

    instruction
}
