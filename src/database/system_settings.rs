// ABOUTME: Key/value agent settings stored in chatbot.config
// ABOUTME: Serves the system prompt record consumed by the prompt cache
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use syntia_core::errors::{AppError, AppResult};

use super::{ConfigStore, Database};

/// Key of the agent instruction record
pub const SYSTEM_PROMPT_KEY: &str = "system_prompt";

#[async_trait]
impl ConfigStore for Database {
    async fn system_prompt(&self) -> AppResult<Option<String>> {
        sqlx::query_scalar("SELECT value FROM chatbot.config WHERE key = $1")
            .bind(SYSTEM_PROMPT_KEY)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to load system prompt: {e}")))
    }
}
