// ABOUTME: Persistence interfaces for conversations, usage metering, users and CRM data
// ABOUTME: Postgres implementations over a shared sqlx pool plus in-process stores for tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Database Layer
//!
//! Every collaborator the chat engine touches is a trait so the agent loop and
//! the HTTP surface can run against [`memory`] stores in tests and against
//! Postgres in production. [`Database`] owns the connection pool and
//! implements all of them.

/// Conversation and message persistence
pub mod conversations;
/// CRM read models used by the retrieval tools
pub mod crm;
/// In-process implementations of every store
pub mod memory;
/// `chatbot.config` key/value settings
pub mod system_settings;
/// Atomic daily usage metering
pub mod usage;
/// Identity-provider account to internal user mapping
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use syntia_core::errors::{AppError, AppResult};
use syntia_core::models::{
    ConversationHistory, ConversationRecord, MessageOwnership, MessageRecord, NewTurn,
    PersistedTurn, UsageSnapshot, User,
};
use tracing::info;
use uuid::Uuid;

use crate::config::DatabaseConfig;

pub use crm::{ClientScope, CrmDataSource};

// ============================================================================
// Store Interfaces
// ============================================================================

/// Conversations and their messages
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Conversation `id` if it exists and belongs to `user_id`
    async fn find_owned(&self, id: Uuid, user_id: &str) -> AppResult<Option<ConversationRecord>>;

    /// Conversation `id` regardless of owner
    async fn find(&self, id: Uuid) -> AppResult<Option<ConversationRecord>>;

    /// Start a new conversation for `user_id`
    async fn create(&self, user_id: &str) -> AppResult<ConversationRecord>;

    /// Summary plus every message of the conversation, oldest first
    async fn load_history(&self, id: Uuid) -> AppResult<ConversationHistory>;

    /// Summaries of the user's other conversations, newest first
    async fn previous_summaries(
        &self,
        user_id: &str,
        exclude: Option<Uuid>,
        limit: i64,
    ) -> AppResult<Vec<String>>;

    /// Insert the user and assistant rows of a completed turn together
    ///
    /// Either both rows are stored and the conversation is touched, or nothing is.
    async fn append_turn(&self, turn: &NewTurn) -> AppResult<PersistedTurn>;

    /// Replace the rolling summary
    async fn update_summary(&self, id: Uuid, summary: &str) -> AppResult<()>;

    /// Author and conversation owner of a message
    async fn message_ownership(&self, message_id: Uuid) -> AppResult<Option<MessageOwnership>>;

    /// Store a 1-5 rating on a message and stamp `rated_at`
    async fn rate_message(&self, message_id: Uuid, rating: i16) -> AppResult<()>;

    /// Full message rows of a conversation, oldest first
    async fn list_messages(&self, id: Uuid) -> AppResult<Vec<MessageRecord>>;
}

/// Agent configuration records
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// The agent's instruction text, if configured
    async fn system_prompt(&self) -> AppResult<Option<String>>;
}

/// Per-user daily query quota
///
/// `check_and_increment` must be a single atomic operation in the store so two
/// concurrent requests can never both consume the last remaining query.
#[async_trait]
pub trait UsageLimiter: Send + Sync {
    /// Admit and charge one query, or report that the quota is exhausted
    async fn check_and_increment(&self, user: &User) -> AppResult<UsageSnapshot>;

    /// Refund one previously charged query
    async fn rollback(&self, user_id: &str) -> AppResult<()>;

    /// Read-only view of today's usage
    async fn remaining(&self, user: &User) -> AppResult<UsageSnapshot>;
}

/// Internal users linked to identity-provider accounts
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Internal user linked to `auth_user_id`
    async fn find_by_auth_id(&self, auth_user_id: &str) -> AppResult<Option<User>>;
}

// ============================================================================
// Postgres
// ============================================================================

/// Postgres connection pool shared by every store implementation
#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect using `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot establish a connection
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(config.url.expose())
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to Postgres: {e}")))?;

        info!(
            max_connections = config.max_connections,
            "Postgres pool ready"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}
