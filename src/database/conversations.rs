// ABOUTME: Postgres conversation store over chatbot.conversations and chatbot.messages
// ABOUTME: Appends user/assistant pairs in one transaction and serves history, ratings and summaries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::Row;
use syntia_core::errors::{AppError, AppResult};
use syntia_core::models::{
    ConversationHistory, ConversationRecord, HistoryMessage, MessageOwnership, MessageRecord,
    MessageRole, NewTurn, PersistedTurn,
};
use uuid::Uuid;

use super::{ConversationStore, Database};

fn parse_role(raw: &str) -> AppResult<MessageRole> {
    raw.parse().map_err(AppError::database)
}

fn row_to_conversation(row: &PgRow) -> ConversationRecord {
    ConversationRecord {
        id: row.get("id"),
        user_id: row.get("id_usuario"),
        summary: row.get("summary"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_message(row: &PgRow) -> AppResult<MessageRecord> {
    let role: String = row.get("role");
    Ok(MessageRecord {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        role: parse_role(&role)?,
        content: row.get("content"),
        context_client_id: row.get("context_cliente_id"),
        tokens_input: row.get("tokens_input"),
        tokens_output: row.get("tokens_output"),
        latency_ms: row.get("latency_ms"),
        rating: row.get("rating"),
        rated_at: row.get("rated_at"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl ConversationStore for Database {
    async fn find_owned(&self, id: Uuid, user_id: &str) -> AppResult<Option<ConversationRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, id_usuario, summary, created_at, updated_at
            FROM chatbot.conversations
            WHERE id = $1 AND id_usuario = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;

        Ok(row.as_ref().map(row_to_conversation))
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<ConversationRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, id_usuario, summary, created_at, updated_at
            FROM chatbot.conversations
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;

        Ok(row.as_ref().map(row_to_conversation))
    }

    async fn create(&self, user_id: &str) -> AppResult<ConversationRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r"
            INSERT INTO chatbot.conversations (id, id_usuario, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversation: {e}")))?;

        Ok(ConversationRecord {
            id,
            user_id: user_id.to_owned(),
            summary: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn load_history(&self, id: Uuid) -> AppResult<ConversationHistory> {
        let summary: Option<String> = sqlx::query_scalar(
            "SELECT summary FROM chatbot.conversations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to load summary: {e}")))?
        .flatten();

        let rows = sqlx::query(
            r"
            SELECT role, content
            FROM chatbot.messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to load history: {e}")))?;

        let messages = rows
            .iter()
            .map(|r| {
                let role: String = r.get("role");
                Ok(HistoryMessage {
                    role: parse_role(&role)?,
                    content: r.get("content"),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(ConversationHistory { summary, messages })
    }

    async fn previous_summaries(
        &self,
        user_id: &str,
        exclude: Option<Uuid>,
        limit: i64,
    ) -> AppResult<Vec<String>> {
        sqlx::query_scalar(
            r"
            SELECT summary
            FROM chatbot.conversations
            WHERE id_usuario = $1
              AND summary IS NOT NULL
              AND ($2::uuid IS NULL OR id <> $2)
            ORDER BY created_at DESC
            LIMIT $3
            ",
        )
        .bind(user_id)
        .bind(exclude)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to load previous summaries: {e}")))
    }

    async fn append_turn(&self, turn: &NewTurn) -> AppResult<PersistedTurn> {
        let user_message_id = Uuid::new_v4();
        let assistant_message_id = Uuid::new_v4();
        let now = Utc::now();
        // The assistant row is one microsecond later so ordering by created_at is stable
        let answered_at = now + chrono::Duration::microseconds(1);

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO chatbot.messages (id, conversation_id, role, content, context_cliente_id, created_at)
            VALUES ($1, $2, 'user', $3, $4, $5)
            ",
        )
        .bind(user_message_id)
        .bind(turn.conversation_id)
        .bind(&turn.user_message)
        .bind(turn.context_client_id.as_deref())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to insert user message: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO chatbot.messages
                (id, conversation_id, role, content, context_cliente_id,
                 tokens_input, tokens_output, latency_ms, created_at)
            VALUES ($1, $2, 'assistant', $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(assistant_message_id)
        .bind(turn.conversation_id)
        .bind(&turn.assistant_message)
        .bind(turn.context_client_id.as_deref())
        .bind(turn.tokens_input)
        .bind(turn.tokens_output)
        .bind(turn.latency_ms)
        .bind(answered_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to insert assistant message: {e}")))?;

        sqlx::query("UPDATE chatbot.conversations SET updated_at = $1 WHERE id = $2")
            .bind(answered_at)
            .bind(turn.conversation_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to touch conversation: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit turn: {e}")))?;

        Ok(PersistedTurn {
            user_message_id,
            assistant_message_id,
        })
    }

    async fn update_summary(&self, id: Uuid, summary: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE chatbot.conversations SET summary = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(summary)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to update summary: {e}")))?;
        Ok(())
    }

    async fn message_ownership(&self, message_id: Uuid) -> AppResult<Option<MessageOwnership>> {
        let row = sqlx::query(
            r"
            SELECT m.id, m.role, c.id_usuario
            FROM chatbot.messages m
            JOIN chatbot.conversations c ON c.id = m.conversation_id
            WHERE m.id = $1
            ",
        )
        .bind(message_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get message: {e}")))?;

        row.map(|r| {
            let role: String = r.get("role");
            Ok(MessageOwnership {
                id: r.get("id"),
                role: parse_role(&role)?,
                owner_id: r.get("id_usuario"),
            })
        })
        .transpose()
    }

    async fn rate_message(&self, message_id: Uuid, rating: i16) -> AppResult<()> {
        sqlx::query("UPDATE chatbot.messages SET rating = $1, rated_at = $2 WHERE id = $3")
            .bind(rating)
            .bind(Utc::now())
            .bind(message_id)
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to rate message: {e}")))?;
        Ok(())
    }

    async fn list_messages(&self, id: Uuid) -> AppResult<Vec<MessageRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, conversation_id, role, content, context_cliente_id, tokens_input,
                   tokens_output, latency_ms, rating, rated_at, created_at
            FROM chatbot.messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list messages: {e}")))?;

        rows.iter().map(row_to_message).collect()
    }
}
