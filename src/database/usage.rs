// ABOUTME: Daily query quota backed by chatbot stored procedures
// ABOUTME: Check-and-increment and rollback run atomically inside Postgres
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use syntia_core::errors::{AppError, AppResult};
use syntia_core::models::{UsageSnapshot, User};
use tracing::debug;

use super::{Database, UsageLimiter};

/// Row returned by the usage procedures
#[derive(Debug, sqlx::FromRow)]
struct UsageRow {
    allowed: Option<bool>,
    queries_used: Option<i32>,
    queries_limit: Option<i32>,
    remaining: Option<i32>,
}

impl From<UsageRow> for UsageSnapshot {
    fn from(row: UsageRow) -> Self {
        Self {
            allowed: row.allowed.unwrap_or(false),
            queries_used: row.queries_used.unwrap_or(0),
            queries_limit: row.queries_limit.unwrap_or(0),
            remaining: row.remaining.unwrap_or(0),
        }
    }
}

#[async_trait]
impl UsageLimiter for Database {
    async fn check_and_increment(&self, user: &User) -> AppResult<UsageSnapshot> {
        let row: Option<UsageRow> = sqlx::query_as(
            r"
            SELECT allowed, queries_used::int4 AS queries_used,
                   queries_limit::int4 AS queries_limit, remaining::int4 AS remaining
            FROM chatbot.check_and_increment_usage($1, $2)
            ",
        )
        .bind(&user.id)
        .bind(user.role.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to check usage: {e}")))?;

        let snapshot = row.map_or(
            UsageSnapshot {
                allowed: false,
                queries_used: 0,
                queries_limit: 0,
                remaining: 0,
            },
            UsageSnapshot::from,
        );
        debug!(user_id = %user.id, allowed = snapshot.allowed, remaining = snapshot.remaining, "Usage checked");
        Ok(snapshot)
    }

    async fn rollback(&self, user_id: &str) -> AppResult<()> {
        sqlx::query("SELECT chatbot.rollback_usage($1)")
            .bind(user_id)
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to roll back usage: {e}")))?;
        Ok(())
    }

    async fn remaining(&self, user: &User) -> AppResult<UsageSnapshot> {
        let row: Option<UsageRow> = sqlx::query_as(
            r"
            SELECT NULL::bool AS allowed, queries_used::int4 AS queries_used,
                   queries_limit::int4 AS queries_limit, remaining::int4 AS remaining
            FROM chatbot.get_remaining_queries($1, $2)
            ",
        )
        .bind(&user.id)
        .bind(user.role.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to read usage: {e}")))?;

        Ok(row.map_or(
            UsageSnapshot {
                allowed: false,
                queries_used: 0,
                queries_limit: 0,
                remaining: 0,
            },
            |r| {
                let snapshot = UsageSnapshot::from(r);
                UsageSnapshot {
                    allowed: snapshot.remaining > 0,
                    ..snapshot
                }
            },
        ))
    }
}
