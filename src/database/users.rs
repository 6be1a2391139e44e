// ABOUTME: Internal user lookup by identity-provider account id
// ABOUTME: Reads usuarios (id_usuario, rol, auth_user_id)
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use sqlx::Row;
use syntia_core::errors::{AppError, AppResult};
use syntia_core::models::{User, UserRole};

use super::{Database, UserDirectory};

#[async_trait]
impl UserDirectory for Database {
    async fn find_by_auth_id(&self, auth_user_id: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id_usuario::text AS id_usuario, rol::text AS rol, auth_user_id::text AS auth_user_id
            FROM usuarios
            WHERE auth_user_id::text = $1
            ",
        )
        .bind(auth_user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to resolve user: {e}")))?;

        Ok(row.map(|r| {
            let role: String = r.get("rol");
            User {
                id: r.get("id_usuario"),
                role: UserRole::from_db(&role),
                auth_user_id: r.get("auth_user_id"),
            }
        }))
    }
}
