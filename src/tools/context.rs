// ABOUTME: Defines ToolExecutionContext which gives tools the caller identity and data sources
// ABOUTME: Centralizes the role-based client access check every doctor-level tool relies on
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::sync::Arc;

use syntia_core::constants::messages::CLIENT_ACCESS_DENIED;
use syntia_core::errors::{AppError, AppResult};
use syntia_core::models::User;

use crate::database::{ClientScope, CrmDataSource};
use crate::llm::TextEmbedder;

/// Everything a tool needs to run for one caller
#[derive(Clone)]
pub struct ToolExecutionContext {
    /// Authenticated caller
    pub user: User,
    /// Clients the caller may see
    pub scope: ClientScope,
    /// CRM queries
    pub crm: Arc<dyn CrmDataSource>,
    /// Query embedding for semantic tools
    pub embedder: Arc<dyn TextEmbedder>,
}

impl ToolExecutionContext {
    /// Context for `user` with scope derived from its role
    #[must_use]
    pub fn new(user: User, crm: Arc<dyn CrmDataSource>, embedder: Arc<dyn TextEmbedder>) -> Self {
        let scope = ClientScope::for_user(&user);
        Self {
            user,
            scope,
            crm,
            embedder,
        }
    }

    /// Fail unless the caller may read data of `client_id`
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` when the client is not assigned to a non-privileged
    /// caller, or a database error if the check itself fails
    pub async fn ensure_client_access(&self, client_id: &str) -> AppResult<()> {
        let Some(user_id) = self.scope.user_id() else {
            return Ok(());
        };
        if self.crm.client_belongs_to(client_id, user_id).await? {
            Ok(())
        } else {
            Err(AppError::permission_denied(CLIENT_ACCESS_DENIED).with_resource_id(client_id))
        }
    }
}

impl fmt::Debug for ToolExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolExecutionContext")
            .field("user_id", &self.user.id)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
