// ABOUTME: Bearer authentication against the Supabase identity provider
// ABOUTME: Resolves a provider account to the internal CRM user and its role
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Authentication
//!
//! A request is authenticated in two steps: the bearer credential is validated
//! by the identity provider, which returns a stable account id, and the
//! account id is then resolved to an internal [`User`]. A valid credential
//! without a linked internal user is rejected with 403.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use syntia_core::constants::messages::http::{UNAUTHORIZED, USER_NOT_FOUND};
use syntia_core::errors::{AppError, AppResult};
use syntia_core::models::User;
use tracing::{debug, instrument, warn};

use crate::config::SecretString;
use crate::database::UserDirectory;
use crate::logging::AppLogger;

const SERVICE_NAME: &str = "Supabase Auth";

/// Extract the token from an `Authorization: Bearer <token>` header value
///
/// # Errors
///
/// Returns `AUTH_REQUIRED` if the header is missing, not a bearer header, or empty
pub fn extract_bearer_token(header: Option<&str>) -> AppResult<&str> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(AppError::auth_required)
}

/// Exchanges a bearer credential for a provider account id
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Validate `token` and return the account id it belongs to
    async fn account_id(&self, token: &str) -> AppResult<String>;
}

#[derive(Deserialize)]
struct AccountResponse {
    id: String,
}

/// Supabase `GET /auth/v1/user` client
pub struct SupabaseIdentityProvider {
    client: Client,
    url: String,
    service_role_key: SecretString,
}

impl SupabaseIdentityProvider {
    /// Create a provider for the project at `base_url`
    pub fn new(client: Client, base_url: &str, service_role_key: SecretString) -> Self {
        Self {
            client,
            url: format!("{}/auth/v1/user", base_url.trim_end_matches('/')),
            service_role_key,
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    #[instrument(skip_all)]
    async fn account_id(&self, token: &str) -> AppResult<String> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(token)
            .header("apikey", self.service_role_key.expose())
            .send()
            .await
            .map_err(|e| AppError::external_unavailable(SERVICE_NAME, e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let account: AccountResponse = response.json().await.map_err(|e| {
                    AppError::external_service(SERVICE_NAME, format!("invalid user response: {e}"))
                })?;
                Ok(account.id)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("Identity provider rejected credential");
                Err(AppError::auth_invalid(UNAUTHORIZED))
            }
            status if status.is_server_error() => Err(AppError::external_unavailable(
                SERVICE_NAME,
                format!("unexpected status {status}"),
            )),
            status => {
                debug!(status = %status, "Identity provider returned non-success status");
                Err(AppError::auth_invalid(UNAUTHORIZED))
            }
        }
    }
}

impl Debug for SupabaseIdentityProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SupabaseIdentityProvider")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Resolves request credentials to internal users
#[derive(Clone)]
pub struct Authenticator {
    identity: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserDirectory>,
}

impl Authenticator {
    /// Create an authenticator
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, users: Arc<dyn UserDirectory>) -> Self {
        Self { identity, users }
    }

    /// Authenticate the `Authorization` header value
    ///
    /// # Errors
    ///
    /// - `AUTH_REQUIRED` / `AUTH_INVALID` (401) for a missing or rejected credential
    /// - `PERMISSION_DENIED` (403) when no internal user is linked to the account
    pub async fn authenticate(&self, authorization: Option<&str>) -> AppResult<User> {
        let token = extract_bearer_token(authorization)?;
        let account_id = self.identity.account_id(token).await?;

        match self.users.find_by_auth_id(&account_id).await? {
            Some(user) => {
                AppLogger::log_auth_event(&user.id, "bearer", true, None);
                Ok(user)
            }
            None => {
                warn!(account_id = %account_id, "Authenticated account has no internal user");
                AppLogger::log_auth_event(&account_id, "bearer", false, Some("no linked user"));
                Err(AppError::permission_denied(USER_NOT_FOUND))
            }
        }
    }
}

impl Debug for Authenticator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use syntia_core::errors::ErrorCode;

    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(Some("Bearer abc ")).unwrap(), "abc");
        assert_eq!(
            extract_bearer_token(None).unwrap_err().code,
            ErrorCode::AuthRequired
        );
        assert_eq!(
            extract_bearer_token(Some("Basic xyz")).unwrap_err().code,
            ErrorCode::AuthRequired
        );
        assert!(extract_bearer_token(Some("Bearer   ")).is_err());
    }
}
