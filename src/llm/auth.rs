// ABOUTME: Service-account token broker for Vertex AI (signed JWT to OAuth2 access token)
// ABOUTME: Caches the exchanged token in an injected expiring cache with single-flight refresh
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Token Broker
//!
//! Builds an RS256 assertion from the service-account key, exchanges it at the
//! OAuth2 token endpoint, and reuses the access token until a few minutes
//! before its stated expiry (never longer than the cache TTL) or until the
//! backend rejects it.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use syntia_core::constants::cache::{ACCESS_TOKEN_EXPIRY_MARGIN_SECS, ASSERTION_LIFETIME_SECS};
use syntia_core::errors::{AppError, AppResult};
use tracing::{debug, error, instrument};

use super::sse_parser::is_retryable_request_error;
use crate::cache::ExpiringCache;

/// OAuth2 scope requested for Vertex AI
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// JWT-bearer grant type
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

const SERVICE_NAME: &str = "GCP OAuth2";

/// Source of bearer tokens for backend calls
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Return a valid access token, exchanging a new one when needed
    async fn access_token(&self) -> AppResult<String>;

    /// Forget the current token after the backend rejected it
    async fn invalidate(&self) {}
}

/// Fields of the service-account JSON used for signing
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Service-account identity (`iss`)
    pub client_email: String,
    /// PKCS#8 PEM private key
    pub private_key: String,
}

impl ServiceAccountKey {
    /// Decode a base64-encoded service-account JSON document
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the value is not base64 or not the expected JSON
    pub fn from_base64(encoded: &str) -> AppResult<Self> {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let raw = STANDARD.decode(compact).map_err(|e| {
            AppError::config(format!("GCP_SERVICE_ACCOUNT_KEY is not valid base64: {e}"))
        })?;
        serde_json::from_slice(&raw).map_err(|e| {
            AppError::config(format!(
                "GCP_SERVICE_ACCOUNT_KEY is not a service-account JSON: {e}"
            ))
        })
    }
}

impl Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

/// Assertion claims
#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Token endpoint response
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds until the token expires
    #[serde(default)]
    expires_in: Option<u64>,
}

/// How long to keep a token the issuer says lives `expires_in` seconds
///
/// Without a stated expiry the cache TTL alone applies.
#[must_use]
pub fn token_lifetime(expires_in: Option<u64>) -> Duration {
    expires_in.map_or(Duration::MAX, |secs| {
        Duration::from_secs(secs.saturating_sub(ACCESS_TOKEN_EXPIRY_MARGIN_SECS))
    })
}

/// Exchanges signed service-account assertions for OAuth2 access tokens
pub struct TokenBroker {
    client: Client,
    client_email: String,
    encoding_key: EncodingKey,
    token_url: String,
    cache: Arc<ExpiringCache<String>>,
}

impl TokenBroker {
    /// Create a broker for `key`, caching tokens in `cache`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the private key is not a valid RSA PEM
    pub fn new(
        client: Client,
        key: &ServiceAccountKey,
        token_url: impl Into<String>,
        cache: Arc<ExpiringCache<String>>,
    ) -> AppResult<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| AppError::config(format!("Invalid service-account private key: {e}")))?;
        Ok(Self {
            client,
            client_email: key.client_email.clone(),
            encoding_key,
            token_url: token_url.into(),
            cache,
        })
    }

    /// Build and sign the JWT assertion
    fn sign_assertion(&self) -> AppResult<String> {
        let iat = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: CLOUD_PLATFORM_SCOPE.to_owned(),
            aud: self.token_url.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign assertion: {e}")))
    }

    /// Exchange a fresh assertion at the token endpoint
    #[instrument(skip(self), fields(token_url = %self.token_url))]
    async fn exchange(&self) -> AppResult<(String, Duration)> {
        let assertion = self.sign_assertion()?;

        let response = self
            .client
            .post(&self.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await
            .map_err(|e| {
                if is_retryable_request_error(&e) {
                    AppError::external_unavailable(SERVICE_NAME, e.to_string())
                } else {
                    AppError::external_service(SERVICE_NAME, e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, "OAuth2 token exchange failed");
            let message = format!("token exchange failed ({status}): {body}");
            return Err(if status.is_server_error() {
                AppError::external_unavailable(SERVICE_NAME, message)
            } else {
                AppError::external_auth_failed(SERVICE_NAME, message)
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            AppError::external_service(SERVICE_NAME, format!("invalid token response: {e}"))
        })?;

        let lifetime = token_lifetime(token.expires_in);
        debug!(expires_in = ?token.expires_in, "Exchanged service-account assertion for access token");
        Ok((token.access_token, lifetime))
    }
}

#[async_trait]
impl AccessTokenProvider for TokenBroker {
    async fn access_token(&self) -> AppResult<String> {
        self.cache.get_or_try_refresh_for(|| self.exchange()).await
    }

    async fn invalidate(&self) {
        debug!("Dropping rejected access token");
        self.cache.invalidate().await;
    }
}

impl Debug for TokenBroker {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TokenBroker")
            .field("client_email", &self.client_email)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}
