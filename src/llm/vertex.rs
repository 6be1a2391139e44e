// ABOUTME: Google Vertex AI Gemini client for buffered and SSE-streamed generateContent
// ABOUTME: Maps upstream HTTP failures onto retryable and terminal error codes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Vertex AI Client
//!
//! Implementation of [`GenerativeBackend`] for Gemini models on Vertex AI.
//! Authentication is a bearer token from an [`AccessTokenProvider`].
//!
//! Each call makes exactly one HTTP attempt. Status mapping:
//! - 429 becomes `EXTERNAL_RATE_LIMITED`
//! - 5xx, connect and timeout errors become `EXTERNAL_SERVICE_UNAVAILABLE`
//! - 401/403 become `EXTERNAL_AUTH_FAILED`
//! - anything else becomes `EXTERNAL_SERVICE_ERROR`

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use syntia_core::errors::{AppError, AppResult};
use tracing::{debug, error, instrument, warn};

use super::sse_parser::{create_sse_stream, is_retryable_request_error};
use super::{
    AccessTokenProvider, GenerateContentResponse, GenerateRequest, GenerativeBackend, ModelEvent,
    ModelEventStream,
};

const SERVICE_NAME: &str = "Vertex AI";

/// Gemini client for Vertex AI
pub struct VertexAiClient {
    client: Client,
    base_url: String,
    project_id: String,
    location: String,
    model: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl VertexAiClient {
    /// Create a client for `model` in `project_id`/`location`
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        location: impl Into<String>,
        model: impl Into<String>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            project_id: project_id.into(),
            location: location.into(),
            model: model.into(),
            tokens,
        }
    }

    /// Build the Vertex AI API URL for a method
    #[must_use]
    pub fn build_url(&self, method: &str) -> String {
        format!(
            "{base}/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:{method}",
            base = self.base_url,
            project = self.project_id,
            location = self.location,
            model = self.model,
        )
    }

    /// POST the request and return the response if the status is a success
    async fn send(&self, url: &str, request: &GenerateRequest) -> AppResult<Response> {
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&token)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if is_retryable_request_error(&e) {
                    AppError::external_unavailable(SERVICE_NAME, format!("request failed: {e}"))
                } else {
                    AppError::external_service(SERVICE_NAME, format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            self.tokens.invalidate().await;
        }
        Err(map_api_error(status, &body))
    }

    /// Decode one streamed chunk into events, skipping unparseable payloads
    fn parse_chunk(json_str: &str) -> Vec<AppResult<ModelEvent>> {
        match serde_json::from_str::<GenerateContentResponse>(json_str) {
            Ok(chunk) => chunk.into_events().into_iter().map(Ok).collect(),
            Err(e) => {
                debug!(error = %e, "Skipping unparseable stream chunk");
                Vec::new()
            }
        }
    }
}

/// Map a non-success upstream status onto an error code
#[must_use]
pub fn map_api_error(status: StatusCode, body: &str) -> AppError {
    let message = format!("API error ({status}): {body}");
    match status.as_u16() {
        429 => {
            warn!(status = %status, "Vertex AI rate limited");
            AppError::external_rate_limited(SERVICE_NAME, message)
        }
        401 | 403 => {
            error!(status = %status, "Vertex AI rejected credentials");
            AppError::external_auth_failed(SERVICE_NAME, message)
        }
        code if (500..=599).contains(&code) => {
            warn!(status = %status, "Vertex AI unavailable");
            AppError::external_unavailable(SERVICE_NAME, message)
        }
        _ => {
            error!(status = %status, "Vertex AI API error");
            AppError::external_service(SERVICE_NAME, message)
        }
    }
}

#[async_trait]
impl GenerativeBackend for VertexAiClient {
    #[instrument(skip(self, request), fields(model = %self.model, contents = request.contents.len()))]
    async fn generate(&self, request: &GenerateRequest) -> AppResult<GenerateContentResponse> {
        let url = self.build_url("generateContent");
        let response = self.send(&url, request).await?;

        let text = response.text().await.map_err(|e| {
            AppError::external_service(SERVICE_NAME, format!("Failed to read response: {e}"))
        })?;

        serde_json::from_str(&text).map_err(|e| {
            error!(error = %e, "Failed to parse Vertex AI response");
            AppError::external_service(SERVICE_NAME, format!("Failed to parse response: {e}"))
        })
    }

    #[instrument(skip(self, request), fields(model = %self.model, contents = request.contents.len()))]
    async fn stream_generate(&self, request: &GenerateRequest) -> AppResult<ModelEventStream> {
        let url = format!("{}?alt=sse", self.build_url("streamGenerateContent"));
        let response = self.send(&url, request).await?;

        debug!("Vertex AI stream opened");
        Ok(create_sse_stream(
            response.bytes_stream(),
            Self::parse_chunk,
            SERVICE_NAME,
        ))
    }

    async fn warm_up(&self) -> AppResult<()> {
        self.tokens.access_token().await.map(|_| ())
    }
}

impl Debug for VertexAiClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VertexAiClient")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
