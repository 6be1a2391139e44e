// ABOUTME: Vertex AI text embedding client used by semantic retrieval tools
// ABOUTME: Converts query or document text into a fixed-length vector
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use syntia_core::errors::{AppError, AppResult};
use tracing::instrument;

use super::sse_parser::is_retryable_request_error;
use super::vertex::map_api_error;
use super::AccessTokenProvider;

const SERVICE_NAME: &str = "Vertex AI embeddings";

/// How the embedded text will be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmbeddingTask {
    /// Search query
    #[serde(rename = "RETRIEVAL_QUERY")]
    Query,
    /// Indexed document
    #[serde(rename = "RETRIEVAL_DOCUMENT")]
    Document,
}

/// Text-to-vector service
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embed `text`; fails loudly on any upstream or shape error
    async fn embed(&self, text: &str, task: EmbeddingTask) -> AppResult<Vec<f32>>;
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: [EmbeddingInstance<'a>; 1],
    parameters: PredictParameters,
}

#[derive(Serialize)]
struct EmbeddingInstance<'a> {
    content: &'a str,
    task_type: EmbeddingTask,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    output_dimensionality: usize,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
struct Prediction {
    embeddings: PredictionEmbeddings,
}

#[derive(Deserialize)]
struct PredictionEmbeddings {
    values: Vec<f32>,
}

/// Embedding client for the Vertex AI `:predict` endpoint
pub struct VertexEmbeddingClient {
    client: Client,
    url: String,
    dimension: usize,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl VertexEmbeddingClient {
    /// Create a client for `model` in `project_id`/`location`
    pub fn new(
        client: Client,
        base_url: &str,
        project_id: &str,
        location: &str,
        model: &str,
        dimension: usize,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self {
            client,
            url: format!(
                "{base_url}/v1/projects/{project_id}/locations/{location}/publishers/google/models/{model}:predict"
            ),
            dimension,
            tokens,
        }
    }
}

#[async_trait]
impl TextEmbedder for VertexEmbeddingClient {
    #[instrument(skip(self, text), fields(chars = text.len(), task = ?task))]
    async fn embed(&self, text: &str, task: EmbeddingTask) -> AppResult<Vec<f32>> {
        let token = self.tokens.access_token().await?;
        let body = PredictRequest {
            instances: [EmbeddingInstance {
                content: text,
                task_type: task,
            }],
            parameters: PredictParameters {
                output_dimensionality: self.dimension,
            },
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&token)
            .json(&body)
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
            return Err(map_api_error(status, &body));
        }

        let parsed: PredictResponse = response.json().await.map_err(|e| {
            AppError::external_service(SERVICE_NAME, format!("Failed to parse response: {e}"))
        })?;

        let values = parsed
            .predictions
            .into_iter()
            .next()
            .map(|p| p.embeddings.values)
            .ok_or_else(|| AppError::external_service(SERVICE_NAME, "empty predictions"))?;

        if values.len() != self.dimension {
            return Err(AppError::external_service(
                SERVICE_NAME,
                format!(
                    "expected {} dimensions, got {}",
                    self.dimension,
                    values.len()
                ),
            ));
        }

        Ok(values)
    }
}

impl Debug for VertexEmbeddingClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VertexEmbeddingClient")
            .field("url", &self.url)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}
