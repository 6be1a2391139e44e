// ABOUTME: Generative backend abstraction for tool-calling chat against Vertex AI Gemini
// ABOUTME: Defines typed model events, the backend trait, and re-exports wire types and clients
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Generative Backend Interface
//!
//! The agent loop talks to the model through [`GenerativeBackend`]. Responses,
//! buffered or streamed, are decoded into a sequence of [`ModelEvent`]s so the
//! loop runs one state machine for both modes.
//!
//! ## Key Concepts
//!
//! - **`Part`**: one piece of model output. Every part is kept verbatim, including
//!   fields this crate does not understand, so it can be replayed on the next round.
//! - **`ModelEvent`**: a classified part, a finish reason, or token usage.
//! - **`AccessTokenProvider`**: supplies the OAuth bearer for every call.

/// Service-account token broker
pub mod auth;
/// Embedding endpoint client
pub mod embeddings;
/// SSE framing and retry policy
pub mod sse_parser;
/// Gemini request/response wire types
pub mod types;
/// Vertex AI `generateContent` client
pub mod vertex;

use std::pin::Pin;

use async_trait::async_trait;
use syntia_core::errors::AppResult;
use tokio_stream::Stream;

pub use auth::{AccessTokenProvider, ServiceAccountKey, TokenBroker};
pub use embeddings::{EmbeddingTask, TextEmbedder, VertexEmbeddingClient};
pub use sse_parser::RetryConfig;
pub use types::{
    Candidate, Content, ContentRole, FinishReason, FunctionCall, FunctionCallingMode,
    FunctionDeclaration, FunctionResponse, GenerateContentResponse, GenerateRequest,
    GenerationConfig, Part, TokenUsage,
};
pub use vertex::VertexAiClient;

/// A decoded unit of model output
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// Answer text the user should see
    Text(Part),
    /// Internal reasoning, hidden from the user
    Thought(Part),
    /// The model asks for a tool
    FunctionCall(Part),
    /// Part with no text or call (e.g. a bare thought signature)
    Opaque(Part),
    /// Why generation stopped
    Finish(FinishReason),
    /// Token accounting for the call so far
    Usage(TokenUsage),
}

impl ModelEvent {
    /// Classify a part by what it carries
    #[must_use]
    pub fn from_part(part: Part) -> Self {
        if part.function_call.is_some() {
            Self::FunctionCall(part)
        } else if part.is_thought() {
            Self::Thought(part)
        } else if part.text.as_deref().is_some_and(|t| !t.is_empty()) {
            Self::Text(part)
        } else {
            Self::Opaque(part)
        }
    }
}

/// Stream of model events from a streaming call
pub type ModelEventStream = Pin<Box<dyn Stream<Item = AppResult<ModelEvent>> + Send>>;

/// Generative model backend
///
/// Implementations perform a single HTTP attempt per call; retry and backoff
/// belong to the caller so it can keep the client connection alive meanwhile.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Buffered generation
    async fn generate(&self, request: &GenerateRequest) -> AppResult<GenerateContentResponse>;

    /// Streaming generation
    async fn stream_generate(&self, request: &GenerateRequest) -> AppResult<ModelEventStream>;

    /// Prepare credentials ahead of the first call
    async fn warm_up(&self) -> AppResult<()>;
}
