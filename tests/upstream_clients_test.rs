// ABOUTME: Tests for the Vertex AI, embedding and Supabase clients against local mock servers
// ABOUTME: Covers SSE decoding across chunk boundaries, status mapping and response shape checks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use futures_util::{stream, StreamExt};
use helpers::mock_server::spawn;
use serde_json::{json, Value};
use syntia_chat::{
    auth::{IdentityProvider, SupabaseIdentityProvider},
    config::SecretString,
    errors::{AppResult, ErrorCode},
    llm::{
        AccessTokenProvider, Content, EmbeddingTask, FinishReason, GenerateRequest,
        GenerationConfig, GenerativeBackend, ModelEvent, TextEmbedder, TokenUsage,
        VertexAiClient, VertexEmbeddingClient,
    },
};

const MODEL_PATH: &str = "/v1/projects/crm-test/locations/us-central1/publishers/google/models/gemini-test";

struct StaticToken;

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self) -> AppResult<String> {
        Ok("ya29.static".to_owned())
    }
}

/// Token source that counts how often its token was rejected
#[derive(Default)]
struct CountingToken {
    invalidations: AtomicUsize,
}

#[async_trait]
impl AccessTokenProvider for CountingToken {
    async fn access_token(&self) -> AppResult<String> {
        Ok("ya29.revoked".to_owned())
    }

    async fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

/// What a mock upstream saw
#[derive(Debug, Clone)]
struct Seen {
    uri: String,
    authorization: Option<String>,
    apikey: Option<String>,
    body: String,
}

type Recorder = Arc<Mutex<Vec<Seen>>>;

/// Upstream that answers every request with `reply` and records it
async fn upstream(reply: impl Fn() -> Response + Clone + Send + Sync + 'static) -> (String, Recorder) {
    let seen: Recorder = Arc::default();
    let recorder = Arc::clone(&seen);
    let router = Router::new().fallback(move |uri: Uri, headers: HeaderMap, body: String| {
        let reply = reply.clone();
        let recorder = Arc::clone(&recorder);
        async move {
            let value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(ToOwned::to_owned);
            recorder.lock().unwrap().push(Seen {
                uri: uri.to_string(),
                authorization: value(header::AUTHORIZATION.as_str()),
                apikey: value("apikey"),
                body,
            });
            reply()
        }
    });
    (spawn(router).await, seen)
}

fn sse(chunks: &'static [&'static str]) -> Response {
    let body = Body::from_stream(stream::iter(chunks.iter().map(|c| Ok::<_, Infallible>(*c))));
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

fn json_reply(status: StatusCode, value: Value) -> Response {
    (status, axum::Json(value)).into_response()
}

fn vertex(base_url: &str) -> VertexAiClient {
    common::init_test_logging();
    VertexAiClient::new(
        reqwest::Client::new(),
        base_url,
        "crm-test",
        "us-central1",
        "gemini-test",
        Arc::new(StaticToken),
    )
}

fn request() -> GenerateRequest {
    GenerateRequest::new(
        "Eres Syntia.",
        vec![Content::user_text("Hola")],
        GenerationConfig {
            max_output_tokens: 256,
            temperature: 0.2,
        },
    )
}

async fn collect(client: &VertexAiClient) -> Vec<AppResult<ModelEvent>> {
    client
        .stream_generate(&request())
        .await
        .unwrap()
        .collect()
        .await
}

// ============================================================================
// Vertex AI generation
// ============================================================================

#[tokio::test]
async fn test_stream_decodes_events_across_chunks() {
    let (base, seen) = upstream(|| {
        sse(&[
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Ho",
            "la\"}]}}]}\r\n\r\n",
            ": keep-alive comment\n\n",
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\" mundo\"}]},\"finishReason\":\"STOP\"}],",
            "\"usageMetadata\":{\"promptTokenCount\":11,\"candidatesTokenCount\":3}}\n\n",
        ])
    })
    .await;

    let events: Vec<ModelEvent> = collect(&vertex(&base))
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let texts: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            ModelEvent::Text(part) => part.text.as_deref(),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["Hola", " mundo"]);
    assert!(events.contains(&ModelEvent::Finish(FinishReason::Stop)));
    assert_eq!(
        events.last(),
        Some(&ModelEvent::Usage(TokenUsage {
            prompt_tokens: 11,
            output_tokens: 3
        }))
    );

    let seen = seen.lock().unwrap()[0].clone();
    assert_eq!(seen.uri, format!("{MODEL_PATH}:streamGenerateContent?alt=sse"));
    assert_eq!(seen.authorization.as_deref(), Some("Bearer ya29.static"));
    let body: Value = serde_json::from_str(&seen.body).unwrap();
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Eres Syntia.");
    assert_eq!(body["contents"][0]["role"], "user");
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
    assert!(body.get("tools").is_none());
}

#[tokio::test]
async fn test_stream_skips_unparseable_chunks() {
    let (base, _seen) = upstream(|| {
        sse(&[
            "data: {not json}\n\n",
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"ok\"}]}}]}\n\n",
        ])
    })
    .await;

    let events = collect(&vertex(&base)).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], Ok(ModelEvent::Text(part)) if part.text.as_deref() == Some("ok")));
}

#[tokio::test]
async fn test_function_call_parts_keep_signature() {
    let (base, _seen) = upstream(|| {
        sse(&[
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"functionCall\":{\"name\":\"search_clientes\",\"args\":{\"nombre\":\"Garcia\"}},\"thoughtSignature\":\"c2ln\"}]}}]}\n\n",
        ])
    })
    .await;

    let events = collect(&vertex(&base)).await;

    let Ok(ModelEvent::FunctionCall(part)) = &events[0] else {
        panic!("expected a function call, got {events:?}");
    };
    assert_eq!(part.function_call.as_ref().unwrap().args, json!({ "nombre": "Garcia" }));
    assert_eq!(part.thought_signature.as_deref(), Some("c2ln"));
}

#[tokio::test]
async fn test_rate_limit_is_retryable() {
    let (base, _seen) = upstream(|| {
        json_reply(
            StatusCode::TOO_MANY_REQUESTS,
            json!({ "error": { "code": 429, "status": "RESOURCE_EXHAUSTED" } }),
        )
    })
    .await;

    let Err(err) = vertex(&base).stream_generate(&request()).await else {
        panic!("expected an error");
    };

    assert_eq!(err.code, ErrorCode::ExternalRateLimited);
    assert!(err.is_retryable());
    assert!(err.message.contains("RESOURCE_EXHAUSTED"));
}

#[tokio::test]
async fn test_rejected_credentials_are_terminal() {
    let (base, _seen) = upstream(|| json_reply(StatusCode::FORBIDDEN, json!({}))).await;

    let err = vertex(&base).generate(&request()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::ExternalAuthFailed);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_rejected_token_is_dropped() {
    let (base, _seen) = upstream(|| json_reply(StatusCode::UNAUTHORIZED, json!({}))).await;
    let tokens = Arc::new(CountingToken::default());
    let client = VertexAiClient::new(
        reqwest::Client::new(),
        base,
        "crm-test",
        "us-central1",
        "gemini-test",
        tokens.clone(),
    );

    let err = client.generate(&request()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::ExternalAuthFailed);
    assert_eq!(tokens.invalidations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_buffered_generate() {
    let (base, seen) = upstream(|| {
        json_reply(
            StatusCode::OK,
            json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [
                        { "text": "pensando", "thought": true },
                        { "text": "Resumen listo" }
                    ]},
                    "finishReason": "STOP"
                }]
            }),
        )
    })
    .await;

    let response = vertex(&base).generate(&request()).await.unwrap();

    assert_eq!(response.text(), "Resumen listo");
    assert_eq!(
        seen.lock().unwrap()[0].uri,
        format!("{MODEL_PATH}:generateContent")
    );
}

#[tokio::test]
async fn test_unreachable_upstream_is_unavailable() {
    // nothing listens on the discard port
    let err = vertex("http://127.0.0.1:9").generate(&request()).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::ExternalServiceUnavailable);
}

// ============================================================================
// Embeddings
// ============================================================================

fn embedder(base_url: &str, dimension: usize) -> VertexEmbeddingClient {
    VertexEmbeddingClient::new(
        reqwest::Client::new(),
        base_url,
        "crm-test",
        "us-central1",
        "text-embedding-test",
        dimension,
        Arc::new(StaticToken),
    )
}

fn predictions(values: &[f32]) -> Response {
    json_reply(
        StatusCode::OK,
        json!({ "predictions": [{ "embeddings": { "values": values } }] }),
    )
}

#[tokio::test]
async fn test_embedding_request_and_vector() {
    let (base, seen) = upstream(|| predictions(&[0.25, 0.5, 0.75])).await;

    let vector = embedder(&base, 3)
        .embed("dermatitis", EmbeddingTask::Query)
        .await
        .unwrap();

    assert_eq!(vector, vec![0.25, 0.5, 0.75]);
    let seen = seen.lock().unwrap()[0].clone();
    assert!(seen.uri.ends_with("/models/text-embedding-test:predict"));
    let body: Value = serde_json::from_str(&seen.body).unwrap();
    assert_eq!(body["instances"][0]["content"], "dermatitis");
    assert_eq!(body["instances"][0]["task_type"], "RETRIEVAL_QUERY");
    assert_eq!(body["parameters"]["outputDimensionality"], 3);
}

#[tokio::test]
async fn test_embedding_dimension_mismatch_fails() {
    let (base, _seen) = upstream(|| predictions(&[0.1, 0.2])).await;

    let err = embedder(&base, 3)
        .embed("acne", EmbeddingTask::Query)
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::ExternalServiceError);
    assert!(err.message.contains("expected 3 dimensions, got 2"));
}

#[tokio::test]
async fn test_empty_predictions_fail() {
    let (base, _seen) = upstream(|| json_reply(StatusCode::OK, json!({ "predictions": [] }))).await;

    let err = embedder(&base, 3)
        .embed("acne", EmbeddingTask::Query)
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::ExternalServiceError);
}

// ============================================================================
// Supabase identity
// ============================================================================

fn identity(base_url: &str) -> SupabaseIdentityProvider {
    SupabaseIdentityProvider::new(
        reqwest::Client::new(),
        &format!("{base_url}/"),
        SecretString::new("service-role"),
    )
}

#[tokio::test]
async fn test_identity_resolves_account() {
    let (base, seen) = upstream(|| json_reply(StatusCode::OK, json!({ "id": "auth-7", "email": "a@b.mx" }))).await;

    let account = identity(&base).account_id("jwt-123").await.unwrap();

    assert_eq!(account, "auth-7");
    let seen = seen.lock().unwrap()[0].clone();
    assert_eq!(seen.uri, "/auth/v1/user");
    assert_eq!(seen.authorization.as_deref(), Some("Bearer jwt-123"));
    assert_eq!(seen.apikey.as_deref(), Some("service-role"));
}

#[tokio::test]
async fn test_identity_rejection_is_unauthorized() {
    let (base, _seen) = upstream(|| json_reply(StatusCode::UNAUTHORIZED, json!({ "msg": "invalid JWT" }))).await;

    let err = identity(&base).account_id("expired").await.unwrap_err();

    assert_eq!(err.code, ErrorCode::AuthInvalid);
    assert_eq!(err.message, "No autorizado");
}

#[tokio::test]
async fn test_identity_outage_is_unavailable() {
    let (base, _seen) = upstream(|| json_reply(StatusCode::BAD_GATEWAY, json!({}))).await;

    let err = identity(&base).account_id("jwt").await.unwrap_err();

    assert_eq!(err.code, ErrorCode::ExternalServiceUnavailable);
}
