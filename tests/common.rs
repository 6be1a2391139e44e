// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Scripted model backend, fixed embedder, static identity provider and an in-memory app
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]
//! Shared test utilities for `syntia_chat`
//!
//! Every integration test runs the real engine and router against in-process
//! stores; only the model, the embedder and the identity provider are doubles.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use futures_util::stream;
use serde_json::{json, Value};
use syntia_chat::{
    auth::{Authenticator, IdentityProvider},
    chat::{ChatEngine, ChatServices},
    config::ChatConfig,
    constants::messages::{http::UNAUTHORIZED, COMPACTION_PROMPT},
    database::memory::{CrmFixture, MemoryCrm, MemoryStore},
    errors::{AppError, AppResult},
    llm::{
        EmbeddingTask, GenerateContentResponse, GenerateRequest, GenerativeBackend, ModelEvent,
        ModelEventStream, RetryConfig, TextEmbedder,
    },
    models::{User, UserRole},
    server::{build_router, ServerResources},
};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

// ============================================================================
// Users
// ============================================================================

/// Advisor used by most tests
pub const ASESOR_ID: &str = "asesor-1";
/// A second advisor who must not see the first one's data
pub const OTHER_ASESOR_ID: &str = "asesor-2";
/// Administrator with global visibility
pub const ADMIN_ID: &str = "admin-1";

/// Base prompt stored in the config table
pub const TEST_PROMPT: &str = "Eres Syntia, asistente de representantes medicos.";

/// Internal user with the given role
pub fn user(id: &str, role: UserRole) -> User {
    User {
        id: id.to_owned(),
        role,
        auth_user_id: format!("auth-{id}"),
    }
}

/// Bearer credential the static identity provider maps to `user_id`
pub fn token_for(user_id: &str) -> String {
    format!("token-{user_id}")
}

// ============================================================================
// Model doubles
// ============================================================================

/// Answer with a single text part
pub fn text_reply(text: &str) -> GenerateContentResponse {
    serde_json::from_value(json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 40, "candidatesTokenCount": 12 }
    }))
    .expect("valid reply")
}

/// Round that calls every `(name, args)` tool; the first call carries a thought signature
pub fn call_reply(calls: &[(&str, Value)]) -> GenerateContentResponse {
    let parts: Vec<Value> = calls
        .iter()
        .enumerate()
        .map(|(index, (name, args))| {
            let mut part = json!({ "functionCall": { "name": name, "args": args } });
            if index == 0 {
                part["thoughtSignature"] = json!("sig-round");
            }
            part
        })
        .collect();
    serde_json::from_value(json!({
        "candidates": [{
            "content": { "role": "model", "parts": parts },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 30, "candidatesTokenCount": 4 }
    }))
    .expect("valid reply")
}

/// Answer cut at the output token ceiling
pub fn truncated_reply(text: &str) -> GenerateContentResponse {
    serde_json::from_value(json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "MAX_TOKENS"
        }]
    }))
    .expect("valid reply")
}

/// Upstream 429
pub fn rate_limited() -> AppError {
    AppError::external_rate_limited("Vertex AI", "API error (429 Too Many Requests): quota")
}

fn system_text(request: &GenerateRequest) -> Option<&str> {
    request
        .system_instruction
        .as_ref()
        .and_then(|instruction| instruction.parts.first())
        .and_then(|part| part.text.as_deref())
}

/// Backend that replays a fixed script of replies
///
/// Chat calls pop from the script in order. Compaction calls are recognized by
/// their instruction and answered from a separate queue of summaries.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<AppResult<GenerateContentResponse>>>,
    summaries: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<GenerateRequest>>,
    compaction_requests: Mutex<Vec<GenerateRequest>>,
    warm_ups: AtomicUsize,
    hang: bool,
}

impl ScriptedBackend {
    /// Backend answering with `replies` in order
    pub fn new(replies: Vec<AppResult<GenerateContentResponse>>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    /// Backend whose chat calls never answer, like a stalled upstream
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    /// Queue the text of the next compaction
    pub fn with_summary(self, summary: &str) -> Self {
        self.summaries.lock().unwrap().push_back(summary.to_owned());
        self
    }

    /// Chat requests received so far
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Compaction requests received so far
    pub fn compaction_requests(&self) -> Vec<GenerateRequest> {
        self.compaction_requests.lock().unwrap().clone()
    }

    /// Script entries not consumed yet
    pub fn remaining_script(&self) -> usize {
        self.script.lock().unwrap().len()
    }

    /// Times credentials were prepared
    pub fn warm_ups(&self) -> usize {
        self.warm_ups.load(Ordering::SeqCst)
    }

    fn next(&self, request: &GenerateRequest) -> AppResult<GenerateContentResponse> {
        if system_text(request) == Some(COMPACTION_PROMPT) {
            self.compaction_requests.lock().unwrap().push(request.clone());
            let summary = self.summaries.lock().unwrap().pop_front();
            return summary
                .map(|text| text_reply(&text))
                .ok_or_else(|| AppError::external_service("Vertex AI", "no summary scripted"));
        }

        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::internal("model script exhausted")))
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn generate(&self, request: &GenerateRequest) -> AppResult<GenerateContentResponse> {
        if self.hang {
            return std::future::pending().await;
        }
        self.next(request)
    }

    async fn stream_generate(&self, request: &GenerateRequest) -> AppResult<ModelEventStream> {
        if self.hang {
            return std::future::pending().await;
        }
        let events: Vec<AppResult<ModelEvent>> =
            self.next(request)?.into_events().into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(events)))
    }

    async fn warm_up(&self) -> AppResult<()> {
        self.warm_ups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Embedder returning the same unit vector for every text
#[derive(Default)]
pub struct FixedEmbedder {
    queries: Mutex<Vec<String>>,
}

/// Vector returned by [`FixedEmbedder`]
pub const QUERY_VECTOR: [f32; 3] = [1.0, 0.0, 0.0];

impl FixedEmbedder {
    /// Texts embedded so far
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextEmbedder for FixedEmbedder {
    async fn embed(&self, text: &str, _task: EmbeddingTask) -> AppResult<Vec<f32>> {
        self.queries.lock().unwrap().push(text.to_owned());
        Ok(QUERY_VECTOR.to_vec())
    }
}

/// Identity provider accepting `token-<user id>` credentials
pub struct StaticIdentity {
    accounts: HashMap<String, String>,
}

impl StaticIdentity {
    /// Accept one credential per user; `extra` maps tokens to accounts with no internal user
    pub fn for_users(users: &[&User], extra: &[(&str, &str)]) -> Self {
        let mut accounts: HashMap<String, String> = users
            .iter()
            .map(|u| (token_for(&u.id), u.auth_user_id.clone()))
            .collect();
        accounts.extend(
            extra
                .iter()
                .map(|(token, account)| ((*token).to_owned(), (*account).to_owned())),
        );
        Self { accounts }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn account_id(&self, token: &str) -> AppResult<String> {
        self.accounts
            .get(token)
            .cloned()
            .ok_or_else(|| AppError::auth_invalid(UNAUTHORIZED))
    }
}

// ============================================================================
// Application
// ============================================================================

/// Token of an identity-provider account with no linked internal user
pub const ORPHAN_TOKEN: &str = "token-orphan";

/// Chat tuning with millisecond backoff so retry tests stay fast
pub fn test_config() -> ChatConfig {
    ChatConfig {
        retry: RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
        },
        keep_alive_interval: Duration::from_millis(50),
        ..ChatConfig::default()
    }
}

/// Engine, router and the doubles behind them
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub backend: Arc<ScriptedBackend>,
    pub embedder: Arc<FixedEmbedder>,
    pub engine: Arc<ChatEngine>,
    pub router: Router,
}

impl TestApp {
    /// App with an empty CRM
    pub fn new(backend: ScriptedBackend) -> Self {
        Self::build(backend, MemoryCrm::new(CrmFixture::default()), test_config())
    }

    /// App with the given CRM rows
    pub fn with_crm(backend: ScriptedBackend, crm: MemoryCrm) -> Self {
        Self::build(backend, crm, test_config())
    }

    /// Fully configurable app
    pub fn build(backend: ScriptedBackend, crm: MemoryCrm, config: ChatConfig) -> Self {
        init_test_logging();

        let store = Arc::new(MemoryStore::new().with_system_prompt(TEST_PROMPT));
        let asesor = user(ASESOR_ID, UserRole::Asesor);
        let other = user(OTHER_ASESOR_ID, UserRole::Asesor);
        let admin = user(ADMIN_ID, UserRole::Administrador);
        let identity = StaticIdentity::for_users(
            &[&asesor, &other, &admin],
            &[(ORPHAN_TOKEN, "auth-orphan")],
        );
        store.insert_user(asesor);
        store.insert_user(other);
        store.insert_user(admin);

        let backend = Arc::new(backend);
        let embedder = Arc::new(FixedEmbedder::default());
        let engine = ChatEngine::new(
            ChatServices {
                conversations: store.clone(),
                config_store: store.clone(),
                usage: store.clone(),
                crm: Arc::new(crm),
                backend: backend.clone(),
                embedder: embedder.clone(),
            },
            &config,
        );
        let authenticator = Authenticator::new(Arc::new(identity), store.clone());
        let resources = Arc::new(ServerResources::new(engine, authenticator));
        let engine = Arc::clone(&resources.engine);
        let router = build_router(resources, &["*".to_owned()]);

        Self {
            store,
            backend,
            embedder,
            engine,
            router,
        }
    }

    /// Fresh handle on the router for one request
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}
