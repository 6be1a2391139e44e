// ABOUTME: Tool-calling agent loop: model call, tool dispatch, replay, bounded by a round budget
// ABOUTME: One state machine serves streamed and buffered turns; upstream 429/5xx are retried with backoff
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Agent Loop
//!
//! Each round calls the model with the transcript so far. Answer text is
//! forwarded to the client as it arrives; thoughts only keep the connection
//! alive. Every part the model produced is replayed verbatim on the next
//! round, followed by one user turn holding all tool results of the round.
//!
//! After `max_tool_rounds` rounds with tool calls, one final call is made with
//! tools declared but calling disabled, so the model has to answer in text.
//!
//! Terminal failures:
//! - `RESPONSE_TOO_LONG` when a call stops at the output token ceiling
//! - `EMPTY_RESPONSE` when the turn ends without answer text
//! - the upstream error, with a "service busy" message once retries are exhausted

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use syntia_core::constants::messages::SERVICE_BUSY_MESSAGE;
use syntia_core::errors::{AppError, AppResult};
use tokio::time::{interval_at, sleep, Instant};
use tracing::{debug, info, instrument, warn};

use super::stream::EventSink;
use crate::llm::{
    Content, FinishReason, FunctionCall, FunctionCallingMode, GenerateRequest, GenerationConfig,
    GenerativeBackend, ModelEvent, ModelEventStream, Part, RetryConfig, TokenUsage,
};
use crate::tools::{ToolExecutionContext, ToolRegistry};

/// Message of the error raised when the client disconnects mid-turn
pub const CLIENT_DISCONNECTED: &str = "Client disconnected";

/// Loop limits and sampling
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Rounds in which the model may call tools
    pub max_tool_rounds: usize,
    /// Sampling parameters for every call
    pub generation: GenerationConfig,
    /// Backoff for upstream 429/5xx
    pub retry: RetryConfig,
    /// Keep-alive period while tools run
    pub keep_alive_interval: Duration,
}

/// Result of a completed turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOutcome {
    /// Answer text across all rounds
    pub text: String,
    /// Token usage summed over all calls
    pub usage: TokenUsage,
    /// Model calls made
    pub model_calls: usize,
    /// Tool calls executed
    pub tool_calls: usize,
}

/// What one model call produced
#[derive(Debug, Default)]
struct RoundOutput {
    parts: Vec<Part>,
    text: String,
    calls: Vec<FunctionCall>,
    finish: Option<FinishReason>,
    usage: TokenUsage,
}

pub(crate) fn disconnected() -> AppError {
    AppError::internal(CLIENT_DISCONNECTED)
}

/// Whether `error` came from the client going away
#[must_use]
pub fn is_disconnect(error: &AppError) -> bool {
    error.message == CLIENT_DISCONNECTED
}

/// Runs tool-calling turns against a generative backend
pub struct AgentLoop {
    backend: Arc<dyn GenerativeBackend>,
    registry: Arc<ToolRegistry>,
    settings: AgentSettings,
}

impl AgentLoop {
    /// Create a loop
    #[must_use]
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        registry: Arc<ToolRegistry>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            backend,
            registry,
            settings,
        }
    }

    /// Tool registry used for dispatch
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one turn
    ///
    /// # Errors
    ///
    /// See the module docs for the terminal failures
    #[instrument(skip_all, fields(user_id = %tools.user.id, streaming = sink.is_streaming()))]
    pub async fn run(
        &self,
        system_instruction: &str,
        mut contents: Vec<Content>,
        tools: &ToolExecutionContext,
        sink: &EventSink,
    ) -> AppResult<AgentOutcome> {
        let declarations = self.registry.declarations();
        let mut answer = String::new();
        let mut usage = TokenUsage::default();
        let mut tool_calls = 0;

        for round in 0..=self.settings.max_tool_rounds {
            let mode = if round < self.settings.max_tool_rounds {
                FunctionCallingMode::Auto
            } else {
                FunctionCallingMode::None
            };
            let request = GenerateRequest::new(
                system_instruction,
                contents.clone(),
                self.settings.generation,
            )
            .with_tools(declarations.clone(), mode);

            let output = self.call_model(&request, sink).await?;
            usage.prompt_tokens += output.usage.prompt_tokens;
            usage.output_tokens += output.usage.output_tokens;

            if output.finish == Some(FinishReason::MaxTokens) {
                warn!(round, "Model output hit the token ceiling");
                return Err(AppError::response_too_long());
            }
            answer.push_str(&output.text);

            if output.calls.is_empty() || mode == FunctionCallingMode::None {
                if answer.trim().is_empty() {
                    warn!(round, finish = ?output.finish, "Model finished without answer text");
                    return Err(AppError::empty_response());
                }
                debug!(round, "Turn answered");
                return Ok(AgentOutcome {
                    text: answer,
                    usage,
                    model_calls: round + 1,
                    tool_calls,
                });
            }

            info!(
                round,
                calls = output.calls.len(),
                tools = ?output.calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "Model requested tools"
            );
            tool_calls += output.calls.len();
            contents.push(Content::model_parts(output.parts));

            if !sink.keep_alive().await {
                return Err(disconnected());
            }
            let responses = self.execute_tools(&output.calls, tools, sink).await?;
            contents.push(Content::function_responses(responses));
        }

        // the final round runs with calling disabled and always returns above
        Err(AppError::empty_response())
    }

    /// Execute a round's calls concurrently, keeping the client alive meanwhile
    async fn execute_tools(
        &self,
        calls: &[FunctionCall],
        context: &ToolExecutionContext,
        sink: &EventSink,
    ) -> AppResult<Vec<crate::llm::FunctionResponse>> {
        let execution = self.registry.execute_all(calls, context);
        tokio::pin!(execution);

        let period = self.settings.keep_alive_interval;
        let mut ticker = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                responses = &mut execution => return Ok(responses),
                _ = ticker.tick() => {
                    if !sink.keep_alive().await {
                        return Err(disconnected());
                    }
                }
                () = sink.closed() => return Err(disconnected()),
            }
        }
    }

    /// One model call with retry on transient upstream failures
    async fn call_model(&self, request: &GenerateRequest, sink: &EventSink) -> AppResult<RoundOutput> {
        let retry = &self.settings.retry;
        let mut attempt = 0;

        loop {
            let opened = tokio::select! {
                opened = self.open(request, sink.is_streaming()) => opened,
                () = sink.closed() => return Err(disconnected()),
            };
            match opened {
                Ok(events) => return Self::consume(events, sink).await,
                Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                    let delay = retry.delay_for_attempt(attempt);
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = retry.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Model call failed, retrying"
                    );
                    if !sink.keep_alive().await {
                        return Err(disconnected());
                    }
                    tokio::select! {
                        () = sleep(delay) => {}
                        () = sink.closed() => return Err(disconnected()),
                    }
                }
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, "Model retries exhausted");
                    return Err(AppError::new(e.code, SERVICE_BUSY_MESSAGE));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Start a call; buffered responses are adapted into the same event stream
    async fn open(&self, request: &GenerateRequest, streaming: bool) -> AppResult<ModelEventStream> {
        if streaming {
            return self.backend.stream_generate(request).await;
        }
        let response = self.backend.generate(request).await?;
        let events: Vec<AppResult<ModelEvent>> = response.into_events().into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(events)))
    }

    /// Drain one call's events, forwarding answer text to the client
    async fn consume(mut events: ModelEventStream, sink: &EventSink) -> AppResult<RoundOutput> {
        let mut output = RoundOutput::default();

        loop {
            let next = tokio::select! {
                next = events.next() => next,
                () = sink.closed() => return Err(disconnected()),
            };
            let Some(event) = next else {
                break;
            };

            match event? {
                ModelEvent::Text(part) => {
                    let text = part.answer_text().unwrap_or_default().to_owned();
                    output.parts.push(part);
                    if !sink.text(&text).await {
                        return Err(disconnected());
                    }
                    output.text.push_str(&text);
                }
                ModelEvent::Thought(part) => {
                    output.parts.push(part);
                    if !sink.keep_alive().await {
                        return Err(disconnected());
                    }
                }
                ModelEvent::FunctionCall(part) => {
                    if let Some(call) = part.function_call.clone() {
                        output.calls.push(call);
                    }
                    output.parts.push(part);
                }
                ModelEvent::Opaque(part) => output.parts.push(part),
                ModelEvent::Finish(reason) => output.finish = Some(reason),
                // streamed usage is cumulative within a call
                ModelEvent::Usage(usage) => output.usage = usage,
            }
        }

        Ok(output)
    }
}

impl std::fmt::Debug for AgentLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentLoop")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
