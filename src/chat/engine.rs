// ABOUTME: Chat turn orchestration: quota, conversation resolution, prompt, agent loop and persistence
// ABOUTME: Also serves the read-only usage view, message rating and conversation history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Chat Engine
//!
//! A send is split in two phases so the HTTP layer can answer early failures
//! with a plain status code and only open an event stream once the turn is
//! ready to run:
//!
//! 1. [`ChatEngine::prepare`] charges one query, resolves the conversation and
//!    loads prompt, past summaries and history concurrently.
//! 2. [`ChatEngine::complete`] runs the agent loop, stores the turn and
//!    schedules compaction.
//!
//! Any failure after the charge refunds it before the error is returned.
//! Both phases must run outside the request future (the routes spawn them) so a
//! dropped connection cannot skip the refund; the sink reports the disconnect.

use std::sync::Arc;
use std::time::Instant;

use syntia_core::constants::limits::{PREVIOUS_SUMMARIES, RECENT_MESSAGES_WITH_SUMMARY};
use syntia_core::constants::messages::{http, RATE_LIMIT_MESSAGE};
use syntia_core::errors::{AppError, AppResult};
use syntia_core::models::{
    ConversationHistory, HistoryMessage, MessageRecord, MessageRole, NewTurn, UsageSnapshot, User,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::agent::{disconnected, AgentLoop, AgentSettings};
use super::compaction::{CompactionPolicy, CompactionTrigger, Compactor};
use super::history::{build_transcript, HistoryWindow};
use super::prompt::{build_system_instruction, SystemPromptProvider};
use super::stream::EventSink;
use crate::cache::ExpiringCache;
use crate::config::ChatConfig;
use crate::database::{ConfigStore, ConversationStore, CrmDataSource, UsageLimiter};
use crate::llm::{Content, GenerationConfig, GenerativeBackend, TextEmbedder};
use crate::logging::AppLogger;
use crate::tools::{ToolExecutionContext, ToolRegistry};

/// External collaborators of the engine
#[derive(Clone)]
pub struct ChatServices {
    /// Conversations and messages
    pub conversations: Arc<dyn ConversationStore>,
    /// Agent prompt
    pub config_store: Arc<dyn ConfigStore>,
    /// Daily query quota
    pub usage: Arc<dyn UsageLimiter>,
    /// CRM reads for tools
    pub crm: Arc<dyn CrmDataSource>,
    /// Model
    pub backend: Arc<dyn GenerativeBackend>,
    /// Query embeddings for semantic tools
    pub embedder: Arc<dyn TextEmbedder>,
}

/// A send-message request
#[derive(Debug, Clone, Default)]
pub struct SendMessage {
    /// User text
    pub message: String,
    /// Conversation to continue
    pub conversation_id: Option<String>,
    /// Client the user is looking at in the app
    pub context_client_id: Option<String>,
}

/// A turn that passed admission and is ready to run
#[derive(Debug)]
pub struct PreparedTurn {
    user: User,
    usage: UsageSnapshot,
    conversation_id: Uuid,
    message: String,
    context_client_id: Option<String>,
    history: ConversationHistory,
    system_instruction: String,
    contents: Vec<Content>,
    started: Instant,
}

impl PreparedTurn {
    /// Caller
    #[must_use]
    pub const fn user(&self) -> &User {
        &self.user
    }

    /// Quota state after the charge
    #[must_use]
    pub const fn usage(&self) -> &UsageSnapshot {
        &self.usage
    }

    /// Conversation the turn belongs to
    #[must_use]
    pub const fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    /// Transcript sent on the first model call
    #[must_use]
    pub fn contents(&self) -> &[Content] {
        &self.contents
    }

    /// Full system instruction
    #[must_use]
    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }
}

/// Outcome of a completed turn
#[derive(Debug)]
pub struct TurnResult {
    /// Conversation id
    pub conversation_id: Uuid,
    /// Stored assistant message, `None` if storing failed
    pub message_id: Option<Uuid>,
    /// Answer text
    pub text: String,
    /// Queries left today
    pub remaining: i32,
    /// Daily limit
    pub queries_limit: i32,
    /// Background compaction, if one was started
    pub compaction: Option<JoinHandle<()>>,
}

/// Entry point for every chat operation
pub struct ChatEngine {
    conversations: Arc<dyn ConversationStore>,
    usage: Arc<dyn UsageLimiter>,
    crm: Arc<dyn CrmDataSource>,
    backend: Arc<dyn GenerativeBackend>,
    embedder: Arc<dyn TextEmbedder>,
    prompts: SystemPromptProvider,
    agent: AgentLoop,
    compactor: Arc<Compactor>,
    window: HistoryWindow,
}

impl ChatEngine {
    /// Wire the engine from its services and tuning
    #[must_use]
    pub fn new(services: ChatServices, config: &ChatConfig) -> Self {
        let generation = GenerationConfig {
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
        };
        let registry = Arc::new(ToolRegistry::builtin(config.max_tool_result_chars));
        let agent = AgentLoop::new(
            Arc::clone(&services.backend),
            registry,
            AgentSettings {
                max_tool_rounds: config.max_tool_rounds,
                generation,
                retry: config.retry.clone(),
                keep_alive_interval: config.keep_alive_interval,
            },
        );
        let compactor = Arc::new(Compactor::new(
            Arc::clone(&services.backend),
            Arc::clone(&services.conversations),
            generation,
            CompactionPolicy {
                threshold: config.compaction_threshold,
                recompaction_interval: config.recompaction_interval,
            },
        ));
        let prompts = SystemPromptProvider::new(
            services.config_store,
            Arc::new(ExpiringCache::new(config.system_prompt_ttl)),
        );

        Self {
            conversations: services.conversations,
            usage: services.usage,
            crm: services.crm,
            backend: services.backend,
            embedder: services.embedder,
            prompts,
            agent,
            compactor,
            window: HistoryWindow {
                max_messages: config.max_history_messages,
                recent_with_summary: RECENT_MESSAGES_WITH_SUMMARY,
            },
        }
    }

    /// Tools offered to the model
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        self.agent.registry()
    }

    // ========================================================================
    // Read-only operations
    // ========================================================================

    /// Today's quota for `user` without charging it
    ///
    /// # Errors
    ///
    /// Returns the datastore error
    pub async fn usage(&self, user: &User) -> AppResult<UsageSnapshot> {
        self.usage.remaining(user).await
    }

    /// Rate an assistant message from 1 to 5
    ///
    /// # Errors
    ///
    /// - `InvalidInput` when `rating` is out of range
    /// - `ResourceNotFound` when the message is unknown or was written by the user
    /// - `PermissionDenied` when the message belongs to someone else's conversation
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn rate(&self, user: &User, message_id: &str, rating: i64) -> AppResult<i16> {
        let rating = i16::try_from(rating)
            .ok()
            .filter(|r| (1..=5).contains(r))
            .ok_or_else(|| AppError::invalid_input(http::RATE_FIELDS_REQUIRED))?;

        let not_rateable = || AppError::not_found(http::MESSAGE_NOT_RATEABLE);
        let id = Uuid::parse_str(message_id.trim()).map_err(|_| not_rateable())?;
        let message = self
            .conversations
            .message_ownership(id)
            .await?
            .filter(|m| m.role == MessageRole::Assistant)
            .ok_or_else(not_rateable)?;

        if message.owner_id != user.id {
            warn!(message_id = %id, "Rating attempt on another user's message");
            return Err(AppError::permission_denied(http::MESSAGE_FORBIDDEN).with_resource_id(id.to_string()));
        }

        self.conversations.rate_message(id, rating).await?;
        info!(message_id = %id, rating, "Message rated");
        Ok(rating)
    }

    /// Messages of a conversation in chronological order
    ///
    /// Admins may read any conversation, everyone else only their own.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` when the id is malformed, unknown or not visible
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn history(&self, user: &User, conversation_id: &str) -> AppResult<Vec<MessageRecord>> {
        let not_found = || AppError::not_found(http::CONVERSATION_NOT_FOUND);
        let id = Uuid::parse_str(conversation_id.trim()).map_err(|_| not_found())?;

        let conversation = if user.is_admin() {
            self.conversations.find(id).await?
        } else {
            self.conversations.find_owned(id, &user.id).await?
        };
        let conversation = conversation.ok_or_else(not_found)?;

        self.conversations.list_messages(conversation.id).await
    }

    // ========================================================================
    // Send
    // ========================================================================

    /// Admit a send: charge the quota and assemble everything the model needs
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a blank message
    /// - `QuotaExceeded` when today's queries are used up
    /// - datastore or configuration errors, after refunding the charge
    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn prepare(&self, user: User, request: SendMessage) -> AppResult<PreparedTurn> {
        if request.message.trim().is_empty() {
            return Err(AppError::invalid_input(http::EMPTY_MESSAGE));
        }
        let started = Instant::now();

        // token exchange overlaps the quota round-trip
        let (usage, warm_up) = tokio::join!(
            self.usage.check_and_increment(&user),
            self.backend.warm_up()
        );
        if let Err(e) = warm_up {
            debug!(error = %e, "Backend warm-up failed");
        }
        let usage = usage?;
        if !usage.allowed {
            AppLogger::log_usage_event(&user.id, "quota_exhausted", usage.queries_used, usage.queries_limit);
            return Err(AppError::quota_exceeded(RATE_LIMIT_MESSAGE, usage.queries_limit));
        }
        AppLogger::log_usage_event(&user.id, "query_charged", usage.queries_used, usage.queries_limit);

        match self.load_context(&user, &request).await {
            Ok((conversation_id, history, system_instruction)) => {
                let contents = build_transcript(&history, &request.message, self.window);
                Ok(PreparedTurn {
                    user,
                    usage,
                    conversation_id,
                    message: request.message,
                    context_client_id: request.context_client_id,
                    history,
                    system_instruction,
                    contents,
                    started,
                })
            }
            Err(e) => {
                self.refund(&user, &usage).await;
                Err(e)
            }
        }
    }

    /// Run a prepared turn to completion
    ///
    /// Text is written to `sink` as it is produced. On failure the charge is
    /// refunded and nothing is stored; a failure to store a successful turn is
    /// only logged.
    ///
    /// # Errors
    ///
    /// Returns the agent loop error
    #[instrument(skip_all, fields(user_id = %turn.user.id, conversation_id = %turn.conversation_id))]
    pub async fn complete(&self, turn: PreparedTurn, sink: &EventSink) -> AppResult<TurnResult> {
        let PreparedTurn {
            user,
            usage,
            conversation_id,
            message,
            context_client_id,
            history,
            system_instruction,
            contents,
            started,
        } = turn;

        if sink.is_closed() {
            debug!("Client left before the turn started");
            self.refund(&user, &usage).await;
            return Err(disconnected());
        }

        let tools = ToolExecutionContext::new(
            user.clone(),
            Arc::clone(&self.crm),
            Arc::clone(&self.embedder),
        );
        let outcome = match self.agent.run(&system_instruction, contents, &tools, sink).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.refund(&user, &usage).await;
                return Err(e);
            }
        };

        let latency_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        let new_turn = NewTurn {
            conversation_id,
            user_message: message,
            assistant_message: outcome.text,
            context_client_id,
            tokens_input: outcome.usage.prompt_tokens,
            tokens_output: outcome.usage.output_tokens,
            latency_ms,
        };

        let message_id = match self.conversations.append_turn(&new_turn).await {
            Ok(stored) => Some(stored.assistant_message_id),
            Err(e) => {
                error!(error = %e, "Failed to store completed turn");
                None
            }
        };

        let compaction = if message_id.is_some() {
            self.schedule_compaction(history, &new_turn)
        } else {
            None
        };

        AppLogger::log_turn_completed(
            &user.id,
            &conversation_id.to_string(),
            outcome.model_calls,
            outcome.usage.prompt_tokens,
            outcome.usage.output_tokens,
            latency_ms,
        );

        Ok(TurnResult {
            conversation_id,
            message_id,
            text: new_turn.assistant_message,
            remaining: usage.remaining_after_charge(),
            queries_limit: usage.queries_limit,
            compaction,
        })
    }

    /// Conversation, history and system instruction for a send
    async fn load_context(
        &self,
        user: &User,
        request: &SendMessage,
    ) -> AppResult<(Uuid, ConversationHistory, String)> {
        let (conversation_id, is_new) = self
            .resolve_conversation(user, request.conversation_id.as_deref())
            .await?;

        let history = async {
            if is_new {
                Ok(ConversationHistory::default())
            } else {
                self.conversations.load_history(conversation_id).await
            }
        };
        let (base_prompt, summaries, history) = tokio::try_join!(
            self.prompts.load(),
            self.conversations
                .previous_summaries(&user.id, Some(conversation_id), PREVIOUS_SUMMARIES),
            history,
        )?;

        let system_instruction = build_system_instruction(&base_prompt, user, &summaries);
        Ok((conversation_id, history, system_instruction))
    }

    /// Continue an owned conversation or start a new one
    ///
    /// A malformed, unknown or foreign id silently starts a new conversation.
    async fn resolve_conversation(&self, user: &User, requested: Option<&str>) -> AppResult<(Uuid, bool)> {
        if let Some(raw) = requested.map(str::trim).filter(|raw| !raw.is_empty()) {
            match Uuid::parse_str(raw) {
                Ok(id) => {
                    if let Some(conversation) = self.conversations.find_owned(id, &user.id).await? {
                        return Ok((conversation.id, false));
                    }
                    debug!(conversation_id = %id, "Conversation not visible to caller, starting a new one");
                }
                Err(_) => debug!(conversation_id = raw, "Malformed conversation id, starting a new one"),
            }
        }

        let conversation = self.conversations.create(&user.id).await?;
        info!(conversation_id = %conversation.id, "Conversation created");
        Ok((conversation.id, true))
    }

    /// Start compaction when the stored turn crossed the policy threshold
    fn schedule_compaction(&self, history: ConversationHistory, turn: &NewTurn) -> Option<JoinHandle<()>> {
        let summary = history.summary.filter(|s| !s.trim().is_empty());
        let before = history.messages.len();
        let trigger = self
            .compactor
            .policy()
            .trigger(before, before + 2, summary.is_some())?;

        let mut messages = history.messages;
        messages.push(HistoryMessage::user(turn.user_message.clone()));
        messages.push(HistoryMessage::assistant(turn.assistant_message.clone()));

        let previous = match trigger {
            CompactionTrigger::Initial => None,
            CompactionTrigger::Refresh => summary,
        };
        debug!(?trigger, messages = messages.len(), "Scheduling compaction");
        Some(self.compactor.spawn(turn.conversation_id, previous, messages))
    }

    /// Give back the query charged for a failed turn
    async fn refund(&self, user: &User, usage: &UsageSnapshot) {
        match self.usage.rollback(&user.id).await {
            Ok(()) => AppLogger::log_usage_event(
                &user.id,
                "query_refunded",
                (usage.queries_used - 1).max(0),
                usage.queries_limit,
            ),
            Err(e) => error!(user_id = %user.id, error = %e, "Failed to roll back usage"),
        }
    }
}

impl std::fmt::Debug for ChatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatEngine")
            .field("agent", &self.agent)
            .field("compactor", &self.compactor)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
