// ABOUTME: Route handlers for the syntia-chat endpoint
// ABOUTME: Dispatches usage, rating, history and send actions, streaming answers over SSE
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Chat routes
//!
//! One path serves every action. `GET ?action=usage` reads the quota; `POST`
//! dispatches on the body's `action` field, and a body without a recognized
//! action sends a message. All handlers require a bearer credential.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use syntia_core::constants::limits::STREAM_CHANNEL_CAPACITY;
use syntia_core::constants::messages::{http, RESPONSE_TOO_LONG_CODE};
use syntia_core::errors::{AppError, ErrorCode};
use syntia_core::models::{MessageRecord, User};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, Instrument, Span};
use uuid::Uuid;

use crate::chat::{is_disconnect, ChatEvent, EventSink, SendMessage, TurnResult};
use crate::middleware::record_caller;
use crate::server::ServerResources;

/// Path of the chat endpoint
pub const CHAT_PATH: &str = "/syntia-chat";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query string of `GET` requests
#[derive(Debug, Default, Deserialize)]
pub struct ChatQuery {
    /// Requested action
    #[serde(default)]
    pub action: Option<String>,
}

/// Body of `POST` requests; fields are read per action
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequestBody {
    /// `rate`, `history`, or anything else to send a message
    #[serde(default)]
    pub action: Option<String>,
    /// Text to send
    #[serde(default)]
    pub message: Option<String>,
    /// Conversation to continue or read
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Client currently open in the app
    #[serde(default, alias = "context_cliente_id")]
    pub context_client_id: Option<String>,
    /// Stream the answer (default true)
    #[serde(default)]
    pub stream: Option<bool>,
    /// Message to rate
    #[serde(default)]
    pub message_id: Option<String>,
    /// Rating from 1 to 5
    #[serde(default)]
    pub rating: Option<serde_json::Value>,
}

/// Response of `GET ?action=usage`
#[derive(Debug, Serialize, Deserialize)]
pub struct UsageResponse {
    /// Queries charged today
    pub queries_used: i32,
    /// Daily limit
    pub queries_limit: i32,
    /// Queries left today
    pub remaining: i32,
}

/// Response of the rate action
#[derive(Debug, Serialize, Deserialize)]
pub struct RateResponse {
    /// Always true
    pub success: bool,
    /// Stored rating
    pub rating: i16,
}

/// One message of a history response
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryMessageResponse {
    /// Message ID
    pub id: Uuid,
    /// `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
    /// Rating, if given
    pub rating: Option<i16>,
    /// When it was rated
    pub rated_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl From<MessageRecord> for HistoryMessageResponse {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            role: record.role.as_str().to_owned(),
            content: record.content,
            rating: record.rating,
            rated_at: record.rated_at,
            created_at: record.created_at,
        }
    }
}

/// Response of the history action
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// Messages in chronological order
    pub messages: Vec<HistoryMessageResponse>,
}

/// Response of a buffered send
#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    /// Answer text
    pub message: String,
    /// Conversation id
    pub conversation_id: Uuid,
    /// Stored assistant message, null if storing failed
    pub message_id: Option<Uuid>,
    /// Queries left today
    pub remaining_queries: i32,
    /// Daily limit
    pub queries_limit: i32,
}

// ============================================================================
// Chat Routes
// ============================================================================

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create the chat route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                CHAT_PATH,
                get(Self::handle_get)
                    .post(Self::handle_post)
                    .options(Self::handle_options)
                    .fallback(Self::method_not_allowed),
            )
            .with_state(resources)
    }

    /// Resolve the bearer credential to an internal user
    async fn authenticate(headers: &HeaderMap, resources: &ServerResources) -> Result<User, AppError> {
        let authorization = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
        let user = resources.authenticator.authenticate(authorization).await?;
        record_caller(&user.id, user.role.as_str());
        Ok(user)
    }

    async fn handle_options() -> StatusCode {
        StatusCode::NO_CONTENT
    }

    async fn method_not_allowed() -> Response {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(serde_json::json!({ "error": http::METHOD_NOT_ALLOWED })),
        )
            .into_response()
    }

    /// `GET`: only the usage view exists
    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<ChatQuery>,
    ) -> Result<Json<UsageResponse>, AppError> {
        let user = Self::authenticate(&headers, &resources).await?;

        if query.action.as_deref() != Some("usage") {
            return Err(AppError::invalid_input(http::UNKNOWN_GET_ACTION));
        }

        let usage = resources.engine.usage(&user).await?;
        Ok(Json(UsageResponse {
            queries_used: usage.queries_used,
            queries_limit: usage.queries_limit,
            remaining: usage.remaining,
        }))
    }

    /// `POST`: rate, history, or send
    async fn handle_post(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response, AppError> {
        let user = Self::authenticate(&headers, &resources).await?;

        let request: ChatRequestBody = serde_json::from_slice(&body).map_err(|e| {
            debug!(error = %e, "Rejected request body");
            AppError::invalid_input(http::INVALID_BODY)
        })?;

        match request.action.as_deref() {
            Some("rate") => Self::rate(&resources, &user, request).await,
            Some("history") => Self::history(&resources, &user, request).await,
            _ => Self::send(&resources, user, request).await,
        }
    }

    async fn rate(
        resources: &ServerResources,
        user: &User,
        request: ChatRequestBody,
    ) -> Result<Response, AppError> {
        let message_id = request.message_id.filter(|id| !id.trim().is_empty());
        let rating = request.rating.as_ref().and_then(serde_json::Value::as_i64);
        let (Some(message_id), Some(rating)) = (message_id, rating) else {
            return Err(AppError::invalid_input(http::RATE_FIELDS_REQUIRED));
        };

        let rating = resources.engine.rate(user, &message_id, rating).await?;
        Ok(Json(RateResponse {
            success: true,
            rating,
        })
        .into_response())
    }

    async fn history(
        resources: &ServerResources,
        user: &User,
        request: ChatRequestBody,
    ) -> Result<Response, AppError> {
        let conversation_id = request
            .conversation_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AppError::invalid_input(http::CONVERSATION_ID_REQUIRED))?;

        let messages = resources.engine.history(user, &conversation_id).await?;
        Ok(Json(HistoryResponse {
            messages: messages.into_iter().map(Into::into).collect(),
        })
        .into_response())
    }

    /// Admit and run a send in a detached task
    ///
    /// The handler only waits on the task, so hyper dropping it on disconnect
    /// closes the sink instead of cancelling the turn; the task then refunds.
    async fn send(
        resources: &Arc<ServerResources>,
        user: User,
        request: ChatRequestBody,
    ) -> Result<Response, AppError> {
        let streaming = request.stream.unwrap_or(true);
        let message = SendMessage {
            message: request.message.unwrap_or_default(),
            conversation_id: request.conversation_id,
            context_client_id: request.context_client_id,
        };

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let sink = if streaming {
            EventSink::channel(tx)
        } else {
            EventSink::buffered(tx)
        };
        let (admitted_tx, admitted_rx) = oneshot::channel();
        let task = tokio::spawn(
            Self::run_turn(Arc::clone(resources), user, message, sink, admitted_tx)
                .instrument(Span::current()),
        );

        admitted_rx
            .await
            .map_err(|_| AppError::internal("Chat turn ended before admission"))??;

        if streaming {
            return Ok(Self::relay(rx).into_response());
        }

        // `rx` stays alive while we wait; dropping it is how the task learns we left
        let _client = rx;
        let result = task
            .await
            .map_err(|e| AppError::internal(format!("Chat turn task failed: {e}")))??;
        Ok(Json(SendMessageResponse {
            message: result.text,
            conversation_id: result.conversation_id,
            message_id: result.message_id,
            remaining_queries: result.remaining,
            queries_limit: result.queries_limit,
        })
        .into_response())
    }

    /// Body of the turn task: admission, then the agent run
    ///
    /// Streaming turns end with a terminal event on the sink.
    async fn run_turn(
        resources: Arc<ServerResources>,
        user: User,
        message: SendMessage,
        sink: EventSink,
        admitted: oneshot::Sender<Result<(), AppError>>,
    ) -> Result<TurnResult, AppError> {
        let turn = match resources.engine.prepare(user, message).await {
            Ok(turn) => turn,
            Err(e) => {
                // the handler answers with the original; the task result is never read
                let echo = AppError::new(e.code, e.message.clone());
                let _ = admitted.send(Err(e));
                return Err(echo);
            }
        };
        let remaining = turn.usage().remaining;
        let limit = turn.usage().queries_limit;
        // a gone handler is noticed through the sink
        let _ = admitted.send(Ok(()));

        let outcome = resources.engine.complete(turn, &sink).await;
        if sink.is_streaming() {
            let terminal = match &outcome {
                Ok(result) => Some(ChatEvent::done(
                    result.conversation_id,
                    result.message_id,
                    result.remaining,
                    result.queries_limit,
                )),
                Err(e) if is_disconnect(e) => {
                    debug!("Client went away, turn abandoned");
                    None
                }
                Err(e) => Some(ChatEvent::failed(stream_error(e), remaining, limit)),
            };
            if let Some(terminal) = terminal {
                sink.send(terminal).await;
            }
        }
        outcome
    }

    /// Relay a turn's events as SSE until the terminal one
    fn relay(mut rx: mpsc::Receiver<ChatEvent>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        let stream = async_stream::stream! {
            while let Some(event) = rx.recv().await {
                let terminal = event.is_terminal();
                yield Ok(Event::default().data(event.to_json()));
                if terminal {
                    break;
                }
            }
        };

        Sse::new(stream).keep_alive(KeepAlive::default())
    }
}

/// `e` field of a failed stream: a code the UI explains, or the message
fn stream_error(error: &AppError) -> String {
    if error.code == ErrorCode::ResponseTooLong {
        RESPONSE_TOO_LONG_CODE.to_owned()
    } else {
        error.message.clone()
    }
}
