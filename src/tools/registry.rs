// ABOUTME: Central registry for retrieval tools with declaration export and fault-contained execution
// ABOUTME: Every call yields text for the model: results are truncated, failures rendered inline
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Tool Registry
//!
//! Central registry for the chat agent's tools, providing:
//! - Tool registration and lookup
//! - Function declarations for the model, in registration order
//! - Dispatch that never fails: unknown tools, bad arguments, denied access and
//!   data source errors all come back as a string the model can react to
//! - Concurrent execution of every call the model emitted in one round

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use syntia_core::constants::limits::MAX_TOOL_RESULT_CHARS;
use syntia_core::constants::messages::TRUNCATION_SUFFIX;
use syntia_core::errors::{AppError, ErrorCode};
use tracing::{debug, info, instrument, warn};

use super::context::ToolExecutionContext;
use super::implementations;
use super::traits::ChatTool;
use crate::llm::{FunctionCall, FunctionDeclaration, FunctionResponse};
use crate::logging::AppLogger;

/// Render a tool failure as text for the model
#[must_use]
pub fn render_error(error: &AppError) -> String {
    match error.code {
        ErrorCode::PermissionDenied => error.message.clone(),
        ErrorCode::DatabaseError
        | ErrorCode::InvalidInput
        | ErrorCode::MissingRequiredField
        | ErrorCode::ValueOutOfRange => format!("Error: {}", error.message),
        _ => format!("Error al ejecutar herramienta: {}", error.message),
    }
}

/// Cut `text` to `max_chars` characters and mark the cut
#[must_use]
pub fn truncate_result(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => {
            let mut truncated = text;
            truncated.truncate(byte_index);
            truncated.push_str(TRUNCATION_SUFFIX);
            truncated
        }
        None => text,
    }
}

/// Registry of the tools declared to the model
pub struct ToolRegistry {
    /// Registered tools by name
    tools: HashMap<String, Arc<dyn ChatTool>>,
    /// Registration order, used for declarations
    order: Vec<String>,
    /// Result size ceiling in characters
    max_result_chars: usize,
}

impl ToolRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new(max_result_chars: usize) -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            max_result_chars,
        }
    }

    /// Registry with the full CRM tool catalog
    #[must_use]
    pub fn builtin(max_result_chars: usize) -> Self {
        let mut registry = Self::new(max_result_chars);
        implementations::register_all(&mut registry);
        info!(tools = registry.len(), "Registered built-in tools");
        registry
    }

    /// Register a tool
    ///
    /// # Returns
    ///
    /// `true` if the tool was registered, `false` if a tool with the same name exists
    pub fn register(&mut self, tool: Arc<dyn ChatTool>) -> bool {
        let name = tool.name().to_owned();

        if self.tools.contains_key(&name) {
            warn!("Tool '{}' is already registered, skipping", name);
            return false;
        }

        debug!(
            "Registering tool '{}' with capabilities: {}",
            name,
            tool.capabilities().describe()
        );
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        true
    }

    /// Get a tool by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ChatTool>> {
        self.tools.get(name)
    }

    /// Number of registered tools
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool names in registration order
    #[must_use]
    pub fn tool_names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Function declarations for the model
    #[must_use]
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.declaration())
            .collect()
    }

    /// Execute one call and return the text fed back to the model
    #[instrument(skip(self, call, context), fields(tool = %call.name, user_id = %context.user.id))]
    pub async fn execute(&self, call: &FunctionCall, context: &ToolExecutionContext) -> String {
        let Some(tool) = self.get(&call.name) else {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return format!("Herramienta desconocida: {}", call.name);
        };

        let started = Instant::now();
        let outcome = tool.execute(&call.args, context).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let text = match outcome {
            Ok(text) => {
                AppLogger::log_tool_call(&context.user.id, &call.name, true, duration_ms);
                text
            }
            Err(error) => {
                warn!(tool = %call.name, code = %error.code, error = %error.message, "Tool execution failed");
                AppLogger::log_tool_call(&context.user.id, &call.name, false, duration_ms);
                render_error(&error)
            }
        };

        truncate_result(text, self.max_result_chars)
    }

    /// Execute every call of a round concurrently, preserving call order
    pub async fn execute_all(
        &self,
        calls: &[FunctionCall],
        context: &ToolExecutionContext,
    ) -> Vec<FunctionResponse> {
        let results = join_all(calls.iter().map(|call| self.execute(call, context))).await;
        calls
            .iter()
            .zip(results)
            .map(|(call, text)| FunctionResponse::result(call.name.clone(), text))
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin(MAX_TOOL_RESULT_CHARS)
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .field("max_result_chars", &self.max_result_chars)
            .finish()
    }
}
