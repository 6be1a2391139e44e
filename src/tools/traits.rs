// ABOUTME: Defines the ChatTool trait and ToolCapabilities for the retrieval tool catalog
// ABOUTME: Tools implement this trait to be declared to the model and dispatched by the ToolRegistry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Chat Tool Trait and Capabilities
//!
//! Every retrieval tool the model may call implements [`ChatTool`]:
//! - metadata (name, description, input schema) sent as a function declaration
//! - capability flags used by the registry for access checks and logging
//! - async execution returning compact text for the model
//!
//! Executors return `AppResult<String>`; turning failures into text the model
//! can read is the registry's job, so tools propagate errors with `?`.

use async_trait::async_trait;
use bitflags::bitflags;
use serde_json::Value;
use syntia_core::errors::AppResult;

use super::context::ToolExecutionContext;
use super::schema::JsonSchema;
use crate::llm::FunctionDeclaration;

bitflags! {
    /// Capabilities that tools declare for dispatch and discovery
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ToolCapabilities: u8 {
        /// Tool reads CRM data
        const READS_DATA = 0b0000_0001;
        /// Tool embeds the query and runs a similarity search
        const SEMANTIC_SEARCH = 0b0000_0010;
        /// Tool targets one doctor given by `id_cliente` and checks access to it
        const CLIENT_SCOPED = 0b0000_0100;
        /// Tool results are limited to the caller's assigned clients
        const PORTFOLIO_SCOPED = 0b0000_1000;
        /// Tool returns company-wide aggregates
        const AGGREGATE = 0b0001_0000;
        /// Tool reads the product catalog
        const CATALOG = 0b0010_0000;
    }
}

impl ToolCapabilities {
    /// Check if tool reads data
    #[must_use]
    pub const fn reads_data(self) -> bool {
        self.contains(Self::READS_DATA)
    }

    /// Check if tool needs the embedding client
    #[must_use]
    pub const fn uses_embeddings(self) -> bool {
        self.contains(Self::SEMANTIC_SEARCH)
    }

    /// Check if the tool targets one doctor
    #[must_use]
    pub const fn is_client_scoped(self) -> bool {
        self.contains(Self::CLIENT_SCOPED)
    }

    /// Check if results are filtered to the caller's portfolio
    #[must_use]
    pub const fn is_portfolio_scoped(self) -> bool {
        self.contains(Self::PORTFOLIO_SCOPED)
    }

    /// Human-readable list of capability names for logging
    #[must_use]
    pub fn describe(self) -> String {
        let mut caps = Vec::new();
        if self.reads_data() {
            caps.push("reads_data");
        }
        if self.uses_embeddings() {
            caps.push("semantic_search");
        }
        if self.is_client_scoped() {
            caps.push("client_scoped");
        }
        if self.is_portfolio_scoped() {
            caps.push("portfolio_scoped");
        }
        if self.contains(Self::AGGREGATE) {
            caps.push("aggregate");
        }
        if self.contains(Self::CATALOG) {
            caps.push("catalog");
        }
        if caps.is_empty() {
            "none".to_owned()
        } else {
            caps.join(", ")
        }
    }
}

/// A retrieval operation the model may invoke
#[async_trait]
pub trait ChatTool: Send + Sync {
    /// Unique identifier the model calls the tool by (e.g., `search_clientes`)
    fn name(&self) -> &'static str;

    /// Description telling the model when to use the tool
    fn description(&self) -> &'static str;

    /// JSON Schema for the arguments
    fn input_schema(&self) -> JsonSchema;

    /// Capability flags
    fn capabilities(&self) -> ToolCapabilities;

    /// Run the tool and render its result as compact text
    ///
    /// # Errors
    ///
    /// Returns `AppError` for invalid arguments, denied access, or data source failures
    async fn execute(&self, args: &Value, context: &ToolExecutionContext) -> AppResult<String>;

    /// Function declaration sent to the model
    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameters: self.input_schema().to_value(),
        }
    }
}
