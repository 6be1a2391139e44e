// ABOUTME: Retrieval tool framework for the chat agent: trait, schemas, registry and implementations
// ABOUTME: Tools read CRM data for one caller and always return text the model can use
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Tools
//!
//! A fixed catalog of named, schema-described tools the model may call.
//! Each tool runs one or more CRM queries for the calling user and renders
//! a compact text result. The [`ToolRegistry`] is the only dispatch entry
//! point and contains every failure as text.

/// Typed argument extraction
pub mod args;
/// Per-call execution context
pub mod context;
/// Tool implementations by category
pub mod implementations;
/// Registry and dispatch
pub mod registry;
/// Argument schemas declared to the model
pub mod schema;
/// Tool trait and capability flags
pub mod traits;

pub use context::ToolExecutionContext;
pub use registry::ToolRegistry;
pub use schema::{JsonSchema, PropertySchema};
pub use traits::{ChatTool, ToolCapabilities};
