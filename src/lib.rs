// ABOUTME: Main library entry point for the Syntia chat service
// ABOUTME: Tool-calling conversational agent over the pharmaceutical CRM, served over HTTP and SSE
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

// Crate-level attributes:
// - recursion_limit: Increased from default 128 to 256 for the nested json! schemas of the tool catalog
// - deny(unsafe_code): Zero-tolerance unsafe policy
#![recursion_limit = "256"]
#![deny(unsafe_code)]

//! # Syntia Chat
//!
//! A conversational assistant for medical representatives. Each user message
//! runs a bounded tool-calling loop against a Gemini model on Vertex AI; the
//! tools query the CRM (inventory, movements, sales, collections, rankings)
//! and run semantic search over the product catalog.
//!
//! ## Features
//!
//! - **Streaming answers**: text deltas over SSE with keep-alives during tool work
//! - **Daily quota**: charged atomically before the model call, refunded on failure
//! - **Role-scoped data**: non-admin callers only see their assigned doctors
//! - **Rolling summaries**: long conversations are compacted in the background
//!
//! ## Architecture
//!
//! - **Routes**: HTTP surface, one endpoint dispatching on `action`
//! - **Chat**: turn orchestration, agent loop, transcript and compaction
//! - **Tools**: catalog the model may call, with role-based access checks
//! - **LLM**: Vertex AI client, SSE decoding, token broker, embeddings
//! - **Database**: store traits with Postgres and in-process implementations
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use syntia_chat::config::ServerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Syntia chat configured with port: HTTP={}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Bearer credential resolution against the identity provider
pub mod auth;

/// Process-wide expiring caches
pub mod cache;

/// Conversational agent core
pub mod chat;

/// Environment configuration
pub mod config;

/// Store traits and their implementations
pub mod database;

/// Generative model, embeddings and service-account tokens
pub mod llm;

/// Production logging and structured output
pub mod logging;

/// HTTP middleware for request tracing and CORS
pub mod middleware;

/// `HTTP` routes
pub mod routes;

/// Router assembly and serving
pub mod server;

/// Tools the model can call
pub mod tools;

pub use syntia_core::{constants, errors, models};
