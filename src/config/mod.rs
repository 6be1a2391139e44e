// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Loads service, datastore, identity, Vertex AI, and chat tunables from the environment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
//! Configuration module for the Syntia chat service
//!
//! Configuration is environment-only. [`ServerConfig::from_env`] reads every
//! variable once at startup; the resulting value is passed down explicitly.

/// Environment and server configuration
pub mod environment;

pub use environment::{
    ChatConfig, DatabaseConfig, Environment, SecretString, ServerConfig, SupabaseConfig,
    VertexConfig,
};
