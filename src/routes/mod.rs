// ABOUTME: Route module organization for the syntia-chat HTTP endpoints
// ABOUTME: Each domain module holds route definitions and thin handlers over the chat engine
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Chat endpoint: usage, rating, history and send
pub mod chat;
/// Health check
pub mod health;

pub use chat::{ChatRoutes, CHAT_PATH};
pub use health::HealthRoutes;
