// ABOUTME: Core types and constants for the Syntia conversational agent
// ABOUTME: Foundation crate with error handling, domain models, and chat constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Syntia Core
//!
//! Foundation crate providing shared types and constants for the Syntia chat
//! agent. This crate is designed to change infrequently, enabling incremental
//! compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **constants**: Chat limits and fixed user-facing strings
//! - **models**: Users, conversations, messages, and usage counters

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Core data models (User, Conversation, Message, Usage)
pub mod models;
