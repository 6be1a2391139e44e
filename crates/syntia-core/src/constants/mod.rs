// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Chat limits, cache lifetimes, tool names, and fixed user-facing strings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped by domain. Runtime-tunable values have a default here
//! and an environment override in the service configuration.

/// Agent loop, history, and output limits
pub mod limits;
/// Fixed Spanish strings shown to users or fed to the model
pub mod messages;
/// Tool identifiers exposed to the model
pub mod tools;

/// Cache lifetimes
pub mod cache {
    /// System prompt cache TTL (10 minutes)
    pub const SYSTEM_PROMPT_TTL_SECS: u64 = 600;

    /// Access token cache TTL (55 minutes against a 60-minute token)
    pub const ACCESS_TOKEN_TTL_SECS: u64 = 3_300;

    /// Lifetime requested for service-account assertions
    pub const ASSERTION_LIFETIME_SECS: i64 = 3_600;

    /// Access tokens are dropped this long before the issuer's stated expiry
    pub const ACCESS_TOKEN_EXPIRY_MARGIN_SECS: u64 = 300;
}

/// Embedding request parameters
pub mod embeddings {
    /// Output dimensionality requested from the embedding model
    pub const DEFAULT_DIMENSION: usize = 768;

    /// Minimum cosine similarity for product matches
    pub const PRODUCT_MATCH_THRESHOLD: f64 = 0.55;

    /// Maximum product matches returned
    pub const PRODUCT_MATCH_COUNT: i32 = 10;

    /// Minimum cosine similarity for technical sheet matches
    pub const SHEET_MATCH_THRESHOLD: f64 = 0.60;

    /// Maximum technical sheet matches returned
    pub const SHEET_MATCH_COUNT: i32 = 3;
}
