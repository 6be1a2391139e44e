// ABOUTME: Process-wide caches with explicit expiry for credentials and configuration
// ABOUTME: Injected into consumers so tests can drive expiry with paused tokio time
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Single-value cache with TTL and single-flight refresh
pub mod expiring;

pub use expiring::ExpiringCache;
